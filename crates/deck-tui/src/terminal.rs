//! crossterm plumbing: the real `Surface`, key input, and the raw-mode guard.

use crate::render::Surface;
use ratatui::backend::IntoCrossterm;
use ratatui::crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyEvent, KeyEventKind},
    execute, queue,
    style::{Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::style::Color;
use std::io::{self, BufWriter, Stdout, Write};
use std::panic;
use std::time::Duration;
use tracing::{debug, warn};

/// Writes queued escape sequences and flushes once per frame.
pub struct CrosstermSurface<W: Write> {
    out: W,
}

impl CrosstermSurface<BufWriter<Stdout>> {
    pub fn stdout() -> Self {
        Self::new(BufWriter::with_capacity(64 * 1024, io::stdout()))
    }
}

impl<W: Write> CrosstermSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Surface for CrosstermSurface<W> {
    fn size(&self) -> io::Result<(u16, u16)> {
        terminal::size()
    }

    fn move_to(&mut self, x: u16, y: u16) -> io::Result<()> {
        queue!(self.out, MoveTo(x, y))
    }

    fn set_colors(&mut self, fg: Color, bg: Color) -> io::Result<()> {
        queue!(
            self.out,
            SetForegroundColor(fg.into_crossterm()),
            SetBackgroundColor(bg.into_crossterm())
        )
    }

    fn write_glyph(&mut self, glyph: char) -> io::Result<()> {
        queue!(self.out, Print(glyph))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn clear(&mut self) -> io::Result<()> {
        queue!(self.out, ResetColor, Clear(ClearType::All))?;
        self.out.flush()
    }
}

/// Undo what `TerminalGuard::enter` set on screen.
fn leave_screen<W: Write>(out: &mut W) -> io::Result<()> {
    execute!(out, ResetColor, Show, LeaveAlternateScreen)
}

/// Restore the terminal before the previous panic hook prints, so a panic
/// never leaves the shell in raw mode on the alternate screen.
pub fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = leave_screen(&mut io::stdout());
        previous(info);
    }));
}

/// Raw mode plus alternate screen for as long as the guard lives.
pub struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        debug!("terminal: enabling raw mode");
        enable_raw_mode()?;
        let guard = Self { active: true };
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        Ok(guard)
    }

    pub fn restore(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        disable_raw_mode()?;
        leave_screen(&mut io::stdout())?;
        debug!("terminal: restored");
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!("terminal: restore failed: {}", e);
        }
    }
}

/// Non-blocking key source for the frame loop.
pub trait InputSource {
    /// Next key press or repeat, if one is already waiting.
    fn poll_key(&mut self) -> io::Result<Option<KeyEvent>>;
}

pub struct CrosstermInput;

impl InputSource for CrosstermInput {
    fn poll_key(&mut self) -> io::Result<Option<KeyEvent>> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Release {
                    return Ok(Some(key));
                }
            }
        }
        Ok(None)
    }
}

/// Block until any key is pressed.  Used after the guard has restored the
/// terminal, to keep an error message on screen.
pub fn wait_for_key() -> io::Result<()> {
    enable_raw_mode()?;
    let result = loop {
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => break Ok(()),
            Ok(_) => continue,
            Err(e) => break Err(e),
        }
    };
    disable_raw_mode()?;
    result
}
