//! Action enum and the per-screen keymaps that produce it.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Which full-screen view owns the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Player,
    Browser,
    Tracks,
    Themes,
}

/// Everything a key press can ask for.  The app dispatches these; screens
/// interpret the selection actions against their own list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    // ── Playback ─────────────────────────────────────────────────────────────
    TogglePause,
    Next,
    Prev,
    VolumeUp,
    VolumeDown,
    ToggleShuffle,
    ToggleRepeat,

    // ── Visualizer ───────────────────────────────────────────────────────────
    ToggleVisualizer,
    CycleVisualizerMode,
    IntensityUp,
    IntensityDown,

    // ── Lists ────────────────────────────────────────────────────────────────
    SelectUp,
    SelectDown,
    PageUp,
    PageDown,
    /// Enter a directory, queue or play a track, or apply a theme.
    Activate,
    /// Queue the selected track and play it now.
    PlaySelected,
    /// Queue the selected file, or the selected folder recursively.
    AddSelected,
    /// Queue everything under the directory being browsed.
    AddFolder,
    Back,
    RemoveSelected,

    // ── App ──────────────────────────────────────────────────────────────────
    Show(Screen),
    Quit,
}

/// Map a key to an action for the given screen.  `None` means the key is
/// unbound there.
pub fn map_key(screen: Screen, key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Action::Quit),
            _ => None,
        };
    }
    match screen {
        Screen::Player => player_key(key.code),
        Screen::Browser => browser_key(key.code),
        Screen::Tracks => tracks_key(key.code),
        Screen::Themes => themes_key(key.code),
    }
}

fn player_key(code: KeyCode) -> Option<Action> {
    let action = match code {
        KeyCode::Char(' ') => Action::TogglePause,
        KeyCode::Right | KeyCode::Char('n') => Action::Next,
        KeyCode::Left | KeyCode::Char('p') => Action::Prev,
        KeyCode::Up | KeyCode::Char('+') | KeyCode::Char('=') => Action::VolumeUp,
        KeyCode::Down | KeyCode::Char('-') => Action::VolumeDown,
        KeyCode::Char('s') => Action::ToggleShuffle,
        KeyCode::Char('r') => Action::ToggleRepeat,
        KeyCode::Char('v') => Action::ToggleVisualizer,
        KeyCode::Char('m') => Action::CycleVisualizerMode,
        KeyCode::Char(']') => Action::IntensityUp,
        KeyCode::Char('[') => Action::IntensityDown,
        KeyCode::Char('f') => Action::Show(Screen::Browser),
        KeyCode::Char('l') => Action::Show(Screen::Tracks),
        KeyCode::Char('t') => Action::Show(Screen::Themes),
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        _ => return None,
    };
    Some(action)
}

fn browser_key(code: KeyCode) -> Option<Action> {
    let action = match code {
        KeyCode::Up | KeyCode::Char('k') => Action::SelectUp,
        KeyCode::Down | KeyCode::Char('j') => Action::SelectDown,
        KeyCode::PageUp | KeyCode::Left => Action::PageUp,
        KeyCode::PageDown | KeyCode::Right => Action::PageDown,
        KeyCode::Enter => Action::Activate,
        KeyCode::Char(' ') => Action::PlaySelected,
        KeyCode::Char('a') => Action::AddSelected,
        KeyCode::Char('A') => Action::AddFolder,
        KeyCode::Backspace => Action::Back,
        KeyCode::Char('l') => Action::Show(Screen::Tracks),
        KeyCode::Char('t') => Action::Show(Screen::Themes),
        KeyCode::Esc | KeyCode::Char('f') => Action::Show(Screen::Player),
        KeyCode::Char('q') => Action::Quit,
        _ => return None,
    };
    Some(action)
}

fn tracks_key(code: KeyCode) -> Option<Action> {
    let action = match code {
        KeyCode::Up | KeyCode::Char('k') => Action::SelectUp,
        KeyCode::Down | KeyCode::Char('j') => Action::SelectDown,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::PageDown => Action::PageDown,
        KeyCode::Enter => Action::Activate,
        KeyCode::Delete | KeyCode::Char('d') => Action::RemoveSelected,
        KeyCode::Char(' ') => Action::TogglePause,
        KeyCode::Char('f') => Action::Show(Screen::Browser),
        KeyCode::Char('t') => Action::Show(Screen::Themes),
        KeyCode::Esc | KeyCode::Char('l') => Action::Show(Screen::Player),
        KeyCode::Char('q') => Action::Quit,
        _ => return None,
    };
    Some(action)
}

fn themes_key(code: KeyCode) -> Option<Action> {
    let action = match code {
        KeyCode::Up | KeyCode::Char('k') => Action::SelectUp,
        KeyCode::Down | KeyCode::Char('j') => Action::SelectDown,
        KeyCode::Enter => Action::Activate,
        KeyCode::Esc | KeyCode::Char('t') => Action::Show(Screen::Player),
        KeyCode::Char('q') => Action::Quit,
        _ => return None,
    };
    Some(action)
}

/// Key reference shown at the bottom of each screen.
pub fn hints(screen: Screen) -> &'static str {
    match screen {
        Screen::Player => {
            "SPACE pause  ←/→ track  ↑/↓ volume  s shuffle  r repeat  v viz  m mode  [/] intensity  f files  l tracks  t themes  q quit"
        }
        Screen::Browser => {
            "↑/↓ select  PGUP/PGDN page  ENTER open/add  SPACE play  a add folder  A add all here  BACKSPACE back  ESC player"
        }
        Screen::Tracks => "↑/↓ select  ENTER play  DEL remove  SPACE pause  ESC player",
        Screen::Themes => "↑/↓ select  ENTER apply  ESC player",
    }
}
