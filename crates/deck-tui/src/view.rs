//! Screen drawing.  Every function paints one full frame onto a `Canvas`;
//! the diff renderer works out what actually changed.

use crate::action::{hints, Screen};
use crate::controller::{display_name, PlayerStatus};
use crate::library::{Browser, EntryKind};
use crate::render::{Canvas, Cell};
use crate::theme::{Palette, Theme};
use crate::visualizer::{Sprite, VizMode, Visualizer, BANDS};
use deck_proto::state::PlaybackState;
use ratatui::style::Color;
use std::f32::consts::PI;
use std::path::PathBuf;

const MIN_WIDTH: u16 = 40;
const MIN_HEIGHT: u16 = 14;
/// Rows below the visualizer box on the player screen.
const PLAYER_FOOTER_ROWS: i32 = 10;
const EIGHTHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// What every screen shows around its content.
pub struct Chrome<'a> {
    pub theme: Theme,
    pub fps: f32,
    pub viz: &'a Visualizer,
    pub status: Option<&'a str>,
}

impl Chrome<'_> {
    pub fn blank(&self) -> Cell {
        let p = self.theme.palette();
        Cell::new(' ', p.text, p.bg)
    }
}

pub struct PlayerView<'a> {
    pub state: &'a PlaybackState,
    pub track: Option<String>,
    pub status: PlayerStatus,
    pub connected: bool,
    pub queue_len: usize,
}

/// `mm:ss`, or `--:--` when the value is unknown.
pub fn format_time(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "--:--".to_string();
    }
    let total = secs as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Truncate to `width` columns, marking the cut with an ellipsis.
fn fit(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(width - 1).collect();
    out.push('…');
    out
}

/// Keep the tail of a path visible when it is too long.
fn fit_left(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::from('…');
    out.extend(text.chars().skip(count - (width - 1)));
    out
}

fn centered(c: &mut Canvas<'_>, y: i32, text: &str, fg: Color, bg: Color) {
    let len = text.chars().count() as i32;
    let x = (c.width() as i32 - len) / 2;
    c.put_str(x.max(0), y, text, fg, bg);
}

fn draw_box(c: &mut Canvas<'_>, x: i32, y: i32, w: u16, h: u16, title: &str, p: &Palette) {
    if w < 2 || h < 2 {
        return;
    }
    let (right, bottom) = (x + w as i32 - 1, y + h as i32 - 1);
    let edge = Cell::new('─', p.border, p.bg);
    c.hline(x + 1, y, w - 2, edge);
    c.hline(x + 1, bottom, w - 2, edge);
    for row in y + 1..bottom {
        c.put(x, row, '│', p.border, p.bg);
        c.put(right, row, '│', p.border, p.bg);
    }
    c.put(x, y, '┌', p.border, p.bg);
    c.put(right, y, '┐', p.border, p.bg);
    c.put(x, bottom, '└', p.border, p.bg);
    c.put(right, bottom, '┘', p.border, p.bg);
    if !title.is_empty() {
        let title = fit(&format!(" {} ", title), w.saturating_sub(4) as usize);
        c.put_str(x + 2, y, &title, p.primary, p.bg);
    }
}

/// Filled and empty cells for `fraction` of `width`.
#[allow(clippy::too_many_arguments)]
fn draw_bar(c: &mut Canvas<'_>, x: i32, y: i32, width: u16, fraction: f64, fill: Color, empty: Color, bg: Color) {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64).round() as u16).min(width);
    c.hline(x, y, filled, Cell::new('█', fill, bg));
    c.hline(x + filled as i32, y, width - filled, Cell::new('░', empty, bg));
}

fn draw_header(c: &mut Canvas<'_>, title: &str, p: &Palette) {
    c.hline(0, 0, c.width(), Cell::new(' ', p.bg, p.primary));
    c.put_str(1, 0, "DECK", p.bg, p.primary);
    let len = title.chars().count() as i32;
    c.put_str(c.width() as i32 - len - 1, 0, title, p.bg, p.primary);
}

fn draw_footer(c: &mut Canvas<'_>, chrome: &Chrome<'_>, p: &Palette) {
    let viz = if chrome.viz.enabled() {
        chrome.viz.mode().name()
    } else {
        "OFF"
    };
    let text = format!(
        " THEME: {} │ VISUALIZER: {} │ INTENSITY: {:.1}x │ FPS: {:.0} ",
        chrome.theme.name(),
        viz,
        chrome.viz.intensity(),
        chrome.fps
    );
    let y = c.height() as i32 - 1;
    c.hline(0, y, c.width(), Cell::new(' ', p.text, p.border));
    c.put_str(0, y, &fit(&text, c.width() as usize), p.text, p.border);
}

fn draw_status_and_hints(c: &mut Canvas<'_>, chrome: &Chrome<'_>, screen: Screen, p: &Palette) {
    let width = c.width().saturating_sub(2) as usize;
    let y = c.height() as i32;
    if let Some(status) = chrome.status {
        c.put_str(1, y - 3, &fit(status, width), p.status, p.bg);
    }
    c.put_str(1, y - 2, &fit(hints(screen), width), p.secondary, p.bg);
}

fn too_small(c: &mut Canvas<'_>, p: &Palette) -> bool {
    if c.width() >= MIN_WIDTH && c.height() >= MIN_HEIGHT {
        return false;
    }
    let y = c.height() as i32 / 2;
    centered(c, y, "Terminal too small", p.warning, p.bg);
    true
}

// ── Player ───────────────────────────────────────────────────────────────────

pub fn draw_player(c: &mut Canvas<'_>, chrome: &Chrome<'_>, view: &PlayerView<'_>) {
    let p = chrome.theme.palette();
    if too_small(c, &p) {
        return;
    }
    let (w, h) = (c.width(), c.height() as i32);
    draw_header(c, "TERMINAL PLAYER", &p);

    let viz_top = 2;
    let bottom = h - PLAYER_FOOTER_ROWS;
    let viz_h = (bottom - viz_top).max(0) as u16;
    draw_box(c, 1, viz_top, w - 2, viz_h, "VISUALIZER", &p);
    draw_visualizer(c, chrome.viz, view.status == PlayerStatus::Paused, 2, viz_top + 1, w - 4, viz_h.saturating_sub(2), &p);

    let y = bottom;
    let inner = w.saturating_sub(4) as usize;
    c.put_str(2, y, "NOW PLAYING", p.secondary, p.bg);
    let name = view.track.as_deref().unwrap_or("Nothing queued");
    c.put_str(2, y + 1, &fit(name, inner), p.highlight, p.bg);

    let (label, color) = match view.status {
        PlayerStatus::Playing => ("> PLAYING", p.success),
        PlayerStatus::Paused => ("|| PAUSED", p.warning),
        PlayerStatus::Stopped => ("[] STOPPED", p.secondary),
    };
    let mut x = c.put_str(2, y + 2, label, color, p.bg) + 2;
    if view.state.shuffle_enabled {
        x = c.put_str(x, y + 2, "SHUFFLE", p.accent, p.bg) + 2;
    }
    if view.state.repeat_enabled {
        x = c.put_str(x, y + 2, "REPEAT", p.accent, p.bg) + 2;
    }
    if view.status != PlayerStatus::Stopped && !view.connected {
        c.put_str(x, y + 2, "ENGINE OFFLINE", p.warning, p.bg);
    }

    let duration = if view.state.duration_secs > 0.0 {
        view.state.duration_secs
    } else {
        -1.0
    };
    let time = format!(
        "{} / {}",
        format_time(view.state.position_secs),
        format_time(duration)
    );
    c.put_str(2, y + 4, &time, p.text, p.bg);
    if view.queue_len > 0 {
        let count = format!("Track {} of {}", view.state.current_index + 1, view.queue_len);
        let cx = w as i32 - 2 - count.chars().count() as i32;
        c.put_str(cx, y + 4, &count, p.secondary, p.bg);
    }
    draw_bar(c, 2, y + 5, w - 4, view.state.progress(), p.progress, p.progress_bg, p.bg);

    let x = c.put_str(2, y + 6, "VOL ", p.text, p.bg);
    let vol_w = 20.min(w.saturating_sub(12));
    draw_bar(c, x, y + 6, vol_w, view.state.volume / 100.0, p.volume, p.volume_bg, p.bg);
    c.put_str(x + vol_w as i32 + 1, y + 6, &format!("{:.0}%", view.state.volume), p.text, p.bg);

    draw_status_and_hints(c, chrome, Screen::Player, &p);
    draw_footer(c, chrome, &p);
}

fn gradient(p: &Palette, fraction: f32) -> Color {
    if fraction < 1.0 / 3.0 {
        p.viz[0]
    } else if fraction < 2.0 / 3.0 {
        p.viz[1]
    } else {
        p.viz[2]
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_visualizer(c: &mut Canvas<'_>, viz: &Visualizer, paused: bool, x: i32, y: i32, w: u16, h: u16, p: &Palette) {
    if w == 0 || h == 0 {
        return;
    }
    let mid = y + h as i32 / 2;
    if !viz.enabled() {
        let text = "VISUALIZER OFF";
        c.put_str(x + (w as i32 - text.len() as i32) / 2, mid, text, p.secondary, p.bg);
        return;
    }
    if paused && viz.is_silent() {
        let text = "VISUALIZER PAUSED";
        c.put_str(x + (w as i32 - text.len() as i32) / 2, mid, text, p.secondary, p.bg);
        return;
    }

    let area = Area { x, y, w, h };
    match viz.mode() {
        VizMode::Bars | VizMode::Wave => draw_columns(c, viz, area, p),
        VizMode::Spectrum => draw_spectrum(c, viz, area, p),
        VizMode::Equalizer => draw_equalizer(c, viz, area, p),
        VizMode::Spiral => draw_spiral(c, viz, area, p),
        VizMode::Particles => draw_sprites(c, viz.particles(), area, p, |s| gradient(p, s.level)),
        VizMode::Stars => draw_sprites(c, viz.stars(), area, p, |s| gradient(p, s.level)),
        VizMode::Matrix => draw_sprites(c, viz.rain(), area, p, |s| {
            if s.level > 0.8 {
                p.highlight
            } else {
                p.viz[0]
            }
        }),
    }
}

/// Inner rectangle of the visualizer box.
#[derive(Clone, Copy)]
struct Area {
    x: i32,
    y: i32,
    w: u16,
    h: u16,
}

impl Area {
    fn bottom(&self) -> i32 {
        self.y + self.h as i32 - 1
    }

    /// Cell for a box-relative point.
    fn cell(&self, fx: f32, fy: f32) -> (i32, i32) {
        let cx = self.x + (fx.clamp(0.0, 1.0) * (self.w - 1) as f32).round() as i32;
        let cy = self.y + (fy.clamp(0.0, 1.0) * (self.h - 1) as f32).round() as i32;
        (cx, cy)
    }
}

fn draw_columns(c: &mut Canvas<'_>, viz: &Visualizer, a: Area, p: &Palette) {
    let span = (a.w.max(2) - 1) as f32;
    let (h, bottom) = (a.h, a.bottom());
    for col in 0..a.w {
        let pos = col as f32 / span;
        let cx = a.x + col as i32;
        if viz.mode() == VizMode::Wave {
            let level = (viz.sample(pos) + viz.ripple(pos)).clamp(0.0, 1.0);
            let row = ((1.0 - level) * (h - 1) as f32).round() as i32;
            c.put(cx, a.y + row, '•', gradient(p, level), p.bg);
            for below in a.y + row + 1..=bottom {
                c.put(cx, below, '│', p.viz[0], p.bg);
            }
            continue;
        }
        let eighths = (viz.sample(pos) * h as f32 * 8.0).round() as i32;
        let (full, part) = (eighths / 8, eighths % 8);
        for row in 0..full.min(h as i32) {
            let color = gradient(p, row as f32 / h as f32);
            c.put(cx, bottom - row, '█', color, p.bg);
        }
        if part > 0 && full < h as i32 {
            let color = gradient(p, full as f32 / h as f32);
            c.put(cx, bottom - full, EIGHTHS[part as usize - 1], color, p.bg);
        }
    }
}

/// Two-column bands on a log scale with shaded blocks; low bands get a boost.
fn draw_spectrum(c: &mut Canvas<'_>, viz: &Visualizer, a: Area, p: &Palette) {
    let count = (a.w / 3).max(1) as usize;
    let log_span = ((count + 1) as f32).ln();
    for i in 0..count {
        let pos = ((i + 1) as f32).ln() / log_span;
        let boost = if pos < 0.25 {
            1.4
        } else if pos < 0.5 {
            1.2
        } else {
            1.0
        };
        let level = (viz.sample(pos) * boost).min(1.0);
        let height = ((level * a.h as f32).round() as i32).min(a.h as i32);
        let bx = a.x + i as i32 * 3;
        for row in 0..height {
            let glyph = if row == height - 1 {
                '▀'
            } else if row as f32 > height as f32 * 0.8 {
                '▓'
            } else if row as f32 > height as f32 * 0.5 {
                '▒'
            } else {
                '░'
            };
            let color = gradient(p, row as f32 / a.h as f32);
            c.put(bx, a.bottom() - row, glyph, color, p.bg);
            c.put(bx + 1, a.bottom() - row, glyph, color, p.bg);
        }
    }
}

const EQ_LABELS: [&str; 5] = ["60", "250", "1K", "4K", "16K"];

/// Solid bars over a frequency scale on the bottom row.
fn draw_equalizer(c: &mut Canvas<'_>, viz: &Visualizer, a: Area, p: &Palette) {
    let labelled = a.h >= 3;
    let bar_h = if labelled { a.h - 1 } else { a.h };
    let count = a.w.min(BANDS as u16).max(1);
    let band_w = (a.w / count).max(1);
    let bar_w = if band_w > 1 { band_w - 1 } else { 1 };
    let bar_bottom = a.y + bar_h as i32 - 1;
    for i in 0..count {
        let level = viz.sample(i as f32 / (count.max(2) - 1) as f32);
        let height = ((level * bar_h as f32).round() as i32).min(bar_h as i32);
        let color = gradient(p, level);
        let bx = a.x + (i * band_w) as i32;
        for row in 0..height {
            c.hline(bx, bar_bottom - row, bar_w, Cell::new('█', color, p.bg));
        }
    }
    if labelled {
        for (k, label) in EQ_LABELS.iter().enumerate() {
            let lx = a.x + (k as u32 * a.w as u32 / EQ_LABELS.len() as u32) as i32;
            c.put_str(lx, a.bottom(), label, p.text, p.bg);
        }
    }
}

/// Bands as points around a slowly turning circle.
fn draw_spiral(c: &mut Canvas<'_>, viz: &Visualizer, a: Area, p: &Palette) {
    let (cx, cy) = (a.w as f32 / 2.0, a.h as f32 / 2.0);
    // Cells are about twice as tall as wide.
    let radius = (cx / 2.0).min(cy) - 1.0;
    if radius <= 0.0 {
        return;
    }
    for i in 0..BANDS {
        let pos = i as f32 / BANDS as f32;
        let level = viz.sample(pos);
        let angle = pos * 2.0 * PI + viz.phase() * 0.5;
        let r = level * radius;
        let px = a.x + (cx + angle.cos() * r * 2.0) as i32;
        let py = a.y + (cy + angle.sin() * r) as i32;
        if px >= a.x && px < a.x + a.w as i32 && py >= a.y && py <= a.bottom() {
            c.put(px, py, '●', gradient(p, level), p.bg);
        }
    }
}

fn draw_sprites(c: &mut Canvas<'_>, sprites: &[Sprite], a: Area, p: &Palette, color: impl Fn(&Sprite) -> Color) {
    for sprite in sprites {
        let (sx, sy) = a.cell(sprite.x, sprite.y);
        c.put(sx, sy, sprite.glyph, color(sprite), p.bg);
    }
}

// ── Lists ────────────────────────────────────────────────────────────────────

/// First index to show so that `selected` stays inside `rows` lines.
fn scroll_offset(selected: usize, rows: usize) -> usize {
    if rows == 0 {
        return selected;
    }
    selected.saturating_sub(rows - 1)
}

fn draw_row(c: &mut Canvas<'_>, y: i32, text: &str, selected: bool, fg: Color, p: &Palette) {
    let width = c.width().saturating_sub(6);
    let text = fit(text, width as usize);
    if selected {
        c.hline(3, y, width, Cell::new(' ', p.bg, p.highlight));
        c.put_str(3, y, &text, p.bg, p.highlight);
    } else {
        c.put_str(3, y, &text, fg, p.bg);
    }
}

fn list_frame(c: &mut Canvas<'_>, title: &str, p: &Palette) -> (i32, usize) {
    let h = c.height() as i32;
    let box_h = (h - 6).max(2) as u16;
    let w = c.width();
    draw_box(c, 1, 2, w - 2, box_h, title, p);
    (3, box_h.saturating_sub(2) as usize)
}

pub fn draw_browser(c: &mut Canvas<'_>, chrome: &Chrome<'_>, browser: &Browser, queue: &[PathBuf]) {
    let p = chrome.theme.palette();
    if too_small(c, &p) {
        return;
    }
    draw_header(c, "FILE BROWSER", &p);
    let path = browser.cwd().display().to_string();
    c.put_str(2, 1, &fit_left(&path, c.width().saturating_sub(4) as usize), p.secondary, p.bg);

    let (top, rows) = list_frame(c, "FILES", &p);
    let (start, visible) = browser.visible();
    let local = browser.selected() - start;
    let offset = scroll_offset(local, rows);
    for (i, entry) in visible.iter().enumerate().skip(offset).take(rows) {
        let queued = entry.kind == EntryKind::Track && queue.contains(&entry.path);
        let fg = match entry.kind {
            EntryKind::Parent | EntryKind::Directory => p.secondary,
            EntryKind::Track if queued => p.accent,
            EntryKind::Track => p.text,
        };
        let marker = if queued { "+ " } else { "  " };
        let y = top + (i - offset) as i32;
        draw_row(c, y, &format!("{}{}", marker, entry.label()), i == local, fg, &p);
    }
    if browser.entries().is_empty() {
        c.put_str(3, top, "(empty)", p.secondary, p.bg);
    }

    let page = format!(
        "Page {}/{}  {} entries",
        browser.page() + 1,
        browser.page_count(),
        browser.entries().len()
    );
    let y = c.height() as i32 - 4;
    c.put_str(2, y, &page, p.secondary, p.bg);

    draw_status_and_hints(c, chrome, Screen::Browser, &p);
    draw_footer(c, chrome, &p);
}

pub fn draw_tracks(c: &mut Canvas<'_>, chrome: &Chrome<'_>, queue: &[PathBuf], current: Option<usize>, selected: usize) {
    let p = chrome.theme.palette();
    if too_small(c, &p) {
        return;
    }
    draw_header(c, "TRACK LIST", &p);
    c.put_str(2, 1, &format!("{} tracks queued", queue.len()), p.secondary, p.bg);

    let (top, rows) = list_frame(c, "QUEUE", &p);
    if queue.is_empty() {
        c.put_str(3, top, "Queue is empty. Press f to browse files.", p.secondary, p.bg);
    }
    let offset = scroll_offset(selected, rows);
    for (i, track) in queue.iter().enumerate().skip(offset).take(rows) {
        let is_current = current == Some(i);
        let marker = if is_current { '>' } else { ' ' };
        let text = format!("{} {:>3}. {}", marker, i + 1, display_name(track));
        let fg = if is_current { p.primary } else { p.text };
        draw_row(c, top + (i - offset) as i32, &text, i == selected, fg, &p);
    }

    draw_status_and_hints(c, chrome, Screen::Tracks, &p);
    draw_footer(c, chrome, &p);
}

pub fn draw_themes(c: &mut Canvas<'_>, chrome: &Chrome<'_>, selected: usize) {
    let p = chrome.theme.palette();
    if too_small(c, &p) {
        return;
    }
    draw_header(c, "THEMES", &p);
    let (top, rows) = list_frame(c, "PALETTES", &p);
    for (i, theme) in Theme::ALL.iter().enumerate().take(rows) {
        let y = top + i as i32;
        let marker = if *theme == chrome.theme { '*' } else { ' ' };
        draw_row(c, y, &format!("{} {:<12}", marker, theme.name()), i == selected, p.text, &p);
        let swatch = theme.palette();
        let colors = [swatch.primary, swatch.secondary, swatch.accent, swatch.viz[0], swatch.viz[1], swatch.viz[2]];
        for (j, color) in colors.into_iter().enumerate() {
            c.put(20 + j as i32 * 2, y, '█', color, p.bg);
        }
    }

    draw_status_and_hints(c, chrome, Screen::Themes, &p);
    draw_footer(c, chrome, &p);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Library;
    use crate::render::Grid;

    fn chrome(viz: &Visualizer) -> Chrome<'_> {
        Chrome {
            theme: Theme::Lain,
            fps: 30.0,
            viz,
            status: Some("Volume: 55%"),
        }
    }

    fn rows(grid: &Grid) -> Vec<String> {
        (0..grid.height()).map(|y| grid.row_text(y)).collect()
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(83.9), "01:23");
        assert_eq!(format_time(3725.0), "62:05");
        assert_eq!(format_time(-1.0), "--:--");
        assert_eq!(format_time(f64::NAN), "--:--");
    }

    #[test]
    fn test_fit_truncates_with_ellipsis() {
        assert_eq!(fit("abcdef", 10), "abcdef");
        assert_eq!(fit("abcdef", 4), "abc…");
        assert_eq!(fit_left("/music/album", 6), "…album");
    }

    #[test]
    fn test_player_screen_shows_track_and_footer() {
        let viz = Visualizer::new();
        let state = PlaybackState {
            position_secs: 65.0,
            duration_secs: 0.0,
            shuffle_enabled: true,
            ..PlaybackState::with_volume(55.0)
        };
        let view = PlayerView {
            state: &state,
            track: Some("song.mp3".to_string()),
            status: PlayerStatus::Playing,
            connected: true,
            queue_len: 3,
        };
        let mut grid = Grid::new(80, 24, Cell::default());
        draw_player(&mut Canvas::new(&mut grid), &chrome(&viz), &view);

        let text = rows(&grid).join("\n");
        assert!(text.contains("song.mp3"));
        assert!(text.contains("> PLAYING  SHUFFLE"));
        assert!(text.contains("01:05 / --:--"));
        assert!(text.contains("Track 1 of 3"));
        assert!(text.contains("55%"));
        assert!(text.contains("Volume: 55%"));
        assert!(grid.row_text(23).contains("THEME: Lain │ VISUALIZER: BARS │ INTENSITY: 1.0x │ FPS: 30"));
    }

    #[test]
    fn test_paused_silent_visualizer_says_paused() {
        let viz = Visualizer::new();
        let state = PlaybackState::default();
        let view = PlayerView {
            state: &state,
            track: Some("song.mp3".to_string()),
            status: PlayerStatus::Paused,
            connected: false,
            queue_len: 1,
        };
        let mut grid = Grid::new(80, 24, Cell::default());
        draw_player(&mut Canvas::new(&mut grid), &chrome(&viz), &view);
        let text = rows(&grid).join("\n");
        assert!(text.contains("VISUALIZER PAUSED"));
        assert!(text.contains("ENGINE OFFLINE"));
    }

    fn playing_grid(viz: &Visualizer) -> Grid {
        let state = PlaybackState::default();
        let view = PlayerView {
            state: &state,
            track: Some("song.mp3".to_string()),
            status: PlayerStatus::Playing,
            connected: true,
            queue_len: 1,
        };
        let mut grid = Grid::new(80, 24, Cell::default());
        draw_player(&mut Canvas::new(&mut grid), &chrome(viz), &view);
        grid
    }

    #[test]
    fn test_equalizer_draws_bars_over_frequency_labels() {
        let mut viz = Visualizer::new();
        while viz.mode() != VizMode::Equalizer {
            viz.cycle_mode();
        }
        viz.set_levels(0.8);
        let grid = playing_grid(&viz);

        // Box spans rows 2..=13; the label row is the last inner row.
        let labels = grid.row_text(12);
        assert!(labels.contains("60"));
        assert!(labels.contains("16K"));
        assert!(grid.row_text(11).contains('█'));
        assert!(grid.row_text(23).contains("VISUALIZER: EQUALIZER"));
    }

    #[test]
    fn test_starfield_draws_inside_the_box() {
        let mut viz = Visualizer::new();
        while viz.mode() != VizMode::Stars {
            viz.cycle_mode();
        }
        let grid = playing_grid(&viz);
        let inside: String = (3..13).map(|y| grid.row_text(y)).collect();
        assert!(inside.contains(['★', '✦', '•']));
        assert!(!grid.row_text(1).contains(['★', '✦', '•']));
    }

    #[test]
    fn test_small_terminal_gets_a_notice() {
        let viz = Visualizer::new();
        let state = PlaybackState::default();
        let view = PlayerView {
            state: &state,
            track: None,
            status: PlayerStatus::Stopped,
            connected: false,
            queue_len: 0,
        };
        let mut grid = Grid::new(30, 5, Cell::default());
        draw_player(&mut Canvas::new(&mut grid), &chrome(&viz), &view);
        assert!(grid.row_text(2).contains("Terminal too small"));
    }

    #[test]
    fn test_track_list_marks_current_track() {
        let viz = Visualizer::new();
        let queue = vec![PathBuf::from("/m/a.mp3"), PathBuf::from("/m/b.mp3")];
        let mut grid = Grid::new(60, 20, Cell::default());
        draw_tracks(&mut Canvas::new(&mut grid), &chrome(&viz), &queue, Some(1), 0);
        let text = rows(&grid).join("\n");
        assert!(text.contains("    1. a.mp3"));
        assert!(text.contains(">   2. b.mp3"));
    }

    #[test]
    fn test_browser_lists_entries_and_queued_marker() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"").unwrap();
        let library = Library::new(&["mp3".to_string()]);
        let browser = Browser::open(library, dir.path().to_path_buf(), 20);
        let queue = vec![dir.path().join("a.mp3")];

        let viz = Visualizer::new();
        let mut grid = Grid::new(60, 20, Cell::default());
        draw_browser(&mut Canvas::new(&mut grid), &chrome(&viz), &browser, &queue);
        let text = rows(&grid).join("\n");
        assert!(text.contains("  [..]"));
        assert!(text.contains("  [sub]"));
        assert!(text.contains("+ a.mp3"));
        assert!(text.contains("Page 1/1  3 entries"));
    }

    #[test]
    fn test_theme_picker_marks_active_theme() {
        let viz = Visualizer::new();
        let mut grid = Grid::new(60, 20, Cell::default());
        draw_themes(&mut Canvas::new(&mut grid), &chrome(&viz), 2);
        let text = rows(&grid).join("\n");
        assert!(text.contains("* Lain"));
        assert!(text.contains("  Neon"));
    }
}
