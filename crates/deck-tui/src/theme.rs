//! Colour palettes.  One `Palette` is active at a time; switching repaints
//! the whole screen.

use ratatui::style::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub bg: Color,
    pub text: Color,
    pub primary: Color,
    pub secondary: Color,
    pub accent: Color,
    pub border: Color,
    pub highlight: Color,
    pub progress: Color,
    pub progress_bg: Color,
    pub volume: Color,
    pub volume_bg: Color,
    pub status: Color,
    pub warning: Color,
    pub success: Color,
    /// Visualizer gradient, low to high.
    pub viz: [Color; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Lain,
    Cyberpunk,
    Matrix,
    Solarized,
    Dracula,
    Monokai,
    Retro,
    Neon,
}

// ── shared tones ──────────────────────────────────────────────────────────────

const INK: Color = Color::Rgb(12, 12, 16);
const TRACK: Color = Color::Rgb(58, 58, 70);
const WARN: Color = Color::Rgb(255, 200, 80);
const OK: Color = Color::Rgb(80, 200, 120);

impl Theme {
    pub const ALL: [Theme; 8] = [
        Theme::Lain,
        Theme::Cyberpunk,
        Theme::Matrix,
        Theme::Solarized,
        Theme::Dracula,
        Theme::Monokai,
        Theme::Retro,
        Theme::Neon,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Theme::Lain => "Lain",
            Theme::Cyberpunk => "Cyberpunk",
            Theme::Matrix => "Matrix",
            Theme::Solarized => "Solarized",
            Theme::Dracula => "Dracula",
            Theme::Monokai => "Monokai",
            Theme::Retro => "Retro",
            Theme::Neon => "Neon",
        }
    }

    /// Case-insensitive lookup, for the config file.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|&t| t == self).unwrap_or(0)
    }

    pub fn palette(self) -> Palette {
        match self {
            Theme::Lain => Palette {
                bg: INK,
                text: Color::Rgb(120, 220, 230),
                primary: Color::Rgb(220, 110, 220),
                secondary: Color::Rgb(60, 150, 160),
                accent: Color::Rgb(150, 70, 160),
                border: Color::Rgb(60, 150, 160),
                highlight: Color::Rgb(235, 235, 245),
                progress: Color::Rgb(220, 110, 220),
                progress_bg: TRACK,
                volume: Color::Rgb(120, 220, 230),
                volume_bg: TRACK,
                status: OK,
                warning: WARN,
                success: OK,
                viz: [
                    Color::Rgb(150, 70, 160),
                    Color::Rgb(220, 110, 220),
                    Color::Rgb(120, 220, 230),
                ],
            },
            Theme::Cyberpunk => Palette {
                bg: INK,
                text: Color::Rgb(235, 235, 245),
                primary: Color::Rgb(0, 230, 255),
                secondary: Color::Rgb(0, 140, 170),
                accent: Color::Rgb(255, 60, 200),
                border: Color::Rgb(60, 90, 255),
                highlight: Color::Rgb(255, 230, 0),
                progress: Color::Rgb(0, 230, 255),
                progress_bg: TRACK,
                volume: Color::Rgb(60, 90, 255),
                volume_bg: TRACK,
                status: OK,
                warning: WARN,
                success: OK,
                viz: [
                    Color::Rgb(60, 90, 255),
                    Color::Rgb(255, 60, 200),
                    Color::Rgb(0, 230, 255),
                ],
            },
            Theme::Matrix => Palette {
                bg: Color::Rgb(0, 8, 0),
                text: Color::Rgb(0, 230, 65),
                primary: Color::Rgb(0, 140, 40),
                secondary: Color::Rgb(0, 230, 65),
                accent: Color::Rgb(220, 255, 220),
                border: Color::Rgb(0, 110, 30),
                highlight: Color::Rgb(220, 255, 220),
                progress: Color::Rgb(0, 230, 65),
                progress_bg: Color::Rgb(20, 50, 20),
                volume: Color::Rgb(0, 140, 40),
                volume_bg: Color::Rgb(20, 50, 20),
                status: Color::Rgb(220, 255, 220),
                warning: WARN,
                success: Color::Rgb(220, 255, 220),
                viz: [
                    Color::Rgb(0, 110, 30),
                    Color::Rgb(0, 230, 65),
                    Color::Rgb(220, 255, 220),
                ],
            },
            Theme::Solarized => Palette {
                bg: Color::Rgb(0, 43, 54),
                text: Color::Rgb(147, 161, 161),
                primary: Color::Rgb(181, 137, 0),
                secondary: Color::Rgb(203, 75, 22),
                accent: Color::Rgb(42, 161, 152),
                border: Color::Rgb(7, 54, 66),
                highlight: Color::Rgb(253, 246, 227),
                progress: Color::Rgb(181, 137, 0),
                progress_bg: Color::Rgb(7, 54, 66),
                volume: Color::Rgb(42, 161, 152),
                volume_bg: Color::Rgb(7, 54, 66),
                status: Color::Rgb(133, 153, 0),
                warning: Color::Rgb(181, 137, 0),
                success: Color::Rgb(133, 153, 0),
                viz: [
                    Color::Rgb(203, 75, 22),
                    Color::Rgb(181, 137, 0),
                    Color::Rgb(42, 161, 152),
                ],
            },
            Theme::Dracula => Palette {
                bg: Color::Rgb(40, 42, 54),
                text: Color::Rgb(248, 248, 242),
                primary: Color::Rgb(139, 233, 253),
                secondary: Color::Rgb(98, 114, 164),
                accent: Color::Rgb(241, 250, 140),
                border: Color::Rgb(68, 71, 90),
                highlight: Color::Rgb(255, 121, 198),
                progress: Color::Rgb(139, 233, 253),
                progress_bg: Color::Rgb(68, 71, 90),
                volume: Color::Rgb(189, 147, 249),
                volume_bg: Color::Rgb(68, 71, 90),
                status: Color::Rgb(80, 250, 123),
                warning: Color::Rgb(255, 184, 108),
                success: Color::Rgb(80, 250, 123),
                viz: [
                    Color::Rgb(189, 147, 249),
                    Color::Rgb(255, 121, 198),
                    Color::Rgb(139, 233, 253),
                ],
            },
            Theme::Monokai => Palette {
                bg: Color::Rgb(39, 40, 34),
                text: Color::Rgb(248, 248, 242),
                primary: Color::Rgb(230, 219, 116),
                secondary: Color::Rgb(249, 38, 114),
                accent: Color::Rgb(166, 226, 46),
                border: Color::Rgb(117, 113, 94),
                highlight: Color::Rgb(102, 217, 239),
                progress: Color::Rgb(166, 226, 46),
                progress_bg: Color::Rgb(62, 61, 50),
                volume: Color::Rgb(249, 38, 114),
                volume_bg: Color::Rgb(62, 61, 50),
                status: Color::Rgb(102, 217, 239),
                warning: Color::Rgb(253, 151, 31),
                success: Color::Rgb(166, 226, 46),
                viz: [
                    Color::Rgb(249, 38, 114),
                    Color::Rgb(230, 219, 116),
                    Color::Rgb(166, 226, 46),
                ],
            },
            Theme::Retro => Palette {
                bg: Color::Rgb(16, 24, 72),
                text: Color::Rgb(255, 220, 90),
                primary: Color::Rgb(90, 220, 90),
                secondary: Color::Rgb(90, 210, 230),
                accent: Color::Rgb(240, 80, 70),
                border: Color::Rgb(170, 140, 40),
                highlight: Color::Rgb(250, 250, 250),
                progress: Color::Rgb(90, 220, 90),
                progress_bg: Color::Rgb(50, 58, 100),
                volume: Color::Rgb(90, 210, 230),
                volume_bg: Color::Rgb(50, 58, 100),
                status: Color::Rgb(240, 80, 70),
                warning: WARN,
                success: Color::Rgb(90, 220, 90),
                viz: [
                    Color::Rgb(90, 220, 90),
                    Color::Rgb(240, 80, 70),
                    Color::Rgb(90, 210, 230),
                ],
            },
            Theme::Neon => Palette {
                bg: INK,
                text: Color::Rgb(245, 245, 255),
                primary: Color::Rgb(255, 40, 220),
                secondary: Color::Rgb(40, 255, 240),
                accent: Color::Rgb(255, 240, 40),
                border: Color::Rgb(150, 30, 140),
                highlight: Color::Rgb(245, 245, 255),
                progress: Color::Rgb(255, 40, 220),
                progress_bg: TRACK,
                volume: Color::Rgb(40, 255, 240),
                volume_bg: TRACK,
                status: Color::Rgb(255, 240, 40),
                warning: WARN,
                success: OK,
                viz: [
                    Color::Rgb(255, 40, 220),
                    Color::Rgb(40, 255, 240),
                    Color::Rgb(255, 240, 40),
                ],
            },
        }
    }
}
