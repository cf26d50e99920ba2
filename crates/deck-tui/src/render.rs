//! Differential character-grid renderer.
//!
//! Each frame is drawn from scratch into `current`; only cells that differ
//! from what the terminal is known to show (`previous`) are written out.
//! `None` in `previous` means "unknown", which forces that cell to be
//! written on the next pass.

use ratatui::style::Color;
use std::io;
use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub glyph: char,
    pub fg: Color,
    pub bg: Color,
}

impl Cell {
    pub const fn new(glyph: char, fg: Color, bg: Color) -> Self {
        Self { glyph, fg, bg }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::new(' ', Color::Reset, Color::Reset)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(width: u16, height: u16, fill: Cell) -> Self {
        Self {
            width,
            height,
            cells: vec![fill; width as usize * height as usize],
        }
    }

    #[cfg(test)]
    pub fn height(&self) -> u16 {
        self.height
    }

    fn index(&self, x: u16, y: u16) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    #[cfg(test)]
    pub fn get(&self, x: u16, y: u16) -> Option<Cell> {
        self.index(x, y).map(|i| self.cells[i])
    }

    pub fn set(&mut self, x: u16, y: u16, cell: Cell) {
        if let Some(i) = self.index(x, y) {
            self.cells[i] = cell;
        }
    }

    pub fn fill(&mut self, cell: Cell) {
        self.cells.fill(cell);
    }

    /// Glyphs of one row, for assertions.
    #[cfg(test)]
    pub fn row_text(&self, y: u16) -> String {
        (0..self.width)
            .filter_map(|x| self.get(x, y))
            .map(|c| c.glyph)
            .collect()
    }
}

/// Output side of the renderer.  Implemented over crossterm for the real
/// terminal and by a recorder in tests.
pub trait Surface {
    fn size(&self) -> io::Result<(u16, u16)>;
    fn move_to(&mut self, x: u16, y: u16) -> io::Result<()>;
    fn set_colors(&mut self, fg: Color, bg: Color) -> io::Result<()>;
    fn write_glyph(&mut self, glyph: char) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    fn clear(&mut self) -> io::Result<()>;
}

/// Clipped drawing into the scratch grid.  Coordinates are signed so callers
/// can position text partly off-screen.
pub struct Canvas<'a> {
    grid: &'a mut Grid,
}

impl<'a> Canvas<'a> {
    pub fn new(grid: &'a mut Grid) -> Self {
        Self { grid }
    }

    pub fn width(&self) -> u16 {
        self.grid.width
    }

    pub fn height(&self) -> u16 {
        self.grid.height
    }

    pub fn put(&mut self, x: i32, y: i32, glyph: char, fg: Color, bg: Color) {
        let (Ok(x), Ok(y)) = (u16::try_from(x), u16::try_from(y)) else {
            return;
        };
        self.grid.set(x, y, Cell::new(single_column(glyph), fg, bg));
    }

    /// Write `text` left to right starting at `(x, y)`.  Returns the column
    /// just past the text, whether or not it was visible.
    pub fn put_str(&mut self, x: i32, y: i32, text: &str, fg: Color, bg: Color) -> i32 {
        let mut col = x;
        for ch in text.chars() {
            self.put(col, y, ch, fg, bg);
            col += 1;
        }
        col
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: u16, h: u16, cell: Cell) {
        for row in y..y + h as i32 {
            for col in x..x + w as i32 {
                self.put(col, row, cell.glyph, cell.fg, cell.bg);
            }
        }
    }

    pub fn hline(&mut self, x: i32, y: i32, len: u16, cell: Cell) {
        self.fill_rect(x, y, len, 1, cell);
    }
}

/// Every cell holds exactly one column.  Wide and zero-width glyphs become
/// `?`; control characters become blanks.
fn single_column(glyph: char) -> char {
    match glyph.width() {
        Some(1) => glyph,
        None => ' ',
        Some(_) => '?',
    }
}

pub struct DiffRenderer<S: Surface> {
    surface: S,
    current: Grid,
    previous: Vec<Option<Cell>>,
}

impl<S: Surface> DiffRenderer<S> {
    /// Size the grids from the surface.
    pub fn new(surface: S) -> io::Result<Self> {
        let (width, height) = surface.size()?;
        Ok(Self::with_size(surface, width, height))
    }

    pub fn with_size(surface: S, width: u16, height: u16) -> Self {
        Self {
            surface,
            current: Grid::new(width, height, Cell::default()),
            previous: vec![None; width as usize * height as usize],
        }
    }

    pub fn size(&self) -> (u16, u16) {
        (self.current.width, self.current.height)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Reallocate for a new terminal size.  Everything is repainted next frame.
    pub fn resize(&mut self, width: u16, height: u16) -> io::Result<()> {
        self.current = Grid::new(width, height, Cell::default());
        self.previous = vec![None; width as usize * height as usize];
        self.surface.clear()
    }

    /// Forget what the terminal shows, without resizing.
    pub fn invalidate_all(&mut self) {
        self.previous.fill(None);
    }

    /// Draw one frame and write the difference.  Returns the number of
    /// glyphs written.
    pub fn render(&mut self, blank: Cell, draw: impl FnOnce(&mut Canvas<'_>)) -> io::Result<usize> {
        self.current.fill(blank);
        draw(&mut Canvas::new(&mut self.current));

        let written = self.emit_changes();
        if written.is_err() {
            // The terminal is in an unknown state after a partial write.
            self.invalidate_all();
        }
        written
    }

    fn emit_changes(&mut self) -> io::Result<usize> {
        let width = self.current.width;
        let mut writes = 0;
        // Where the terminal cursor sits after the last glyph, and the
        // colours last set; both skip redundant escape sequences.
        let mut cursor: Option<(u16, u16)> = None;
        let mut colors: Option<(Color, Color)> = None;

        for (i, cell) in self.current.cells.iter().enumerate() {
            if self.previous[i] == Some(*cell) {
                continue;
            }
            let x = (i % width as usize) as u16;
            let y = (i / width as usize) as u16;

            if cursor != Some((x, y)) {
                self.surface.move_to(x, y)?;
            }
            if colors != Some((cell.fg, cell.bg)) {
                self.surface.set_colors(cell.fg, cell.bg)?;
                colors = Some((cell.fg, cell.bg));
            }
            self.surface.write_glyph(cell.glyph)?;
            cursor = (x + 1 < width).then_some((x + 1, y));

            self.previous[i] = Some(*cell);
            writes += 1;
        }

        if writes > 0 {
            self.surface.flush()?;
        }
        Ok(writes)
    }
}
