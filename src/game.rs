//! Core geometry: shape catalog, pieces, grid, collision, lock and line clear.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Colour index of an empty cell.
pub const EMPTY: u8 = 0;

/// Highest colour index a locked cell can hold (one per catalog shape).
pub const MAX_COLOR: u8 = 7;

/// Tetromino kinds (I, O, J, L, T, S, Z).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TetrominoKind {
    I,
    O,
    J,
    L,
    T,
    S,
    Z,
}

impl TetrominoKind {
    pub const ALL: [Self; 7] = [Self::I, Self::O, Self::J, Self::L, Self::T, Self::S, Self::Z];

    /// Spawn-orientation template rows.
    pub fn template(&self) -> &'static [&'static [u8]] {
        match self {
            Self::I => &[&[1, 1, 1, 1]],
            Self::O => &[&[1, 1], &[1, 1]],
            Self::J => &[&[1, 0, 0], &[1, 1, 1]],
            Self::L => &[&[0, 0, 1], &[1, 1, 1]],
            Self::T => &[&[0, 1, 0], &[1, 1, 1]],
            Self::S => &[&[0, 1, 1], &[1, 1, 0]],
            Self::Z => &[&[1, 1, 0], &[0, 1, 1]],
        }
    }

    /// Colour index 1..=7, distinct per kind.
    pub fn color_index(&self) -> u8 {
        match self {
            Self::I => 1,
            Self::O => 2,
            Self::J => 3,
            Self::L => 4,
            Self::T => 5,
            Self::S => 6,
            Self::Z => 7,
        }
    }

    /// Fresh copy of the template; rotating it never touches the catalog.
    pub fn shape(&self) -> Shape {
        Shape::from_rows(self.template().iter().map(|row| row.to_vec()).collect())
    }
}

/// Rectangular, non-empty matrix of 0/1 flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    rows: Vec<Vec<u8>>,
}

impl Shape {
    pub fn from_rows(rows: Vec<Vec<u8>>) -> Self {
        assert!(!rows.is_empty() && !rows[0].is_empty(), "shape must be non-empty");
        assert!(
            rows.iter().all(|r| r.len() == rows[0].len()),
            "shape must be rectangular"
        );
        Self { rows }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.rows[0].len()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    #[cfg(test)]
    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    /// Transpose, then reverse every row: a quarter turn clockwise.
    pub fn rotated(&self) -> Self {
        let (w, h) = (self.width(), self.height());
        let rows = (0..w)
            .map(|col| (0..h).rev().map(|row| self.rows[row][col]).collect())
            .collect();
        Self { rows }
    }

    /// Offsets (dx, dy) of every filled flag, relative to the top-left corner.
    pub fn filled(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.rows.iter().enumerate().flat_map(|(dy, row)| {
            row.iter()
                .enumerate()
                .filter(|&(_, &flag)| flag != 0)
                .map(move |(dx, _)| (dx as i32, dy as i32))
        })
    }
}

/// The active piece: a shape, its grid origin and its colour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub kind: TetrominoKind,
    pub shape: Shape,
    pub x: i32,
    pub y: i32,
    pub color: u8,
}

impl Piece {
    /// New piece of `kind`, centred horizontally on a grid `grid_width` wide, at y = 0.
    pub fn spawn(kind: TetrominoKind, grid_width: usize) -> Self {
        let shape = kind.shape();
        let x = (grid_width as i32 - shape.width() as i32).div_euclid(2);
        Self {
            kind,
            shape,
            x,
            y: 0,
            color: kind.color_index(),
        }
    }

    /// Moves the origin. No legality check; see [`collides`].
    pub fn translate(&mut self, dx: i32, dy: i32) {
        self.x += dx;
        self.y += dy;
    }

    /// Rotates the shape in place. The origin stays put.
    pub fn rotate(&mut self) {
        self.shape = self.shape.rotated();
    }

    /// Absolute grid coordinates of every filled cell.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.shape
            .filled()
            .map(|(dx, dy)| (self.x + dx, self.y + dy))
    }
}

/// Playfield: `height` rows of `width` colour indices. y = 0 is the top row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    rows: VecDeque<Vec<u8>>,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        let rows = (0..height).map(|_| vec![EMPTY; width]).collect();
        Self {
            width,
            height,
            rows,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Colour at (x, y), or `None` when outside the grid.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        self.rows.get(y).and_then(|row| row.get(x)).copied()
    }

    /// Colour at (x, y).
    ///
    /// # Panics
    /// When (x, y) lies outside the grid.
    pub fn cell(&self, x: usize, y: usize) -> u8 {
        match self.get(x, y) {
            Some(c) => c,
            None => panic!(
                "cell ({x}, {y}) outside {}x{} grid",
                self.width, self.height
            ),
        }
    }

    /// # Panics
    /// When (x, y) lies outside the grid or `color` exceeds [`MAX_COLOR`].
    pub fn set_cell(&mut self, x: usize, y: usize, color: u8) {
        assert!(color <= MAX_COLOR, "colour index {color} out of range");
        let (w, h) = (self.width, self.height);
        match self.rows.get_mut(y).and_then(|row| row.get_mut(x)) {
            Some(cell) => *cell = color,
            None => panic!("cell ({x}, {y}) outside {w}x{h} grid"),
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn is_row_full(&self, y: usize) -> bool {
        self.rows[y].iter().all(|&c| c != EMPTY)
    }

    /// Drops every full row and pads the top with as many empty rows.
    /// Surviving rows keep their relative order. Returns the rows removed.
    pub fn clear_full_rows(&mut self) -> u32 {
        let full: Vec<usize> = (0..self.height).filter(|&y| self.is_row_full(y)).collect();
        // Bottom-up so earlier removals leave the remaining indices valid.
        for &y in full.iter().rev() {
            self.rows.remove(y);
        }
        let cleared = full.len();
        for _ in 0..cleared {
            self.rows.push_front(vec![EMPTY; self.width]);
        }
        cleared as u32
    }
}

/// True if `piece`, shifted by (dx, dy), leaves the grid sideways or through the
/// floor, or overlaps a filled cell. Cells above the top edge are free.
pub fn collides(grid: &Grid, piece: &Piece, dx: i32, dy: i32) -> bool {
    piece.cells().any(|(x, y)| {
        let (nx, ny) = (x + dx, y + dy);
        if nx < 0 || nx >= grid.width() as i32 || ny >= grid.height() as i32 {
            return true;
        }
        ny >= 0 && grid.cell(nx as usize, ny as usize) != EMPTY
    })
}

/// Writes the piece's colour into every cell it covers.
///
/// The piece must not collide where it stands.
pub fn lock(grid: &mut Grid, piece: &Piece) {
    for (x, y) in piece.cells() {
        // Rows above the top edge have nowhere to go.
        if y >= 0 {
            grid.set_cell(x as usize, y as usize, piece.color);
        }
    }
}

pub fn clear_lines(grid: &mut Grid) -> u32 {
    grid.clear_full_rows()
}

/// Uniform random choice over the catalog.
#[derive(Debug, Clone)]
pub struct PieceGenerator {
    rng: StdRng,
}

impl PieceGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }

    pub fn next_kind(&mut self) -> TetrominoKind {
        TetrominoKind::ALL[self.rng.random_range(0..TetrominoKind::ALL.len())]
    }
}
