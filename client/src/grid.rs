//! Destructible terrain grid established at level load

use log::warn;
use shared::TileCode;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("level map has no cells")]
    Empty,
    #[error("level row {row} has {found} cells, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("tile ({x}, {y}) is outside the grid")]
    OutOfBounds { x: i32, y: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub code: TileCode,
    /// Set only for bricks; cleared for good once the brick is shot away.
    pub destructible: bool,
}

impl Cell {
    pub fn new(code: TileCode) -> Self {
        Self {
            code,
            destructible: code.is_destructible(),
        }
    }
}

/// Fixed-size 2-D array of terrain cells.
///
/// Dimensions are decided by the level text and never change afterwards;
/// updates only rewrite cells in place.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    cols: usize,
    rows: usize,
    cells: Vec<Cell>,
}

impl TileGrid {
    /// Parses level rows, one character per cell.
    ///
    /// Unknown characters load as empty cells. Trailing carriage returns are
    /// ignored so that CRLF level files parse the same as LF ones.
    pub fn parse<S: AsRef<str>>(rows: &[S]) -> Result<Self, GridError> {
        let lines: Vec<&str> = rows
            .iter()
            .map(|row| row.as_ref().trim_end_matches('\r'))
            .collect();

        let cols = lines.first().map(|line| line.chars().count()).unwrap_or(0);
        if cols == 0 {
            return Err(GridError::Empty);
        }

        let mut cells = Vec::with_capacity(cols * lines.len());
        for (row, line) in lines.iter().enumerate() {
            let found = line.chars().count();
            if found != cols {
                return Err(GridError::Ragged {
                    row,
                    expected: cols,
                    found,
                });
            }

            for (col, c) in line.chars().enumerate() {
                let code = TileCode::from_char(c).unwrap_or_else(|| {
                    warn!("Unknown tile {:?} at ({}, {}), loading as empty", c, col, row);
                    TileCode::Empty
                });
                cells.push(Cell::new(code));
            }
        }

        Ok(Self {
            cols,
            rows: lines.len(),
            cells,
        })
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.cols || y as usize >= self.rows {
            return None;
        }
        Some(y as usize * self.cols + x as usize)
    }

    pub fn get(&self, x: i32, y: i32) -> Option<Cell> {
        self.index(x, y).map(|i| self.cells[i])
    }

    /// Overwrites one cell with a server-confirmed terrain code.
    pub fn apply_update(&mut self, x: i32, y: i32, code: TileCode) -> Result<Cell, GridError> {
        let index = self.index(x, y).ok_or(GridError::OutOfBounds { x, y })?;
        let cell = Cell::new(code);
        self.cells[index] = cell;
        Ok(cell)
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.get(x, y).map(|cell| cell.code.is_walkable()).unwrap_or(false)
    }

    /// Iterates `(x, y, cell)` in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32, Cell)> + '_ {
        self.cells.iter().enumerate().map(move |(i, cell)| {
            ((i % self.cols) as i32, (i / self.cols) as i32, *cell)
        })
    }

    /// Renders the grid back to level text.
    pub fn to_rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.cols)
            .map(|row| row.iter().map(|cell| cell.code.to_char()).collect())
            .collect()
    }
}
