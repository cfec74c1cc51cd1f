use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pieces::{Rank, Side};

pub const ROWS: usize = 8;
pub const COLS: usize = 9;

/// A square on the board. Coordinates are signed so that requests naming
/// off-board squares can be represented and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: i8,
    pub col: i8,
}

impl Position {
    pub fn new(row: i8, col: i8) -> Self {
        Self { row, col }
    }

    pub fn in_bounds(self) -> bool {
        (0..ROWS as i8).contains(&self.row) && (0..COLS as i8).contains(&self.col)
    }

    /// Manhattan distance exactly 1.
    pub fn is_orthogonally_adjacent(self, other: Position) -> bool {
        let dr = (self.row as i16 - other.row as i16).abs();
        let dc = (self.col as i16 - other.col as i16).abs();
        dr + dc == 1
    }

    pub fn neighbors(self) -> impl Iterator<Item = Position> {
        [(-1, 0), (1, 0), (0, -1), (0, 1)]
            .into_iter()
            .map(move |(dr, dc)| Position::new(self.row + dr, self.col + dc))
            .filter(|p| p.in_bounds())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// An occupied square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub rank: Rank,
    pub side: Side,
    /// One-way: once true it stays true until the piece leaves the board.
    pub revealed: bool,
}

impl Cell {
    pub fn hidden(rank: Rank, side: Side) -> Self {
        Self {
            rank,
            side,
            revealed: false,
        }
    }

    pub fn reveal(&mut self) {
        self.revealed = true;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: [[Option<Cell>; COLS]; ROWS],
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}

impl Board {
    pub fn empty() -> Self {
        Self {
            cells: [[None; COLS]; ROWS],
        }
    }

    /// Returns `None` for empty or off-board squares.
    pub fn get(&self, pos: Position) -> Option<&Cell> {
        if !pos.in_bounds() {
            return None;
        }
        self.cells[pos.row as usize][pos.col as usize].as_ref()
    }

    /// Overwrites the square. Off-board positions are ignored.
    pub fn place(&mut self, pos: Position, cell: Cell) {
        if pos.in_bounds() {
            self.cells[pos.row as usize][pos.col as usize] = Some(cell);
        }
    }

    pub fn take(&mut self, pos: Position) -> Option<Cell> {
        if !pos.in_bounds() {
            return None;
        }
        self.cells[pos.row as usize][pos.col as usize].take()
    }

    pub fn is_empty_at(&self, pos: Position) -> bool {
        self.get(pos).is_none()
    }

    pub fn occupied(&self) -> impl Iterator<Item = (Position, &Cell)> {
        self.cells.iter().enumerate().flat_map(|(r, row)| {
            row.iter().enumerate().filter_map(move |(c, cell)| {
                cell.as_ref()
                    .map(|cell| (Position::new(r as i8, c as i8), cell))
            })
        })
    }

    pub fn piece_count(&self) -> usize {
        self.occupied().count()
    }

    pub fn count_for(&self, side: Side) -> usize {
        self.occupied().filter(|(_, c)| c.side == side).count()
    }

    pub fn flag_of(&self, side: Side) -> Option<Position> {
        self.occupied()
            .find(|(_, c)| c.side == side && c.rank == Rank::Flag)
            .map(|(p, _)| p)
    }

    /// Copy with every `revealed` flag forced false.
    pub fn concealed(&self) -> Board {
        let mut copy = self.clone();
        for cell in copy.cells.iter_mut().flatten().flatten() {
            cell.revealed = false;
        }
        copy
    }

    /// Cell-for-cell comparison that ignores `revealed`.
    pub fn same_pieces(&self, other: &Board) -> bool {
        self.concealed() == other.concealed()
    }

    pub fn rows(&self) -> &[[Option<Cell>; COLS]; ROWS] {
        &self.cells
    }
}
