use std::fmt;
use std::str::FromStr;

use lpmix_solver::{LinearExpr, Model, ModelError, Sense, SolverResult, VarId, Variable};
use thiserror::Error;

const SEPARATOR: &str = "+-------+-------+-------+";

#[derive(Error, Debug)]
pub enum PuzzleError {
    #[error("expected 9 rows, found {0}")]
    RowCount(usize),
    #[error("line {line}: expected 9 cells, found {found}")]
    RowLength { line: usize, found: usize },
    #[error("line {line}: invalid cell '{cell}' (use 1-9, or 0 or '.' for blanks)")]
    InvalidCell { line: usize, cell: char },
}

/// A 9x9 grid, 0 for an empty cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board([[u8; 9]; 9]);

impl Board {
    /// The puzzle solved when no file is given.
    pub fn builtin() -> Self {
        Self([
            [7, 2, 0, 0, 0, 0, 0, 0, 0],
            [4, 0, 9, 5, 3, 7, 0, 8, 2],
            [5, 0, 0, 0, 1, 0, 0, 0, 0],
            [0, 0, 1, 0, 2, 0, 5, 6, 3],
            [3, 5, 0, 6, 8, 0, 1, 0, 9],
            [9, 7, 6, 0, 0, 0, 4, 2, 0],
            [6, 0, 7, 2, 4, 1, 8, 3, 0],
            [0, 0, 5, 9, 7, 8, 0, 4, 0],
            [2, 8, 0, 3, 6, 5, 9, 1, 0],
        ])
    }

    pub fn rows(&self) -> &[[u8; 9]; 9] {
        &self.0
    }

    /// Clue at 1-based `(row, col)`, if any.
    fn clue(&self, row: usize, col: usize) -> Option<usize> {
        match self.0[row - 1][col - 1] {
            0 => None,
            value => Some(usize::from(value)),
        }
    }
}

impl FromStr for Board {
    type Err = PuzzleError;

    /// Nine lines of nine cells; blank lines and whitespace are ignored.
    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let mut rows = Vec::new();
        for (index, line) in source.lines().enumerate() {
            let cells: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
            if cells.is_empty() {
                continue;
            }
            let line = index + 1;
            if cells.len() != 9 {
                return Err(PuzzleError::RowLength { line, found: cells.len() });
            }
            let mut row = [0u8; 9];
            for (slot, &cell) in row.iter_mut().zip(&cells) {
                *slot = match cell {
                    '.' => 0,
                    c => c.to_digit(10).map(|d| d as u8).ok_or(PuzzleError::InvalidCell { line, cell: c })?,
                };
            }
            rows.push(row);
        }

        let cells: [[u8; 9]; 9] = rows.try_into().map_err(|rows: Vec<_>| PuzzleError::RowCount(rows.len()))?;
        Ok(Self(cells))
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (r, row) in self.0.iter().enumerate() {
            if r % 3 == 0 {
                writeln!(f, "{SEPARATOR}")?;
            }
            for (c, &cell) in row.iter().enumerate() {
                if c % 3 == 0 {
                    write!(f, "| ")?;
                }
                match cell {
                    0 => write!(f, "  ")?,
                    value => write!(f, "{value} ")?,
                }
            }
            writeln!(f, "|")?;
        }
        write!(f, "{SEPARATOR}")
    }
}

/// The binary choice variables, keyed by 1-based `(value, row, col)`.
/// `get(v, r, c)` is 1 when cell `(r, c)` holds `v`.
pub struct Choices {
    ids: Vec<VarId>,
}

impl Choices {
    fn new(model: &mut Model) -> Result<Self, ModelError> {
        let mut ids = Vec::with_capacity(729);
        for value in 1..=9 {
            for row in 1..=9 {
                for col in 1..=9 {
                    ids.push(model.add_variable(Variable::binary(format!("choice_{value}_{row}_{col}")))?);
                }
            }
        }
        Ok(Self { ids })
    }

    pub fn get(&self, value: usize, row: usize, col: usize) -> VarId {
        self.ids[(value - 1) * 81 + (row - 1) * 9 + (col - 1)]
    }

    fn sum(&self, keys: impl Iterator<Item = (usize, usize, usize)>) -> LinearExpr {
        keys.map(|(value, row, col)| self.get(value, row, col)).sum()
    }
}

/// A Sudoku puzzle written as a 0-1 feasibility model.
pub struct Sudoku {
    pub model: Model,
    pub choices: Choices,
}

impl Sudoku {
    pub fn build(puzzle: &Board) -> Result<Self, ModelError> {
        let mut model = Model::new(Sense::Minimize);
        let choices = Choices::new(&mut model)?;
        let digits = || 1..=9usize;

        for row in digits() {
            for col in digits() {
                let Some(given) = puzzle.clue(row, col) else {
                    continue;
                };
                for value in digits() {
                    let fixed = if value == given { 1.0 } else { 0.0 };
                    model.add_constraint(choices.get(value, row, col).equals(fixed))?;
                }
            }
        }

        for value in digits() {
            for row in digits() {
                let cells = digits().map(|col| (value, row, col));
                model.add_constraint(choices.sum(cells).equals(1.0).with_name(format!("row_{value}_{row}")))?;
            }
            for col in digits() {
                let cells = digits().map(|row| (value, row, col));
                model.add_constraint(choices.sum(cells).equals(1.0).with_name(format!("col_{value}_{col}")))?;
            }
            for (box_row, box_col) in (0..3).flat_map(|r| (0..3).map(move |c| (r, c))) {
                let cells = (1..=3).flat_map(|i| (1..=3).map(move |j| (value, 3 * box_row + i, 3 * box_col + j)));
                model.add_constraint(
                    choices
                        .sum(cells)
                        .equals(1.0)
                        .with_name(format!("box_{value}_{box_row}_{box_col}")),
                )?;
            }
        }

        for row in digits() {
            for col in digits() {
                let values = digits().map(|value| (value, row, col));
                model.add_constraint(choices.sum(values).equals(1.0).with_name(format!("cell_{row}_{col}")))?;
            }
        }

        Ok(Self { model, choices })
    }

    /// Read the filled board off an optimal result. Cells whose choices are
    /// all zero stay empty.
    pub fn decode(&self, result: &SolverResult) -> Board {
        let mut cells = [[0u8; 9]; 9];
        for value in 1..=9 {
            for row in 1..=9 {
                for col in 1..=9 {
                    if result.value(self.choices.get(value, row, col)) == Some(1.0) {
                        cells[row - 1][col - 1] = value as u8;
                    }
                }
            }
        }
        Board(cells)
    }
}
