// rust/arc-data-core/src/task.rs

//! Task data model: grids, input/output pairs and tasks.

use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

/// Number of colors in the palette: ARC colors 0-9, 10 marks outer
/// boundaries and 11 marks empty cells.
pub const PALETTE_SIZE: u8 = 12;

/// A single color index.
pub type Color = u8;

/// Rows of color indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid(pub Vec<Vec<Color>>);

impl Grid {
    pub fn new(rows: Vec<Vec<Color>>) -> Self {
        Self(rows)
    }

    /// A `rows` x `cols` grid filled with `color`.
    pub fn filled(rows: usize, cols: usize, color: Color) -> Self {
        Self(vec![vec![color; cols]; rows])
    }

    pub fn rows(&self) -> &[Vec<Color>] {
        &self.0
    }

    pub fn height(&self) -> usize {
        self.0.len()
    }

    /// Width of the first row; zero for an empty grid.
    pub fn width(&self) -> usize {
        self.0.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Color> {
        self.0.get(row).and_then(|r| r.get(col)).copied()
    }

    /// All rows have the same length.
    pub fn is_rectangular(&self) -> bool {
        let width = self.width();
        self.0.iter().all(|row| row.len() == width)
    }

    /// Checks rectangularity and that every color is inside the palette.
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` error describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if !self.is_rectangular() {
            return Err(DataError::serialization(format!(
                "grid rows have unequal lengths (first row has {} cells)",
                self.width()
            )));
        }
        for (r, row) in self.0.iter().enumerate() {
            if let Some((c, color)) = row.iter().enumerate().find(|(_, v)| **v >= PALETTE_SIZE) {
                return Err(DataError::serialization(format!(
                    "color {color} at ({r}, {c}) is outside the palette 0..{PALETTE_SIZE}"
                )));
            }
        }
        Ok(())
    }
}

impl From<Vec<Vec<Color>>> for Grid {
    fn from(rows: Vec<Vec<Color>>) -> Self {
        Self(rows)
    }
}

/// One input/output example. Test pairs may come without an output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub input: Grid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Grid>,
}

impl Pair {
    pub fn new(input: Grid, output: Grid) -> Self {
        Self {
            input,
            output: Some(output),
        }
    }

    /// A pair whose output is withheld.
    pub fn unsolved(input: Grid) -> Self {
        Self {
            input,
            output: None,
        }
    }
}

/// A puzzle: demonstration pairs and evaluation pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub train: Vec<Pair>,
    pub test: Vec<Pair>,
}

impl Task {
    pub fn new(train: Vec<Pair>, test: Vec<Pair>) -> Self {
        Self { train, test }
    }

    /// Train pairs followed by test pairs.
    pub fn pairs(&self) -> impl Iterator<Item = &Pair> {
        self.train.iter().chain(self.test.iter())
    }

    /// Checks that both pair lists are non-empty and every grid is valid.
    ///
    /// Decoding never calls this; it is for callers that want the
    /// structural guarantees (the renderer, exporters).
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` error describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.train.is_empty() {
            return Err(DataError::serialization("task has no train pairs"));
        }
        if self.test.is_empty() {
            return Err(DataError::serialization("task has no test pairs"));
        }
        for pair in self.pairs() {
            pair.input.validate()?;
            if let Some(output) = &pair.output {
                output.validate()?;
            }
        }
        Ok(())
    }
}

/// An identifier and its task, as surfaced by the loader.
pub type Sample = (String, Task);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_dimensions() {
        let grid = Grid::new(vec![vec![1, 2, 3], vec![4, 5, 6]]);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.get(1, 2), Some(6));
        assert_eq!(grid.get(2, 0), None);

        let empty = Grid::default();
        assert!(empty.is_empty());
        assert_eq!(empty.width(), 0);
        assert!(empty.is_rectangular());
    }

    #[test]
    fn test_grid_validate() {
        assert!(Grid::filled(3, 3, 11).validate().is_ok());

        let ragged = Grid::new(vec![vec![1, 2], vec![3]]);
        assert!(!ragged.is_rectangular());
        assert!(ragged.validate().is_err());

        let out_of_palette = Grid::new(vec![vec![0, 12]]);
        let err = out_of_palette.validate().unwrap_err().to_string();
        assert!(err.contains("(0, 1)"));
    }

    #[test]
    fn test_task_validate() {
        let pair = Pair::new(Grid::new(vec![vec![1]]), Grid::new(vec![vec![2]]));
        let task = Task::new(vec![pair.clone()], vec![Pair::unsolved(Grid::new(vec![vec![3]]))]);
        assert!(task.validate().is_ok());
        assert_eq!(task.pairs().count(), 2);

        let no_test = Task::new(vec![pair], vec![]);
        assert!(no_test.validate().is_err());

        let no_train = Task::new(vec![], vec![Pair::unsolved(Grid::new(vec![vec![3]]))]);
        assert!(no_train.validate().is_err());
    }

    #[test]
    fn test_pair_without_output_skips_field() {
        let json = serde_json::to_string(&Pair::unsolved(Grid::new(vec![vec![0]]))).unwrap();
        assert_eq!(json, r#"{"input":[[0]]}"#);
    }
}
