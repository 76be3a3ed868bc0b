//! Table extraction: strategies, the ROI-cropping adapter and grid types.

mod adapter;
mod strategy;

pub use adapter::{PageExtraction, TableExtractor};
pub use strategy::{CamelotStrategy, TableStrategy, read_grid};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mapping::ColumnMap;
use crate::quality::QualityMetrics;

/// Row-major cell strings; row 0 is the header.
pub type Grid = Vec<Vec<String>>;

/// Table extraction strategy, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Ruling-line based.
    Lattice,
    /// Whitespace/alignment based.
    Stream,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Lattice => "lattice",
            StrategyKind::Stream => "stream",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single strategy produced for one cropped page.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Grids(Vec<Grid>),
    NoGrid,
    BackendError(String),
}

/// Observable record of one strategy attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub page: usize,
    pub strategy: StrategyKind,
    pub status: AttemptStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum AttemptStatus {
    Grids(usize),
    NoGrid,
    BackendError(String),
}

impl From<&StrategyOutcome> for AttemptStatus {
    fn from(outcome: &StrategyOutcome) -> Self {
        match outcome {
            StrategyOutcome::Grids(grids) => AttemptStatus::Grids(grids.len()),
            StrategyOutcome::NoGrid => AttemptStatus::NoGrid,
            StrategyOutcome::BackendError(e) => AttemptStatus::BackendError(e.clone()),
        }
    }
}

/// A grid produced by one strategy on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub page: usize,
    pub strategy: StrategyKind,
    pub grid: Grid,
}

/// A scored candidate table.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedTable {
    pub page: usize,
    pub strategy: StrategyKind,
    pub grid: Grid,
    pub columns: ColumnMap,
    pub metrics: QualityMetrics,
    pub score: f64,
}

impl ExtractedTable {
    pub fn header(&self) -> &[String] {
        self.grid.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rows after the header.
    pub fn data_rows(&self) -> &[Vec<String>] {
        self.grid.get(1..).unwrap_or(&[])
    }
}

/// Trim cells and drop rows without any content.
pub fn tidy_grid(grid: Grid) -> Grid {
    grid.into_iter()
        .map(|row| row.into_iter().map(|c| c.trim().to_string()).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tidy_grid() {
        let grid = vec![
            vec![" Year ".to_string(), "Value".to_string()],
            vec!["".to_string(), "  ".to_string()],
            vec!["2025".to_string(), "100".to_string()],
        ];
        let tidy = tidy_grid(grid);
        assert_eq!(tidy.len(), 2);
        assert_eq!(tidy[0][0], "Year");
    }

    #[test]
    fn test_attempt_status_serializes_tagged() {
        let status = AttemptStatus::from(&StrategyOutcome::BackendError("boom".to_string()));
        assert_eq!(
            serde_json::to_string(&status).unwrap(),
            r#"{"status":"backend_error","detail":"boom"}"#
        );
        assert_eq!(StrategyKind::Lattice.to_string(), "lattice");
    }
}
