//! Table extraction strategies.

use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, instrument};

use super::{Grid, StrategyKind, StrategyOutcome, tidy_grid};
use crate::external::run_tool;

/// One way of turning a single-page PDF into grids.
pub trait TableStrategy {
    fn kind(&self) -> StrategyKind;

    /// Extract every grid on page 1 of `pdf`. Never panics on bad input;
    /// backend trouble is reported as [`StrategyOutcome::BackendError`].
    fn extract(&self, pdf: &Path) -> StrategyOutcome;
}

/// Runs the camelot CLI with one flavor and reads back its CSV output.
pub struct CamelotStrategy {
    program: String,
    flavor: StrategyKind,
    timeout: Duration,
}

impl CamelotStrategy {
    pub fn new(program: impl Into<String>, flavor: StrategyKind, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            flavor,
            timeout,
        }
    }

    /// Lattice then stream, the default priority order.
    pub fn defaults(program: &str, timeout: Duration) -> Vec<Box<dyn TableStrategy>> {
        vec![
            Box::new(Self::new(program, StrategyKind::Lattice, timeout)),
            Box::new(Self::new(program, StrategyKind::Stream, timeout)),
        ]
    }
}

impl TableStrategy for CamelotStrategy {
    fn kind(&self) -> StrategyKind {
        self.flavor
    }

    #[instrument(skip(self), fields(flavor = %self.flavor))]
    fn extract(&self, pdf: &Path) -> StrategyOutcome {
        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => return StrategyOutcome::BackendError(e.to_string()),
        };
        let output = dir.path().join("table.csv");

        let args = [
            OsStr::new("--pages"),
            OsStr::new("1"),
            OsStr::new("--format"),
            OsStr::new("csv"),
            OsStr::new("--output"),
            output.as_os_str(),
            OsStr::new(self.flavor.as_str()),
            pdf.as_os_str(),
        ];
        if let Err(e) = run_tool(&self.program, args, self.timeout) {
            return StrategyOutcome::BackendError(e.to_string());
        }

        let files = match csv_files(dir.path()) {
            Ok(files) => files,
            Err(e) => return StrategyOutcome::BackendError(e.to_string()),
        };

        let mut grids = Vec::new();
        for file in files {
            let grid = std::fs::File::open(&file)
                .map_err(csv::Error::from)
                .and_then(read_grid);
            match grid {
                Ok(grid) if !grid.is_empty() => grids.push(grid),
                Ok(_) => debug!("{} holds no rows", file.display()),
                Err(e) => return StrategyOutcome::BackendError(e.to_string()),
            }
        }

        debug!("camelot {} produced {} grids", self.flavor, grids.len());
        if grids.is_empty() {
            StrategyOutcome::NoGrid
        } else {
            StrategyOutcome::Grids(grids)
        }
    }
}

/// Read one headerless, ragged CSV into a tidy grid.
pub fn read_grid<R: Read>(reader: R) -> Result<Grid, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut grid = Vec::new();
    for record in rdr.records() {
        let record = record?;
        grid.push(record.iter().map(str::to_string).collect());
    }
    Ok(tidy_grid(grid))
}

/// CSV files in `dir`, ordered by name (camelot numbers them per table).
fn csv_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
