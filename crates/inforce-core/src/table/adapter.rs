//! Crops a page to its ROI and runs the strategies in priority order.

use std::io::Write;

use tracing::{debug, info, instrument, warn};

use super::{AttemptStatus, RawTable, StrategyAttempt, StrategyOutcome, TableStrategy};
use crate::error::Result;
use crate::geometry::Rect;
use crate::pdf::{PdfDocument, save_to_bytes};

/// Grids and attempt records for one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageExtraction {
    pub tables: Vec<RawTable>,
    pub attempts: Vec<StrategyAttempt>,
}

/// Table extraction adapter over an ordered list of strategies.
pub struct TableExtractor {
    strategies: Vec<Box<dyn TableStrategy>>,
}

impl TableExtractor {
    pub fn new(strategies: Vec<Box<dyn TableStrategy>>) -> Self {
        Self { strategies }
    }

    /// Extract grids from `roi` on page `page`.
    ///
    /// Stops at the first strategy yielding a grid. The cropped temp file
    /// is removed when this returns, on every path.
    #[instrument(skip(self, pdf), fields(page = page))]
    pub fn extract(&self, pdf: &PdfDocument, page: usize, roi: &Rect) -> Result<PageExtraction> {
        let mut cropped = pdf.crop_page(page, roi)?;
        let bytes = save_to_bytes(&mut cropped)?;

        let mut file = tempfile::Builder::new()
            .prefix("inforce-roi-")
            .suffix(".pdf")
            .tempfile()?;
        file.write_all(&bytes)?;
        file.flush()?;
        debug!("Cropped page {} to {}", page, file.path().display());

        let mut extraction = PageExtraction::default();
        for strategy in &self.strategies {
            let outcome = strategy.extract(file.path());
            extraction.attempts.push(StrategyAttempt {
                page,
                strategy: strategy.kind(),
                status: AttemptStatus::from(&outcome),
            });

            match outcome {
                StrategyOutcome::Grids(grids) => {
                    info!("{} found {} grids on page {}", strategy.kind(), grids.len(), page);
                    extraction.tables.extend(grids.into_iter().map(|grid| RawTable {
                        page,
                        strategy: strategy.kind(),
                        grid,
                    }));
                    break;
                }
                StrategyOutcome::NoGrid => {
                    debug!("{} found no grid on page {}", strategy.kind(), page);
                }
                StrategyOutcome::BackendError(e) => {
                    warn!("{} failed on page {}: {}", strategy.kind(), page, e);
                }
            }
        }

        Ok(extraction)
    }
}
