//! Proof snips: cropped raster images of selected ledger rows.

use std::ffi::OsStr;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use chrono::Datelike;
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{Issue, Result};
use crate::external::run_tool;
use crate::geometry::Rect;
use crate::mapping::{CanonicalField, clean_year, normalize};
use crate::models::config::SnipConfig;
use crate::models::result::base64_bytes;
use crate::pdf::Page;
use crate::table::ExtractedTable;

/// Minimum share of a row's cells that a page line must show.
pub const MIN_ROW_SHARE: f64 = 0.6;

pub const FIRST_YEAR_ROW: &str = "first_year_row";
pub const CURRENT_YEAR_ROW: &str = "current_year_row";

/// Renders one page of a PDF to a bitmap.
pub trait PageRasterizer {
    fn rasterize(&self, pdf: &Path, page: usize, dpi: u32) -> Result<DynamicImage>;
}

/// poppler `pdftoppm`.
pub struct PdftoppmRasterizer {
    program: String,
    timeout: Duration,
}

impl PdftoppmRasterizer {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn rasterize(&self, pdf: &Path, page: usize, dpi: u32) -> Result<DynamicImage> {
        let dir = tempfile::tempdir()?;
        let root = dir.path().join("page");
        let number = (page + 1).to_string();
        let dpi = dpi.to_string();
        let args = [
            OsStr::new("-png"),
            OsStr::new("-r"),
            OsStr::new(&dpi),
            OsStr::new("-f"),
            OsStr::new(&number),
            OsStr::new("-l"),
            OsStr::new(&number),
            OsStr::new("-singlefile"),
            pdf.as_os_str(),
            root.as_os_str(),
        ];
        run_tool(&self.program, args, self.timeout)?;
        Ok(image::open(root.with_extension("png"))?)
    }
}

/// A cropped proof image of one ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofSnip {
    pub label: String,
    pub page: usize,
    /// Row rectangle in page points.
    pub rect: Rect,
    /// PNG bytes.
    #[serde(with = "base64_bytes")]
    pub image: Vec<u8>,
}

/// Data rows to snip, as (label, index into the data rows).
pub fn snip_rows(table: &ExtractedTable, as_of_year: i32) -> Vec<(&'static str, usize)> {
    let rows = table.data_rows();
    if rows.is_empty() {
        return Vec::new();
    }

    let mut picks = vec![(FIRST_YEAR_ROW, 0)];
    let current = table.columns.get(CanonicalField::Year).and_then(|col| {
        rows.iter()
            .position(|row| row.get(col).and_then(|c| clean_year(c)) == Some(as_of_year))
    });
    if let Some(index) = current.filter(|i| *i != 0) {
        picks.push((CURRENT_YEAR_ROW, index));
    }
    picks
}

/// Rectangle of the page line inside `roi` that best shows `row`.
///
/// A line qualifies when it contains at least [`MIN_ROW_SHARE`] of the
/// row's non-empty cells as whole-word sequences.
pub fn locate_row(page: &Page, roi: &Rect, row: &[String]) -> Option<Rect> {
    let cells: Vec<String> = row
        .iter()
        .map(|c| normalize(c))
        .filter(|c| !c.is_empty())
        .collect();
    if cells.is_empty() {
        return None;
    }

    let mut best: Option<(f64, Rect)> = None;
    for line in page.lines().filter(|l| l.rect.intersects(roi)) {
        let padded = format!(" {} ", normalize(&line.text()));
        let hits = cells
            .iter()
            .filter(|c| padded.contains(&format!(" {} ", c)))
            .count();
        let share = hits as f64 / cells.len() as f64;
        if share >= MIN_ROW_SHARE && best.is_none_or(|(s, _)| share > s) {
            best = Some((share, line.rect));
        }
    }
    best.map(|(_, rect)| rect)
}

/// Crop `rect` (page points) out of a page raster rendered at `dpi`.
pub fn crop_png(raster: &DynamicImage, rect: &Rect, dpi: u32) -> Result<Vec<u8>> {
    let scale = dpi as f32 / 72.0;
    let (width, height) = raster.dimensions();

    let x0 = ((rect.x0 * scale).floor().max(0.0) as u32).min(width.saturating_sub(1));
    let y0 = ((rect.y0 * scale).floor().max(0.0) as u32).min(height.saturating_sub(1));
    let x1 = ((rect.x1 * scale).ceil().max(0.0) as u32).min(width);
    let y1 = ((rect.y1 * scale).ceil().max(0.0) as u32).min(height);

    let cropped = raster.crop_imm(x0, y0, x1.saturating_sub(x0).max(1), y1.saturating_sub(y0).max(1));
    let mut png = Vec::new();
    cropped.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

/// Snips plus the notes for rows that could not be imaged.
#[derive(Debug, Default)]
pub struct SnipOutput {
    pub snips: Vec<ProofSnip>,
    pub issues: Vec<Issue>,
}

pub struct SnipExtractor {
    rasterizer: Box<dyn PageRasterizer>,
    config: SnipConfig,
}

impl SnipExtractor {
    pub fn new(rasterizer: Box<dyn PageRasterizer>, config: SnipConfig) -> Self {
        Self { rasterizer, config }
    }

    /// Configured year of the current row, else the calendar year.
    pub fn as_of_year(&self) -> i32 {
        self.config
            .as_of_year
            .unwrap_or_else(|| chrono::Local::now().year())
    }

    #[instrument(skip_all, fields(page = page.index))]
    pub fn extract(&self, pdf: &Path, page: &Page, roi: &Rect, table: &ExtractedTable) -> SnipOutput {
        let mut output = SnipOutput::default();
        let rows = table.data_rows();

        let mut located = Vec::new();
        for (label, index) in snip_rows(table, self.as_of_year()) {
            match locate_row(page, roi, &rows[index]) {
                Some(rect) => {
                    let rect = rect.expand(self.config.padding).clamp(page.width, page.height);
                    located.push((label, rect));
                }
                None => output.issues.push(Issue::SnipUnavailable {
                    label: label.to_string(),
                    reason: "row not found on page".to_string(),
                }),
            }
        }
        if located.is_empty() {
            return output;
        }

        let raster = match self.rasterizer.rasterize(pdf, page.index, self.config.dpi) {
            Ok(raster) => raster,
            Err(e) => {
                warn!("Rasterizing page {} failed: {}", page.index, e);
                output.issues.extend(located.iter().map(|(label, _)| Issue::SnipUnavailable {
                    label: label.to_string(),
                    reason: e.to_string(),
                }));
                return output;
            }
        };

        for (label, rect) in located {
            match crop_png(&raster, &rect, self.config.dpi) {
                Ok(image) => {
                    debug!("Snip {} at {:?}, {} bytes", label, rect, image.len());
                    output.snips.push(ProofSnip {
                        label: label.to_string(),
                        page: page.index,
                        rect,
                        image,
                    });
                }
                Err(e) => output.issues.push(Issue::SnipUnavailable {
                    label: label.to_string(),
                    reason: e.to_string(),
                }),
            }
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InforceError;
    use crate::mapping::{ColumnMapper, ColumnMap};
    use crate::pdf::test_support::page_from_rows;
    use crate::quality::QualityMetrics;
    use crate::table::StrategyKind;
    use image::RgbImage;

    struct Blank;

    impl PageRasterizer for Blank {
        fn rasterize(&self, _pdf: &Path, _page: usize, dpi: u32) -> Result<DynamicImage> {
            let scale = dpi as f32 / 72.0;
            let (w, h) = ((612.0 * scale) as u32, (792.0 * scale) as u32);
            Ok(DynamicImage::ImageRgb8(RgbImage::new(w, h)))
        }
    }

    struct Broken;

    impl PageRasterizer for Broken {
        fn rasterize(&self, _pdf: &Path, _page: usize, _dpi: u32) -> Result<DynamicImage> {
            Err(InforceError::Config("no renderer".to_string()))
        }
    }

    fn table(grid: &[&[&str]]) -> ExtractedTable {
        let grid: Vec<Vec<String>> = grid
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        let columns: ColumnMap = ColumnMapper::default().map_header(&grid[0]).columns;
        ExtractedTable {
            page: 0,
            strategy: StrategyKind::Lattice,
            grid,
            columns,
            metrics: QualityMetrics::default(),
            score: 0.0,
        }
    }

    fn ledger() -> ExtractedTable {
        table(&[
            &["Policy Year", "Cash Value", "Surrender Charge"],
            &["2025", "100", "10"],
            &["2026", "120", "5"],
            &["2027", "140", "0"],
        ])
    }

    fn config(dpi: u32) -> SnipConfig {
        SnipConfig {
            dpi,
            padding: 2.0,
            as_of_year: Some(2026),
        }
    }

    #[test]
    fn test_snip_rows() {
        let t = ledger();
        assert_eq!(snip_rows(&t, 2026), vec![(FIRST_YEAR_ROW, 0), (CURRENT_YEAR_ROW, 1)]);
        assert_eq!(snip_rows(&t, 2025), vec![(FIRST_YEAR_ROW, 0)]);
        assert_eq!(snip_rows(&t, 1999), vec![(FIRST_YEAR_ROW, 0)]);
    }

    #[test]
    fn test_locate_row_requires_whole_cells() {
        let page = page_from_rows(
            0,
            100.0,
            &[&["Policy", "Year"], &["2025", "100", "10"], &["2026", "120", "5"]],
        );
        let roi = page.rect();
        let row = vec!["2026".to_string(), "120".to_string(), "5".to_string()];
        let rect = locate_row(&page, &roi, &row).unwrap();
        assert_eq!(rect.y0, 124.0);

        // "1" and "12" appear only inside longer numbers
        let row = vec!["2031".to_string(), "1".to_string(), "12".to_string()];
        assert!(locate_row(&page, &roi, &row).is_none());
    }

    #[test]
    fn test_locate_row_stays_inside_roi() {
        let page = page_from_rows(0, 100.0, &[&["2025", "100", "10"]]);
        let roi = Rect::new(0.0, 300.0, 612.0, 792.0);
        let row = vec!["2025".to_string(), "100".to_string(), "10".to_string()];
        assert!(locate_row(&page, &roi, &row).is_none());
    }

    #[test]
    fn test_extract_crops_scaled_png() {
        let page = page_from_rows(
            0,
            100.0,
            &[&["Policy", "Year"], &["2025", "100", "10"], &["2026", "120", "5"]],
        );
        let extractor = SnipExtractor::new(Box::new(Blank), config(144));
        let output = extractor.extract(Path::new("unused.pdf"), &page, &page.rect(), &ledger());

        assert!(output.issues.is_empty());
        assert_eq!(output.snips.len(), 2);
        let first = &output.snips[0];
        assert_eq!(first.label, FIRST_YEAR_ROW);
        assert_eq!(first.rect, Rect::new(34.0, 110.0, 148.0, 124.0));

        let png = image::load_from_memory(&first.image).unwrap();
        assert_eq!(png.dimensions(), (228, 28));
    }

    #[test]
    fn test_missing_row_is_a_note_not_a_placeholder() {
        let page = page_from_rows(0, 100.0, &[&["Policy", "Year"], &["2025", "100", "10"]]);
        let extractor = SnipExtractor::new(Box::new(Blank), config(72));
        let output = extractor.extract(Path::new("unused.pdf"), &page, &page.rect(), &ledger());

        assert_eq!(output.snips.len(), 1);
        assert!(matches!(
            &output.issues[..],
            [Issue::SnipUnavailable { label, .. }] if label == CURRENT_YEAR_ROW
        ));
    }

    #[test]
    fn test_raster_failure_reports_every_row() {
        let page = page_from_rows(0, 100.0, &[&["2025", "100", "10"], &["2026", "120", "5"]]);
        let extractor = SnipExtractor::new(Box::new(Broken), config(72));
        let output = extractor.extract(Path::new("unused.pdf"), &page, &page.rect(), &ledger());
        assert!(output.snips.is_empty());
        assert_eq!(output.issues.len(), 2);
    }
}
