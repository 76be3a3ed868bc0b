//! End-to-end analysis of one illustration PDF.
//!
//! Stages: OCR preflight, page text index, ROI detection, table extraction,
//! column mapping, quality scoring, confidence blending, candidate ranking,
//! series and verifications, narrative fields, proof snips, PII redaction.
//! Only malformed input, I/O failures and a failing text index are fatal;
//! everything else is recorded as a note.

use std::io::Write;
use std::time::Instant;

use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::confidence::{ConfidenceBlender, ConfidenceResult};
use crate::error::{Issue, Result};
use crate::fields::extract_fields;
use crate::mapping::{CanonicalField, ColumnMapper, clean_number, clean_year};
use crate::models::config::InforceConfig;
use crate::models::result::{AnalysisResult, MappedColumn, Series, TableSummary, Verifications, YearValue};
use crate::pdf::{Page, PageSource, PdfDocument, PdftotextSource};
use crate::pii::{EntityRecognizer, PiiLocator, Redactor};
use crate::preflight::{OcrMyPdf, OcrTool, Preflight};
use crate::quality::{QualityReport, assess};
use crate::roi::{Roi, detect_roi};
use crate::snips::{PageRasterizer, PdftoppmRasterizer, SnipExtractor};
use crate::table::{
    AttemptStatus, CamelotStrategy, ExtractedTable, RawTable, StrategyAttempt, TableExtractor,
    TableStrategy,
};

/// A scored table with what it took to produce it.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub table: ExtractedTable,
    pub roi: Roi,
    pub report: QualityReport,
    pub ambiguous: Vec<CanonicalField>,
}

/// Document bytes after preflight, written to disk and indexed.
struct Staged {
    document: PdfDocument,
    file: NamedTempFile,
    pages: Vec<Page>,
    ocr_applied: bool,
    issues: Vec<Issue>,
}

/// Output of the redaction-only path.
#[derive(Debug, Clone, Default)]
pub struct RedactionOutput {
    pub document: Vec<u8>,
    /// Located entities over all pages.
    pub spans: usize,
    pub notes: Vec<String>,
}

/// Runs the pipeline with configurable collaborators.
///
/// The recognizer is built once by the caller and borrowed for the
/// analyzer's lifetime.
pub struct Analyzer<'r> {
    config: InforceConfig,
    page_source: Box<dyn PageSource>,
    extractor: TableExtractor,
    mapper: ColumnMapper,
    blender: ConfidenceBlender,
    preflight: Preflight,
    snips: SnipExtractor,
    locator: PiiLocator<'r>,
    redactor: Redactor,
}

impl<'r> Analyzer<'r> {
    /// Analyzer using poppler, camelot and ocrmypdf as configured.
    pub fn new(config: InforceConfig, recognizer: &'r dyn EntityRecognizer) -> Self {
        let tools = &config.tools;
        let page_source = Box::new(PdftotextSource::new(&tools.pdftotext, tools.tool_timeout()));
        let strategies = CamelotStrategy::defaults(&tools.camelot, tools.tool_timeout());
        let rasterizer = Box::new(PdftoppmRasterizer::new(&tools.pdftoppm, tools.tool_timeout()));
        let ocr = Box::new(OcrMyPdf::new(&tools.ocrmypdf, tools.ocr_timeout()));

        Self {
            page_source,
            extractor: TableExtractor::new(strategies),
            mapper: ColumnMapper::new(config.analysis.min_similarity),
            blender: ConfidenceBlender::new(config.analysis.confidence_threshold),
            preflight: Preflight::new(ocr, tools.ocr_retries),
            snips: SnipExtractor::new(rasterizer, config.snips.clone()),
            locator: PiiLocator::new(recognizer),
            redactor: Redactor::new(config.redaction.fill_rgb),
            config,
        }
    }

    pub fn with_page_source(mut self, source: Box<dyn PageSource>) -> Self {
        self.page_source = source;
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<Box<dyn TableStrategy>>) -> Self {
        self.extractor = TableExtractor::new(strategies);
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: Box<dyn PageRasterizer>) -> Self {
        self.snips = SnipExtractor::new(rasterizer, self.config.snips.clone());
        self
    }

    pub fn with_ocr(mut self, tool: Box<dyn OcrTool>) -> Self {
        self.preflight = Preflight::new(tool, self.config.tools.ocr_retries);
        self
    }

    pub fn config(&self) -> &InforceConfig {
        &self.config
    }

    /// Analyze one PDF.
    #[instrument(skip_all, fields(bytes = bytes.len()))]
    pub fn analyze(&self, bytes: &[u8]) -> Result<AnalysisResult> {
        let start = Instant::now();
        let staged = self.stage(bytes)?;
        let mut issues = staged.issues;
        let mut attempts = Vec::new();

        let mut candidates = Vec::new();
        for page in &staged.pages {
            candidates.extend(self.page_candidates(&staged.document, page, &mut attempts, &mut issues));
        }

        // Ranked by the same 20/25/35/20 blend that gates the result, not a
        // separate weighting. Stable: equal scores keep page and strategy order.
        candidates.sort_by(|a, b| b.table.score.total_cmp(&a.table.score));
        info!("{} candidate tables", candidates.len());

        let mut result = AnalysisResult {
            ocr_applied: staged.ocr_applied,
            ..Default::default()
        };
        let mut notes = Vec::new();

        let best = candidates.into_iter().next();
        let confidence = match &best {
            Some(best) => {
                let table = &best.table;
                let columns: Vec<MappedColumn> = table
                    .columns
                    .iter()
                    .map(|(field, m)| MappedColumn {
                        field,
                        column: m.column,
                        score: m.score,
                    })
                    .collect();
                notes.push(format!(
                    "Columns found: {}",
                    columns.iter().map(|c| c.field.name()).collect::<Vec<_>>().join(", ")
                ));

                issues.extend(best.ambiguous.iter().copied().map(Issue::ColumnAmbiguous));
                let recon = best.report.reconciliation;
                if recon.failed() > 0 {
                    issues.push(Issue::ReconciliationMismatch {
                        failed: recon.failed(),
                        evaluated: recon.evaluated,
                    });
                }
                if !table.columns.contains(CanonicalField::Year) {
                    issues.push(Issue::YearColumnMissing);
                }

                result.series = build_series(table);
                result.verifications = Verifications {
                    net_sv_identity_rmse: recon.rmse,
                    year_sequence_ok: best.report.year_sequence_ok,
                    rows_parsed_pct: table.metrics.rows_parsed_pct,
                };
                result.table = Some(TableSummary {
                    page: table.page,
                    strategy: table.strategy,
                    rows: table.data_rows().len(),
                    columns,
                    metrics: table.metrics,
                });

                if let Some(page) = staged.pages.iter().find(|p| p.index == table.page) {
                    let snips = self.snips.extract(staged.file.path(), page, &best.roi.rect, table);
                    result.proof_snips = snips.snips;
                    issues.extend(snips.issues);
                }

                self.blender.evaluate(&table.metrics)
            }
            None => {
                issues.insert(0, Issue::NoTableDetected);
                ConfidenceResult::none()
            }
        };

        let text = document_text(&staged.pages);
        let fields = extract_fields(&text, best.as_ref().map(|c| &c.table));
        result.fields = fields.fields;
        issues.extend(fields.issues);

        let location = self.locator.locate(&staged.pages);
        issues.extend(location.issues);
        let redaction = self
            .redactor
            .redact(staged.document.raw_data(), &location.pages)?;
        result.redacted_document = redaction.document;
        issues.extend(redaction.issues);

        result.decision_ready = confidence.decision_ready;
        result.needs_manual_review = confidence.needs_manual_review;
        result.confidence_overall = confidence.confidence;
        result.attempts = attempts;
        notes.extend(issues.iter().map(ToString::to_string));
        result.notes = notes;

        info!(
            "Analysis done in {:?}: confidence {:.3}, {} notes",
            start.elapsed(),
            result.confidence_overall,
            result.notes.len()
        );
        Ok(result)
    }

    /// Redact identifying text only, skipping table analysis.
    #[instrument(skip_all, fields(bytes = bytes.len()))]
    pub fn redact(&self, bytes: &[u8]) -> Result<RedactionOutput> {
        let staged = self.stage(bytes)?;
        let location = self.locator.locate(&staged.pages);
        let redaction = self
            .redactor
            .redact(staged.document.raw_data(), &location.pages)?;

        let notes = staged
            .issues
            .iter()
            .chain(location.issues.iter())
            .chain(redaction.issues.iter())
            .map(ToString::to_string)
            .collect();
        Ok(RedactionOutput {
            document: redaction.document,
            spans: location.spans.len(),
            notes,
        })
    }

    /// Load, preflight, persist and index the document.
    fn stage(&self, bytes: &[u8]) -> Result<Staged> {
        let document = PdfDocument::load(bytes)?;
        let preflighted = self.preflight.run(document)?;

        let mut file = tempfile::Builder::new()
            .prefix("inforce-")
            .suffix(".pdf")
            .tempfile()?;
        file.write_all(preflighted.document.raw_data())?;
        file.flush()?;

        let pages = self.page_source.pages(file.path())?;
        debug!(
            "{} pages from {}",
            pages.len(),
            self.page_source.backend_name()
        );

        Ok(Staged {
            document: preflighted.document,
            file,
            pages,
            ocr_applied: preflighted.ocr_applied,
            issues: preflighted.issue.into_iter().collect(),
        })
    }

    /// Extract and score every grid found under the page's ROI.
    fn page_candidates(
        &self,
        document: &PdfDocument,
        page: &Page,
        attempts: &mut Vec<StrategyAttempt>,
        issues: &mut Vec<Issue>,
    ) -> Vec<Candidate> {
        let Some(roi) = detect_roi(page, self.config.analysis.roi_margin) else {
            debug!("Page {}: no header keyword, skipped", page.index);
            return Vec::new();
        };

        let extraction = match self.extractor.extract(document, page.index, &roi.rect) {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!("Page {}: extraction setup failed: {}", page.index, e);
                issues.push(Issue::PageUnreadable {
                    page: page.index,
                    reason: e.to_string(),
                });
                return Vec::new();
            }
        };

        for attempt in &extraction.attempts {
            if let AttemptStatus::BackendError(reason) = &attempt.status {
                issues.push(Issue::ExtractionStrategyFailed {
                    page: attempt.page,
                    strategy: attempt.strategy,
                    reason: reason.clone(),
                });
            }
        }
        attempts.extend(extraction.attempts);

        extraction
            .tables
            .into_iter()
            .map(|raw| self.score(raw, roi.clone()))
            .collect()
    }

    /// Map, assess and blend one raw grid.
    pub fn score(&self, raw: RawTable, roi: Roi) -> Candidate {
        let header = raw.grid.first().cloned().unwrap_or_default();
        let mapping = self.mapper.map_header(&header);
        let rows = raw.grid.get(1..).unwrap_or(&[]);
        let report = assess(rows, &mapping.columns, self.config.analysis.recon_tolerance);
        let score = self.blender.score(&report.metrics);
        debug!(
            "Page {} {} grid: {} fields, score {:.3}",
            raw.page,
            raw.strategy,
            mapping.columns.len(),
            score
        );

        Candidate {
            table: ExtractedTable {
                page: raw.page,
                strategy: raw.strategy,
                grid: raw.grid,
                columns: mapping.columns,
                metrics: report.metrics,
                score,
            },
            roi,
            report,
            ambiguous: mapping.ambiguous,
        }
    }
}

/// By-year series from the parsed rows of `table`; rows failing
/// reconciliation are kept.
pub fn build_series(table: &ExtractedTable) -> Series {
    let Some(year_col) = table.columns.get(CanonicalField::Year) else {
        return Series::default();
    };

    let column = |field: CanonicalField| -> Vec<YearValue> {
        let Some(col) = table.columns.get(field) else {
            return Vec::new();
        };
        table
            .data_rows()
            .iter()
            .filter_map(|row| {
                let year = clean_year(row.get(year_col)?)?;
                let value = clean_number(row.get(col)?)?;
                Some(YearValue { year, value })
            })
            .collect()
    };

    Series {
        planned_premiums_by_year: column(CanonicalField::Premium),
        cash_value_by_year: column(CanonicalField::CashValue),
        surrender_charge_by_year: column(CanonicalField::SurrenderCharge),
        net_surrender_value_by_year: column(CanonicalField::NetSurrenderValue),
    }
}

fn document_text(pages: &[Page]) -> String {
    pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::pii::PatternRecognizer;
    use crate::table::StrategyKind;
    use pretty_assertions::assert_eq;

    fn raw(grid: &[&[&str]]) -> RawTable {
        RawTable {
            page: 0,
            strategy: StrategyKind::Lattice,
            grid: grid
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    fn roi() -> Roi {
        Roi {
            page: 0,
            rect: Rect::new(0.0, 0.0, 612.0, 792.0),
        }
    }

    #[test]
    fn test_score_reference_table() {
        let recognizer = PatternRecognizer::new();
        let analyzer = Analyzer::new(InforceConfig::default(), &recognizer);
        let candidate = analyzer.score(
            raw(&[
                &["Policy Year", "Account Value", "Surrender Charge", "Net Cash Surrender Value"],
                &["2025", "100", "10", "90"],
                &["2026", "120", "5", "115"],
                &["2027", "140", "0", "140"],
            ]),
            roi(),
        );

        let metrics = candidate.table.metrics;
        assert_eq!(metrics.recon_success, 1.0);
        assert_eq!(metrics.shape_fit, 1.0);
        assert_eq!(metrics.rows_parsed_pct, 1.0);
        assert_eq!(metrics.header_strength, 0.4);
        // 0.2*0.4 + 0.25 + 0.35 + 0.2
        assert!((candidate.table.score - 0.88).abs() < 1e-9);
        // "policy loan" is close to "policy year" but loses the column
        assert!(candidate.ambiguous.contains(&CanonicalField::LoanBalance));
    }

    #[test]
    fn test_ranking_score_matches_gating_confidence() {
        let recognizer = PatternRecognizer::new();
        let analyzer = Analyzer::new(InforceConfig::default(), &recognizer);
        // strong header, no row reconciles
        let candidate = analyzer.score(
            raw(&[
                &["Policy Year", "Cash Value", "Surrender Charge", "Net Surrender Value"],
                &["2025", "100", "10", "50"],
                &["2026", "120", "5", "60"],
            ]),
            roi(),
        );

        let gating = analyzer.blender.evaluate(&candidate.table.metrics);
        assert_eq!(candidate.table.score, gating.confidence);
        assert_eq!(candidate.table.metrics.recon_success, 0.0);
    }

    #[test]
    fn test_series_keep_failing_rows_and_skip_blank_cells() {
        let recognizer = PatternRecognizer::new();
        let analyzer = Analyzer::new(InforceConfig::default(), &recognizer);
        let candidate = analyzer.score(
            raw(&[
                &["Year", "Premium", "Cash Value", "Surrender Charge", "Net Surrender Value"],
                &["2025-26", "1,000", "100", "10", "50"],
                &["2026-27", "", "120", "5", "115"],
            ]),
            roi(),
        );
        let series = build_series(&candidate.table);

        assert_eq!(series.planned_premiums_by_year, vec![YearValue { year: 2025, value: 1000.0 }]);
        assert_eq!(series.net_surrender_value_by_year.len(), 2);
        assert_eq!(series.net_surrender_value_by_year[0].value, 50.0);
        assert_eq!(candidate.report.reconciliation.failed(), 1);
    }

    #[test]
    fn test_series_need_a_year_column() {
        let recognizer = PatternRecognizer::new();
        let analyzer = Analyzer::new(InforceConfig::default(), &recognizer);
        let candidate = analyzer.score(raw(&[&["Cash Value"], &["100"]]), roi());
        assert!(build_series(&candidate.table).is_empty());
    }
}
