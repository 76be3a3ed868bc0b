//! Integration tests for Analyzer end to end.
//!
//! Page text, table strategies and the rasterizer are mocked, so these tests
//! run without poppler, camelot or ocrmypdf. The PDF itself is built with
//! lopdf so redaction runs against real content streams.

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use image::{DynamicImage, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use inforce_core::error::{InforceError, PdfError, PiiError, ToolError};
use inforce_core::pdf::{Page, PageSource, TextBlock, TextLine, Word};
use inforce_core::pii::{EntityRecognizer, EntitySpan, PatternRecognizer, page_strings};
use inforce_core::preflight::OcrTool;
use inforce_core::snips::PageRasterizer;
use inforce_core::table::{AttemptStatus, Grid, StrategyKind, StrategyOutcome, TableStrategy};
use inforce_core::{Analyzer, InforceConfig, YearValue};

const NAME: &str = "SANDRA SUMIKO ARIYAMA";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct MockPages {
    pages: Vec<Page>,
}

impl PageSource for MockPages {
    fn pages(&self, _pdf: &Path) -> inforce_core::Result<Vec<Page>> {
        Ok(self.pages.clone())
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

struct MockStrategy {
    kind: StrategyKind,
    outcome: StrategyOutcome,
    calls: Rc<Cell<usize>>,
}

impl TableStrategy for MockStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn extract(&self, pdf: &Path) -> StrategyOutcome {
        assert!(pdf.exists(), "cropped page must exist while strategies run");
        self.calls.set(self.calls.get() + 1);
        self.outcome.clone()
    }
}

struct BlankRaster;

impl PageRasterizer for BlankRaster {
    fn rasterize(&self, _pdf: &Path, _page: usize, dpi: u32) -> inforce_core::Result<DynamicImage> {
        let scale = dpi as f32 / 72.0;
        Ok(DynamicImage::ImageRgb8(RgbImage::new(
            (612.0 * scale) as u32,
            (792.0 * scale) as u32,
        )))
    }
}

struct NoOcr;

impl OcrTool for NoOcr {
    fn add_text_layer(&self, _input: &Path, _output: &Path) -> Result<(), ToolError> {
        Err(ToolError::NotFound {
            program: "ocrmypdf".to_string(),
        })
    }
}

struct BrokenRecognizer;

impl EntityRecognizer for BrokenRecognizer {
    fn recognize(&self, _text: &str) -> Result<Vec<EntitySpan>, PiiError> {
        Err(PiiError::Unavailable("engine not started".to_string()))
    }
}

/// (top y in page points, words) for each line of the illustration page.
fn illustration_lines() -> Vec<(f32, Vec<&'static str>)> {
    vec![
        (84.0, vec!["SANDRA", "SUMIKO", "ARIYAMA"]),
        (
            108.0,
            vec!["Using", "4.74%", "illustrated", "crediting", "rate", "and", "current", "charges"],
        ),
        (
            132.0,
            vec![
                "Policy", "Year", "Account", "Value", "Surrender", "Charge", "Net", "Cash",
                "Surrender", "Value",
            ],
        ),
        (144.0, vec!["2025", "100", "10", "90"]),
        (156.0, vec!["2026", "120", "5", "115"]),
        (168.0, vec!["2027", "140", "0", "140"]),
    ]
}

/// One block per line, 10pt per character, 10pt word gaps.
fn page(index: usize, lines: &[(f32, Vec<&str>)]) -> Page {
    let blocks = lines
        .iter()
        .map(|(top, words)| {
            let mut x = 36.0;
            let words = words
                .iter()
                .map(|w| {
                    let width = w.chars().count() as f32 * 10.0;
                    let word = Word {
                        rect: inforce_core::Rect::new(x, *top, x + width, top + 10.0),
                        text: w.to_string(),
                    };
                    x += width + 10.0;
                    word
                })
                .collect();
            TextBlock::from_lines(vec![TextLine::from_words(words)])
        })
        .collect();
    Page::new(index, 612.0, 792.0, blocks)
}

/// Single-page PDF drawing each line with Helvetica at the same geometry
/// as [`page`]: baseline 8pt below the line top.
fn pdf(lines: &[(f32, Vec<&str>)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut operations = Vec::new();
    for (top, words) in lines {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 10.into()]));
        operations.push(Operation::new("Td", vec![36.into(), (792.0 - top - 8.0).into()]));
        operations.push(Operation::new("Tj", vec![Object::string_literal(words.join(" "))]));
        operations.push(Operation::new("ET", vec![]));
    }
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn ledger_grid() -> Grid {
    [
        ["Policy Year", "Account Value", "Surrender Charge", "Net Cash Surrender Value"],
        ["2025", "100", "10", "90"],
        ["2026", "120", "5", "115"],
        ["2027", "140", "0", "140"],
    ]
    .iter()
    .map(|r| r.iter().map(|c| c.to_string()).collect())
    .collect()
}

fn config() -> InforceConfig {
    let mut config = InforceConfig::default();
    config.snips.as_of_year = Some(2026);
    config.snips.dpi = 72;
    config
}

/// Lattice finds nothing, stream finds the ledger.
fn strategies(calls: &Rc<Cell<usize>>) -> Vec<Box<dyn TableStrategy>> {
    vec![
        Box::new(MockStrategy {
            kind: StrategyKind::Lattice,
            outcome: StrategyOutcome::NoGrid,
            calls: Rc::clone(calls),
        }),
        Box::new(MockStrategy {
            kind: StrategyKind::Stream,
            outcome: StrategyOutcome::Grids(vec![ledger_grid()]),
            calls: Rc::clone(calls),
        }),
    ]
}

fn analyzer<'r>(
    recognizer: &'r dyn EntityRecognizer,
    pages: Vec<Page>,
    calls: &Rc<Cell<usize>>,
) -> Analyzer<'r> {
    Analyzer::new(config(), recognizer)
        .with_page_source(Box::new(MockPages { pages }))
        .with_strategies(strategies(calls))
        .with_rasterizer(Box::new(BlankRaster))
        .with_ocr(Box::new(NoOcr))
}

/// Shown strings of the first page, space separated.
fn page_text(bytes: &[u8]) -> String {
    let doc = Document::load_mem(bytes).unwrap();
    page_strings(&doc, 0).unwrap().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn reference_ledger_is_decision_ready() {
    let lines = illustration_lines();
    let recognizer = PatternRecognizer::new();
    let calls = Rc::new(Cell::new(0));
    let result = analyzer(&recognizer, vec![page(0, &lines)], &calls)
        .analyze(&pdf(&lines))
        .unwrap();

    assert!((result.confidence_overall - 0.88).abs() < 1e-9);
    assert!(result.decision_ready);
    assert!(!result.needs_manual_review);
    assert!(!result.ocr_applied);

    assert_eq!(
        result.series.cash_value_by_year,
        vec![
            YearValue { year: 2025, value: 100.0 },
            YearValue { year: 2026, value: 120.0 },
            YearValue { year: 2027, value: 140.0 },
        ]
    );
    assert_eq!(result.series.surrender_charge_by_year.last().unwrap().value, 0.0);
    assert!(result.series.planned_premiums_by_year.is_empty());

    assert!(result.verifications.year_sequence_ok);
    assert_eq!(result.verifications.rows_parsed_pct, 1.0);
    assert_eq!(result.verifications.net_sv_identity_rmse, Some(0.0));

    let table = result.table.as_ref().unwrap();
    assert_eq!(table.strategy, StrategyKind::Stream);
    assert_eq!(table.metrics.recon_success, 1.0);
    assert_eq!(table.metrics.shape_fit, 1.0);

    assert_eq!(result.fields.crediting_rate.as_ref().unwrap().value, 4.74);
    assert!(result.notes[0].starts_with("Columns found: year"));
    assert!(result.notes.iter().any(|n| n == "field current_age not found"));
}

#[test]
fn strategies_fall_through_in_priority_order() {
    let lines = illustration_lines();
    let recognizer = PatternRecognizer::new();
    let calls = Rc::new(Cell::new(0));
    let result = analyzer(&recognizer, vec![page(0, &lines)], &calls)
        .analyze(&pdf(&lines))
        .unwrap();

    assert_eq!(calls.get(), 2);
    let kinds: Vec<StrategyKind> = result.attempts.iter().map(|a| a.strategy).collect();
    assert_eq!(kinds, vec![StrategyKind::Lattice, StrategyKind::Stream]);
    assert_eq!(result.attempts[0].status, AttemptStatus::NoGrid);
    assert_eq!(result.attempts[1].status, AttemptStatus::Grids(1));
}

#[test]
fn name_is_not_extractable_after_redaction() {
    let lines = illustration_lines();
    let bytes = pdf(&lines);
    assert!(page_text(&bytes).contains("SANDRA"));

    let recognizer = PatternRecognizer::new();
    let calls = Rc::new(Cell::new(0));
    let result = analyzer(&recognizer, vec![page(0, &lines)], &calls)
        .analyze(&bytes)
        .unwrap();

    let redacted = page_text(&result.redacted_document);
    assert!(!redacted.contains("SANDRA"));
    assert!(!redacted.contains(NAME));
    assert!(redacted.contains("Policy Year"));
    // input bytes are untouched
    assert!(page_text(&bytes).contains(NAME));
}

#[test]
fn proof_snips_follow_ledger_rows() {
    let lines = illustration_lines();
    let recognizer = PatternRecognizer::new();
    let calls = Rc::new(Cell::new(0));
    let result = analyzer(&recognizer, vec![page(0, &lines)], &calls)
        .analyze(&pdf(&lines))
        .unwrap();

    let labels: Vec<&str> = result.proof_snips.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec!["first_year_row", "current_year_row"]);

    let current = &result.proof_snips[1];
    assert_eq!(current.page, 0);
    assert_eq!(current.rect.y0, 154.0);
    let png = image::load_from_memory(&current.image).unwrap();
    assert_eq!(png.width(), current.rect.width().ceil() as u32);
}

#[test]
fn page_without_header_yields_no_table() {
    let lines = vec![(100.0, vec!["Thank", "you", "for", "choosing", "us"])];
    let recognizer = PatternRecognizer::new();
    let calls = Rc::new(Cell::new(0));
    let result = analyzer(&recognizer, vec![page(0, &lines)], &calls)
        .analyze(&pdf(&lines))
        .unwrap();

    assert_eq!(calls.get(), 0);
    assert!(result.attempts.is_empty());
    assert!(result.table.is_none());
    assert_eq!(result.confidence_overall, 0.0);
    assert!(result.needs_manual_review);
    assert!(!result.decision_ready);
    assert!(result.series.is_empty());
    assert_eq!(result.notes[0], "No tables detected.");
    // redaction still runs
    assert!(!result.redacted_document.is_empty());
}

#[test]
fn backend_errors_become_notes() {
    let lines = illustration_lines();
    let recognizer = PatternRecognizer::new();
    let calls = Rc::new(Cell::new(0));
    let failing: Vec<Box<dyn TableStrategy>> = vec![
        Box::new(MockStrategy {
            kind: StrategyKind::Lattice,
            outcome: StrategyOutcome::BackendError("ghostscript missing".to_string()),
            calls: Rc::clone(&calls),
        }),
        Box::new(MockStrategy {
            kind: StrategyKind::Stream,
            outcome: StrategyOutcome::Grids(vec![ledger_grid()]),
            calls: Rc::clone(&calls),
        }),
    ];
    let result = analyzer(&recognizer, vec![page(0, &lines)], &calls)
        .with_strategies(failing)
        .analyze(&pdf(&lines))
        .unwrap();

    assert!(result.table.is_some());
    assert!(result
        .notes
        .iter()
        .any(|n| n == "lattice extraction failed on page 0: ghostscript missing"));
}

#[test]
fn analysis_is_deterministic() {
    let lines = illustration_lines();
    let bytes = pdf(&lines);
    let recognizer = PatternRecognizer::new();
    let calls = Rc::new(Cell::new(0));
    let analyzer = analyzer(&recognizer, vec![page(0, &lines)], &calls);

    let first = analyzer.analyze(&bytes).unwrap();
    let second = analyzer.analyze(&bytes).unwrap();

    assert_eq!(first.confidence_overall.to_bits(), second.confidence_overall.to_bits());
    assert_eq!(first.series, second.series);
    assert_eq!(first.verifications, second.verifications);
    assert_eq!(first.notes, second.notes);
}

#[test]
fn recognizer_failure_redacts_whole_page() {
    let lines = illustration_lines();
    let calls = Rc::new(Cell::new(0));
    let output = analyzer(&BrokenRecognizer, vec![page(0, &lines)], &calls)
        .redact(&pdf(&lines))
        .unwrap();

    assert!(page_text(&output.document).trim().is_empty());
    assert_eq!(output.notes.len(), 1);
    assert!(output.notes[0].starts_with("PII detection unavailable on page 0"));
}

#[test]
fn malformed_input_is_fatal() {
    let recognizer = PatternRecognizer::new();
    let calls = Rc::new(Cell::new(0));
    let err = analyzer(&recognizer, Vec::new(), &calls)
        .analyze(b"not a pdf")
        .unwrap_err();
    assert!(matches!(err, InforceError::Pdf(PdfError::Malformed(_))));
}
