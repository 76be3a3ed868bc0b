//! Core library for in-force life insurance illustration analysis.
//!
//! This crate provides:
//! - A per-page text index with word geometry (poppler `pdftotext`)
//! - Ledger table localization and extraction (lattice, then stream)
//! - Fuzzy mapping of vendor headers onto a canonical column taxonomy
//! - Quality scoring and a blended confidence gating automated decisions
//! - Narrative field extraction (crediting rate, loans, ages)
//! - PII location and redaction, and raster proof snips of ledger rows

pub mod analyzer;
pub mod confidence;
pub mod error;
pub mod external;
pub mod fields;
pub mod geometry;
pub mod mapping;
pub mod models;
pub mod pdf;
pub mod pii;
pub mod preflight;
pub mod quality;
pub mod roi;
pub mod snips;
pub mod table;

pub use analyzer::{Analyzer, Candidate, RedactionOutput};
pub use confidence::{BlendWeights, ConfidenceBlender, ConfidenceResult};
pub use error::{InforceError, Issue, Result};
pub use geometry::Rect;
pub use mapping::{CanonicalField, ColumnMap, ColumnMapper, clean_number};
pub use models::config::InforceConfig;
pub use models::result::{AnalysisResult, Fields, Series, ValueWithMeta, Verifications, YearValue};
pub use pdf::{Page, PageSource, PdfDocument};
pub use pii::{EntityCategory, EntityRecognizer, PatternRecognizer, PiiLocator, Redactor};
pub use quality::QualityMetrics;
pub use snips::{PageRasterizer, ProofSnip};
pub use table::{ExtractedTable, StrategyKind, StrategyOutcome, TableStrategy};
