//! Error types for the inforce-core library.

use std::time::Duration;

use thiserror::Error;

use crate::mapping::CanonicalField;
use crate::table::StrategyKind;

/// Main error type for the inforce library.
#[derive(Error, Debug)]
pub enum InforceError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// External tool invocation error.
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// PII recognition error.
    #[error("PII error: {0}")]
    Pii(#[from] PiiError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// CSV decoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// The input is unreadable or corrupt.
    #[error("malformed PDF: {0}")]
    Malformed(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page index requested.
    #[error("invalid page index: {0}")]
    InvalidPage(usize),

    /// The text layer could not be parsed.
    #[error("failed to parse text layer: {0}")]
    TextLayer(String),

    /// Writing a modified document failed.
    #[error("failed to write PDF: {0}")]
    Write(String),
}

impl From<lopdf::Error> for PdfError {
    fn from(e: lopdf::Error) -> Self {
        PdfError::Malformed(e.to_string())
    }
}

/// Errors from external command-line collaborators.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The program is not installed or not on `PATH`.
    #[error("{program} not found")]
    NotFound { program: String },

    /// The program exceeded its time budget and was killed.
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    /// The program exited unsuccessfully.
    #[error("{program} exited with code {code}: {stderr}")]
    Failed {
        program: String,
        code: i32,
        stderr: String,
    },

    /// Spawning or supervising the program failed.
    #[error("{program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    /// Whether running the same invocation again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToolError::Timeout { .. })
    }
}

/// Errors from the entity recognition engine.
#[derive(Error, Debug)]
pub enum PiiError {
    /// The engine could not analyze the text.
    #[error("entity recognition unavailable: {0}")]
    Unavailable(String),
}

/// Non-fatal conditions accumulated into the analysis notes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Issue {
    /// No ROI or no grid on any page.
    #[error("No tables detected.")]
    NoTableDetected,

    /// A single strategy failed on a page; the next one was tried.
    #[error("{strategy} extraction failed on page {page}: {reason}")]
    ExtractionStrategyFailed {
        page: usize,
        strategy: StrategyKind,
        reason: String,
    },

    /// A page with a header could not be cropped or read.
    #[error("page {page} skipped: {reason}")]
    PageUnreadable { page: usize, reason: String },

    /// A canonical field matched a column already claimed by a stronger field.
    #[error("column for {0} is ambiguous")]
    ColumnAmbiguous(CanonicalField),

    /// Rows whose net surrender value disagrees with the identity.
    #[error("{failed} of {evaluated} rows fail the net surrender value identity")]
    ReconciliationMismatch { failed: usize, evaluated: usize },

    /// The selected table has no year column, so no series were built.
    #[error("no year column; series left empty")]
    YearColumnMissing,

    /// Entity recognition failed; the page was redacted in full.
    #[error("PII detection unavailable on page {page}, page fully redacted: {reason}")]
    PiiDetectionUnavailable { page: usize, reason: String },

    /// Content the redactor could not parse was dropped instead of scrubbed.
    #[error("page {page} content unreadable, all text removed: {reason}")]
    RedactionFallback { page: usize, reason: String },

    /// A proof snip could not be produced.
    #[error("snip {label} unavailable: {reason}")]
    SnipUnavailable { label: String, reason: String },

    /// A narrative field was not found in the document text.
    #[error("field {0} not found")]
    FieldNotFound(&'static str),

    /// OCR preflight failed; the original bytes were analyzed.
    #[error("OCR preflight failed: {0}")]
    OcrUnavailable(String),
}

/// Result type for the inforce library.
pub type Result<T> = std::result::Result<T, InforceError>;
