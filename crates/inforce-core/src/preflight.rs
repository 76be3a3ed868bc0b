//! OCR preflight: give scanned documents a text layer before analysis.

use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::error::{Issue, Result, ToolError};
use crate::external::run_tool;
use crate::pdf::PdfDocument;

/// External program that writes a text-layered copy of `input` to `output`.
pub trait OcrTool {
    fn add_text_layer(&self, input: &Path, output: &Path) -> std::result::Result<(), ToolError>;
}

/// `ocrmypdf` with deskew, rotation and cleanup enabled.
pub struct OcrMyPdf {
    program: String,
    timeout: Duration,
}

impl OcrMyPdf {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl OcrTool for OcrMyPdf {
    fn add_text_layer(&self, input: &Path, output: &Path) -> std::result::Result<(), ToolError> {
        let args = [
            OsStr::new("--force-ocr"),
            OsStr::new("--deskew"),
            OsStr::new("--rotate-pages"),
            OsStr::new("--clean"),
            OsStr::new("--optimize"),
            OsStr::new("3"),
            input.as_os_str(),
            output.as_os_str(),
        ];
        run_tool(&self.program, args, self.timeout).map(|_| ())
    }
}

/// Bytes to analyze after preflight.
#[derive(Debug)]
pub struct Preflighted {
    pub document: PdfDocument,
    pub ocr_applied: bool,
    pub issue: Option<Issue>,
}

pub struct Preflight {
    tool: Box<dyn OcrTool>,
    retries: u32,
}

impl Preflight {
    pub fn new(tool: Box<dyn OcrTool>, retries: u32) -> Self {
        Self { tool, retries }
    }

    /// Run OCR when the document has no text layer.
    ///
    /// Retryable failures are retried; a final failure keeps the original
    /// document and reports an [`Issue::OcrUnavailable`].
    #[instrument(skip_all)]
    pub fn run(&self, document: PdfDocument) -> Result<Preflighted> {
        if document.has_text_layer() {
            debug!("Text layer present, skipping OCR");
            return Ok(Preflighted {
                document,
                ocr_applied: false,
                issue: None,
            });
        }

        info!("No text layer found, running OCR");
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("input.pdf");
        let output = dir.path().join("ocr.pdf");
        std::fs::File::create(&input)?.write_all(document.raw_data())?;

        let mut attempt = 0;
        let failure = loop {
            match self.tool.add_text_layer(&input, &output) {
                Ok(()) => {
                    let bytes = std::fs::read(&output)?;
                    return match PdfDocument::load(&bytes) {
                        Ok(ocr) => Ok(Preflighted {
                            document: ocr,
                            ocr_applied: true,
                            issue: None,
                        }),
                        Err(e) => Ok(Preflighted {
                            document,
                            ocr_applied: false,
                            issue: Some(Issue::OcrUnavailable(format!("unreadable OCR output: {}", e))),
                        }),
                    };
                }
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    warn!("OCR attempt {} failed ({}), retrying", attempt, e);
                }
                Err(e) => break e,
            }
        };

        warn!("OCR unavailable: {}", failure);
        Ok(Preflighted {
            document,
            ocr_applied: false,
            issue: Some(Issue::OcrUnavailable(failure.to_string())),
        })
    }
}
