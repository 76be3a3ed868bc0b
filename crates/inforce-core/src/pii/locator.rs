//! Maps recognized entities back to page rectangles.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::recognizer::{EntityCategory, EntityRecognizer};
use crate::error::Issue;
use crate::geometry::Rect;
use crate::pdf::Page;

/// A located piece of identifying text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiSpan {
    pub page: usize,
    pub rect: Rect,
    pub category: EntityCategory,
}

/// Everything to redact on one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRedaction {
    pub page: usize,
    pub rects: Vec<Rect>,
    /// Text of every detected entity, one entry per line it spans.
    pub needles: Vec<String>,
    /// Recognition failed and the whole page is covered.
    pub full_page: bool,
}

/// Locator output for a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PiiLocation {
    pub spans: Vec<PiiSpan>,
    /// One entry per page, including pages without detections.
    pub pages: Vec<PageRedaction>,
    pub issues: Vec<Issue>,
}

/// Runs a recognizer over every page and resolves hits to rectangles.
pub struct PiiLocator<'r> {
    recognizer: &'r dyn EntityRecognizer,
}

impl<'r> PiiLocator<'r> {
    pub fn new(recognizer: &'r dyn EntityRecognizer) -> Self {
        Self { recognizer }
    }

    pub fn locate(&self, pages: &[Page]) -> PiiLocation {
        let mut location = PiiLocation::default();
        for page in pages {
            let mut redaction = PageRedaction {
                page: page.index,
                ..Default::default()
            };

            let entities = match self.recognizer.recognize(&page.text) {
                Ok(entities) => entities,
                Err(e) => {
                    warn!("Recognition failed on page {}: {}", page.index, e);
                    redaction.rects.push(page.rect());
                    redaction.full_page = true;
                    location.issues.push(Issue::PiiDetectionUnavailable {
                        page: page.index,
                        reason: e.to_string(),
                    });
                    location.pages.push(redaction);
                    continue;
                }
            };

            for entity in entities {
                let Some(text) = entity.slice(&page.text) else {
                    debug!("Span {}..{} outside page text", entity.start, entity.end);
                    continue;
                };
                for piece in text.split('\n').map(str::trim).filter(|p| !p.is_empty()) {
                    if !redaction.needles.iter().any(|n| n == piece) {
                        redaction.needles.push(piece.to_string());
                    }
                    for rect in page.search_for(piece) {
                        location.spans.push(PiiSpan {
                            page: page.index,
                            rect,
                            category: entity.category,
                        });
                        if !redaction.rects.contains(&rect) {
                            redaction.rects.push(rect);
                        }
                    }
                }
            }

            debug!(
                "Page {}: {} redaction rectangles",
                page.index,
                redaction.rects.len()
            );
            location.pages.push(redaction);
        }
        location
    }
}
