//! Region-of-interest detection: where on a page the ledger table starts.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::Rect;
use crate::mapping::normalize;
use crate::pdf::Page;

/// Ledger header words; a block containing any of them marks a header.
pub const HEADER_KEYWORDS: [&str; 16] = [
    "policy year",
    "year",
    "yr",
    "age",
    "premium",
    "planned premium",
    "annual outlay",
    "cash value",
    "account value",
    "accumulation value",
    "surrender charge",
    "net surrender value",
    "net cash surrender value",
    "indebtedness",
    "policy loan",
    "loan",
];

/// A block whose text contains a header keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCandidate {
    pub page: usize,
    pub y: f32,
    pub keyword: &'static str,
}

/// The page region believed to hold the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub page: usize,
    pub rect: Rect,
}

/// Header keyword hits on `page`, one per matching block, in block order.
pub fn header_candidates(page: &Page) -> Vec<HeaderCandidate> {
    page.blocks
        .iter()
        .filter_map(|block| {
            let text = normalize(&block.text);
            HEADER_KEYWORDS
                .iter()
                .find(|kw| text.contains(**kw))
                .map(|kw| HeaderCandidate {
                    page: page.index,
                    y: block.rect.y0,
                    keyword: *kw,
                })
        })
        .collect()
}

/// Full-width region from the topmost header hit (less `margin`) to the
/// page bottom; `None` when the page has no hit.
pub fn detect_roi(page: &Page, margin: f32) -> Option<Roi> {
    let top = header_candidates(page)
        .into_iter()
        .min_by(|a, b| a.y.total_cmp(&b.y))?;

    debug!(
        "Page {} header '{}' at y={:.1}",
        page.index, top.keyword, top.y
    );
    Some(Roi {
        page: page.index,
        rect: Rect::new(0.0, (top.y - margin).max(0.0), page.width, page.height),
    })
}
