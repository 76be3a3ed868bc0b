//! PDF processing module: document access and the per-page text index.

mod bbox;
mod document;

pub use bbox::{PdftotextSource, parse_bbox_layout};
pub use document::{PdfDocument, to_pdf_space};
pub(crate) use document::{page_id, save_to_bytes};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::Rect;

/// A single word with its bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub rect: Rect,
    pub text: String,
}

/// A line of words, in reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub rect: Rect,
    pub words: Vec<Word>,
}

impl TextLine {
    /// Build a line whose box encloses its words.
    pub fn from_words(words: Vec<Word>) -> Self {
        let rect = Rect::enclosing(words.iter().map(|w| &w.rect))
            .unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0));
        Self { rect, words }
    }

    /// Words joined by single spaces.
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A block of lines as laid out on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub rect: Rect,
    pub text: String,
    pub lines: Vec<TextLine>,
}

impl TextBlock {
    pub fn new(rect: Rect, lines: Vec<TextLine>) -> Self {
        let text = lines
            .iter()
            .map(TextLine::text)
            .collect::<Vec<_>>()
            .join("\n");
        Self { rect, text, lines }
    }

    /// Build a block whose box encloses its lines.
    pub fn from_lines(lines: Vec<TextLine>) -> Self {
        let rect = Rect::enclosing(lines.iter().map(|l| &l.rect))
            .unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0));
        Self::new(rect, lines)
    }
}

/// Text and layout of one page. Immutable once extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page index (0-based).
    pub index: usize,
    pub width: f32,
    pub height: f32,
    /// Plain text: lines joined by newlines, blocks by blank lines.
    pub text: String,
    pub blocks: Vec<TextBlock>,
}

impl Page {
    pub fn new(index: usize, width: f32, height: f32, blocks: Vec<TextBlock>) -> Self {
        let text = blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Self {
            index,
            width,
            height,
            text,
            blocks,
        }
    }

    /// The full page rectangle.
    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    /// All lines of the page, block by block.
    pub fn lines(&self) -> impl Iterator<Item = &TextLine> {
        self.blocks.iter().flat_map(|b| b.lines.iter())
    }

    /// Rectangles of every occurrence of `needle` on the page.
    ///
    /// Matching is case-insensitive and whitespace-normalized, may span
    /// lines of one block, and yields one rectangle per touched line.
    pub fn search_for(&self, needle: &str) -> Vec<Rect> {
        let needle = needle
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");
        if needle.is_empty() {
            return Vec::new();
        }

        let mut rects = Vec::new();
        for block in &self.blocks {
            // (line index, word, byte range in `haystack`)
            let mut spans: Vec<(usize, &Word, usize, usize)> = Vec::new();
            let mut haystack = String::new();
            for (li, line) in block.lines.iter().enumerate() {
                for word in &line.words {
                    if !haystack.is_empty() {
                        haystack.push(' ');
                    }
                    let start = haystack.len();
                    haystack.push_str(&word.text.to_lowercase());
                    spans.push((li, word, start, haystack.len()));
                }
            }

            for (pos, m) in haystack.match_indices(needle.as_str()) {
                let end = pos + m.len();
                let mut per_line: Vec<(usize, Rect)> = Vec::new();
                for (li, word, s, e) in &spans {
                    if *s < end && *e > pos {
                        match per_line.iter_mut().find(|(l, _)| l == li) {
                            Some((_, r)) => *r = r.union(&word.rect),
                            None => per_line.push((*li, word.rect)),
                        }
                    }
                }
                rects.extend(per_line.into_iter().map(|(_, r)| r));
            }
        }
        rects
    }
}

/// Producer of the per-page text index.
pub trait PageSource {
    /// Extract every page of the PDF at `pdf`.
    fn pages(&self, pdf: &Path) -> Result<Vec<Page>>;

    /// Name of this backend (for diagnostics).
    fn backend_name(&self) -> &str;
}
