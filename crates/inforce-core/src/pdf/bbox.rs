//! Page text index from poppler's `pdftotext -bbox-layout` XHTML output.

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, instrument};

use super::{Page, PageSource, TextBlock, TextLine, Word};
use crate::error::{PdfError, Result};
use crate::external::run_tool;
use crate::geometry::Rect;

/// Extracts pages by running `pdftotext -bbox-layout`.
pub struct PdftotextSource {
    program: String,
    timeout: Duration,
}

impl PdftotextSource {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl PageSource for PdftotextSource {
    #[instrument(skip(self), fields(backend = %self.program))]
    fn pages(&self, pdf: &Path) -> Result<Vec<Page>> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("layout.html");

        run_tool(
            &self.program,
            [
                OsStr::new("-bbox-layout"),
                OsStr::new("-enc"),
                OsStr::new("UTF-8"),
                pdf.as_os_str(),
                out.as_os_str(),
            ],
            self.timeout,
        )?;

        let xml = std::fs::read_to_string(&out)?;
        let pages = parse_bbox_layout(&xml)?;
        debug!("Indexed {} pages", pages.len());
        Ok(pages)
    }

    fn backend_name(&self) -> &str {
        "pdftotext"
    }
}

#[derive(Default)]
struct PageBuilder {
    width: f32,
    height: f32,
    blocks: Vec<TextBlock>,
}

/// Parse `-bbox-layout` XHTML into pages (0-based, in document order).
pub fn parse_bbox_layout(xml: &str) -> std::result::Result<Vec<Page>, PdfError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pages = Vec::new();
    let mut page: Option<PageBuilder> = None;
    let mut block: Option<(Rect, Vec<TextLine>)> = None;
    let mut line: Option<Vec<Word>> = None;
    let mut word: Option<(Rect, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"page" => {
                    page = Some(PageBuilder {
                        width: attr_f32(&e, b"width").unwrap_or(0.0),
                        height: attr_f32(&e, b"height").unwrap_or(0.0),
                        blocks: Vec::new(),
                    });
                }
                b"block" => block = Some((attr_rect(&e), Vec::new())),
                b"line" => line = Some(Vec::new()),
                b"word" => word = Some((attr_rect(&e), String::new())),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                // A page without any text is written as `<page .../>`.
                if e.name().as_ref() == b"page" {
                    pages.push(Page::new(
                        pages.len(),
                        attr_f32(&e, b"width").unwrap_or(0.0),
                        attr_f32(&e, b"height").unwrap_or(0.0),
                        Vec::new(),
                    ));
                }
            }
            Ok(Event::Text(t)) => {
                if let Some((_, text)) = word.as_mut() {
                    match t.unescape() {
                        Ok(s) => text.push_str(&s),
                        Err(_) => text.push_str(&String::from_utf8_lossy(&t)),
                    }
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"word" => {
                    if let (Some((rect, text)), Some(words)) = (word.take(), line.as_mut()) {
                        if !text.trim().is_empty() {
                            words.push(Word {
                                rect,
                                text: text.trim().to_string(),
                            });
                        }
                    }
                }
                b"line" => {
                    if let (Some(words), Some((_, lines))) = (line.take(), block.as_mut()) {
                        if !words.is_empty() {
                            lines.push(TextLine::from_words(words));
                        }
                    }
                }
                b"block" => {
                    if let (Some((rect, lines)), Some(p)) = (block.take(), page.as_mut()) {
                        if !lines.is_empty() {
                            p.blocks.push(TextBlock::new(rect, lines));
                        }
                    }
                }
                b"page" => {
                    if let Some(p) = page.take() {
                        pages.push(Page::new(pages.len(), p.width, p.height, p.blocks));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PdfError::TextLayer(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(pages)
}

fn attr_f32(e: &BytesStart, name: &[u8]) -> Option<f32> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok()?.trim().parse().ok())
}

fn attr_rect(e: &BytesStart) -> Rect {
    Rect::new(
        attr_f32(e, b"xMin").unwrap_or(0.0),
        attr_f32(e, b"yMin").unwrap_or(0.0),
        attr_f32(e, b"xMax").unwrap_or(0.0),
        attr_f32(e, b"yMax").unwrap_or(0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
<title></title>
<meta name="Producer" content="Test"/>
</head>
<body>
<doc>
  <page width="612.000000" height="792.000000">
    <flow>
      <block xMin="36.0" yMin="90.0" xMax="300.0" yMax="122.0">
        <line xMin="36.0" yMin="90.0" xMax="200.0" yMax="100.0">
          <word xMin="36.0" yMin="90.0" xMax="70.0" yMax="100.0">Policy</word>
          <word xMin="74.0" yMin="90.0" xMax="98.0" yMax="100.0">Year</word>
        </line>
        <line xMin="36.0" yMin="112.0" xMax="300.0" yMax="122.0">
          <word xMin="36.0" yMin="112.0" xMax="60.0" yMax="122.0">Cash</word>
          <word xMin="64.0" yMin="112.0" xMax="98.0" yMax="122.0">Value</word>
          <word xMin="102.0" yMin="112.0" xMax="140.0" yMax="122.0">A&amp;B</word>
        </line>
      </block>
    </flow>
  </page>
  <page width="612.000000" height="792.000000">
  </page>
</doc>
</body>
</html>"#;

    #[test]
    fn test_parse_pages_blocks_lines() {
        let pages = parse_bbox_layout(SAMPLE).unwrap();
        assert_eq!(pages.len(), 2);

        let first = &pages[0];
        assert_eq!(first.index, 0);
        assert_eq!(first.width, 612.0);
        assert_eq!(first.text, "Policy Year\nCash Value A&B");
        assert_eq!(first.blocks[0].lines[1].words[0].rect, Rect::new(36.0, 112.0, 60.0, 122.0));

        assert_eq!(pages[1].index, 1);
        assert!(pages[1].blocks.is_empty());
        assert_eq!(pages[1].text, "");
    }

    #[test]
    fn test_parse_feeds_search() {
        let pages = parse_bbox_layout(SAMPLE).unwrap();
        let hits = pages[0].search_for("policy year");
        assert_eq!(hits, vec![Rect::new(36.0, 90.0, 98.0, 100.0)]);
    }

    #[test]
    fn test_parse_rejects_broken_markup() {
        let err = parse_bbox_layout("<doc><page width=\"1\" height=\"1\"></doc>").unwrap_err();
        assert!(matches!(err, PdfError::TextLayer(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_binary_is_tool_error() {
        let source = PdftotextSource::new("no-such-pdftotext-bin", Duration::from_secs(1));
        let err = source.pages(Path::new("/nonexistent.pdf")).unwrap_err();
        assert!(matches!(err, crate::error::InforceError::Tool(_)));
    }
}
