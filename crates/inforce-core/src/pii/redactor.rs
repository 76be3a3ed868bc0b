//! Redaction: scrub identifying text from content streams and paint covers.
//!
//! Page content and the form XObjects it draws are both scrubbed. Content
//! that cannot be parsed loses all of its text rather than being kept.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, instrument, warn};

use super::locator::PageRedaction;
use crate::error::{Issue, PdfError, Result};
use crate::geometry::Rect;
use crate::pdf::{PdfDocument, page_id, save_to_bytes, to_pdf_space};

/// Nesting limit for forms drawn inside forms.
const MAX_FORM_DEPTH: usize = 8;

/// Affine matrix [a b c d e f] in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f32, ty: f32) -> Matrix {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        if operands.len() != 6 {
            return None;
        }
        let mut m = [0.0f32; 6];
        for (slot, obj) in m.iter_mut().zip(operands) {
            *slot = obj.as_float().ok()?;
        }
        Some(Matrix(m))
    }

    /// `self × other`.
    fn then(self, other: Matrix) -> Matrix {
        let [a0, a1, a2, a3, a4, a5] = self.0;
        let [b0, b1, b2, b3, b4, b5] = other.0;
        Matrix([
            a0 * b0 + a1 * b2,
            a0 * b1 + a1 * b3,
            a2 * b0 + a3 * b2,
            a2 * b1 + a3 * b3,
            a4 * b0 + a5 * b2 + b4,
            a4 * b1 + a5 * b3 + b5,
        ])
    }

    fn origin(self) -> (f32, f32) {
        (self.0[4], self.0[5])
    }
}

/// Text positioning state needed to locate each text-showing operator.
struct TextCursor {
    ctm: Matrix,
    stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    leading: f32,
}

impl TextCursor {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            leading: 0.0,
        }
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(self.tlm);
        self.tm = self.tlm;
    }

    /// Apply a non-showing operator; `'` and `"` move to the next line here.
    fn apply(&mut self, op: &Operation) {
        let num = |i: usize| op.operands.get(i).and_then(|o| o.as_float().ok());
        match op.operator.as_str() {
            "q" => self.stack.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.stack.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    self.ctm = m.then(self.ctm);
                }
            }
            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    self.next_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    self.leading = -ty;
                    self.next_line(tx, ty);
                }
            }
            "TL" => {
                if let Some(l) = num(0) {
                    self.leading = l;
                }
            }
            "T*" | "'" | "\"" => self.next_line(0.0, -self.leading),
            _ => {}
        }
    }

    /// Current text origin in PDF user space.
    fn origin(&self) -> (f32, f32) {
        self.tm.then(self.ctm).origin()
    }
}

fn is_text_show(operator: &str) -> bool {
    matches!(operator, "Tj" | "TJ" | "'" | "\"")
}

/// Latin-1 view of every string operand.
fn shown_text(operands: &[Object]) -> String {
    let mut out = String::new();
    for operand in operands {
        match operand {
            Object::String(bytes, _) => out.push_str(&latin1(bytes)),
            Object::Array(items) => out.push_str(&shown_text(items)),
            _ => {}
        }
    }
    out
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|b| *b as char).collect()
}

/// Lowercase with all whitespace removed, so kerned pieces and spaced
/// needles compare equal.
fn squash(s: &str) -> String {
    s.split_whitespace()
        .flat_map(str::chars)
        .flat_map(char::to_lowercase)
        .collect()
}

/// Every string operand in showing order, including `TJ` array elements.
fn string_operands(operands: &mut [Object]) -> Vec<&mut Vec<u8>> {
    let mut out = Vec::new();
    for operand in operands.iter_mut() {
        match operand {
            Object::String(bytes, _) => out.push(bytes),
            Object::Array(items) => out.extend(string_operands(items)),
            _ => {}
        }
    }
    out
}

/// Flags the pieces overlapping any needle occurrence in their concatenation.
fn matched_pieces(pieces: &[String], needles: &[String]) -> Vec<bool> {
    let mut joined = String::new();
    let mut bounds = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let start = joined.len();
        joined.push_str(piece);
        bounds.push((start, joined.len()));
    }

    let mut hit = vec![false; pieces.len()];
    for needle in needles {
        for (start, _) in joined.match_indices(needle.as_str()) {
            let end = start + needle.len();
            for (flag, (s, e)) in hit.iter_mut().zip(&bounds) {
                if *s < end && start < *e {
                    *flag = true;
                }
            }
        }
    }
    hit
}

/// What a page asks to remove, in top-left page coordinates.
struct Targets {
    needles: Vec<String>,
    zones: Vec<Rect>,
    media: [f32; 4],
    full_page: bool,
}

impl Targets {
    fn new(redaction: &PageRedaction, media: [f32; 4]) -> Self {
        Self {
            needles: redaction
                .needles
                .iter()
                .map(|n| squash(n))
                .filter(|n| !n.is_empty())
                .collect(),
            zones: redaction.rects.iter().map(|r| r.expand(1.5)).collect(),
            media,
            full_page: redaction.full_page,
        }
    }

    fn whole_page(media: [f32; 4]) -> Self {
        Self {
            needles: Vec::new(),
            zones: Vec::new(),
            media,
            full_page: true,
        }
    }

    /// Blank the strings of one text-showing operator drawn at `origin`
    /// (PDF user space). Returns whether anything was removed.
    fn scrub_show(&self, op: &mut Operation, origin: (f32, f32)) -> bool {
        let (x, y) = (origin.0 - self.media[0], self.media[3] - origin.1);
        let mut strings = string_operands(&mut op.operands);

        if self.full_page || self.zones.iter().any(|z| z.contains_point(x, y)) {
            let shown = strings.iter().any(|s| !s.is_empty());
            strings.iter_mut().for_each(|s| s.clear());
            return shown;
        }

        let on_band = self.zones.iter().any(|z| y >= z.y0 && y <= z.y1);
        let pieces: Vec<String> = strings.iter().map(|s| squash(&latin1(s))).collect();
        let hits = matched_pieces(&pieces, &self.needles);

        let mut removed = false;
        for ((bytes, piece), hit) in strings.iter_mut().zip(&pieces).zip(hits) {
            if hit || (on_band && self.is_fragment(piece)) {
                bytes.clear();
                removed = true;
            }
        }
        removed
    }

    /// A piece of a located string shown on its own, e.g. one word per `Tj`.
    fn is_fragment(&self, piece: &str) -> bool {
        piece.chars().count() >= 3 && self.needles.iter().any(|n| n.contains(piece))
    }
}

/// Outcome of scrubbing one operator list.
struct Scrubbed {
    operators: usize,
    /// XObjects drawn with `Do`, with the CTM in force at the call.
    invoked: Vec<(Vec<u8>, Matrix)>,
}

/// Blank text hidden by a cover or carrying located text.
fn scrub(ops: &mut [Operation], targets: &Targets, ctm: Matrix) -> Scrubbed {
    let mut cursor = TextCursor::new(ctm);
    let mut scrubbed = Scrubbed {
        operators: 0,
        invoked: Vec::new(),
    };
    for op in ops.iter_mut() {
        cursor.apply(op);
        if op.operator == "Do" {
            if let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) {
                scrubbed.invoked.push((name.to_vec(), cursor.ctm));
            }
        } else if is_text_show(&op.operator) && targets.scrub_show(op, cursor.origin()) {
            scrubbed.operators += 1;
        }
    }
    scrubbed
}

/// Raw bytes of a stream, decoded when it declares a filter.
fn stream_data(stream: &Stream) -> std::result::Result<Vec<u8>, String> {
    if stream.dict.has(b"Filter") {
        stream.decompressed_content().map_err(|e| e.to_string())
    } else {
        Ok(stream.content.clone())
    }
}

fn decode_operations(data: &[u8]) -> std::result::Result<Vec<Operation>, String> {
    let operations = Content::decode(data).map_err(|e| e.to_string())?.operations;
    if operations.is_empty() && data.iter().any(|b| !b.is_ascii_whitespace()) {
        return Err("no operators could be parsed".to_string());
    }
    Ok(operations)
}

/// Operators of all content streams of a page, in drawing order.
fn page_operations(doc: &Document, id: ObjectId) -> std::result::Result<Vec<Operation>, String> {
    let mut data = Vec::new();
    for content_id in doc.get_page_contents(id) {
        let stream = doc
            .get_object(content_id)
            .and_then(Object::as_stream)
            .map_err(|e| e.to_string())?;
        data.extend(stream_data(stream)?);
        data.push(b'\n');
    }
    decode_operations(&data)
}

fn page_resources(doc: &Document, id: ObjectId) -> Vec<Dictionary> {
    match doc.get_page_resources(id) {
        Ok((inline, ids)) => inline
            .cloned()
            .into_iter()
            .chain(ids.into_iter().filter_map(|id| doc.get_dictionary(id).ok().cloned()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn xobjects<'a>(doc: &'a Document, resources: &'a Dictionary) -> Option<&'a Dictionary> {
    let obj = resources.get(b"XObject").ok()?;
    doc.dereference(obj).ok()?.1.as_dict().ok()
}

fn is_form(doc: &Document, id: ObjectId) -> bool {
    doc.get_object(id)
        .and_then(Object::as_stream)
        .and_then(|s| s.dict.get(b"Subtype"))
        .and_then(Object::as_name)
        .is_ok_and(|subtype| subtype == b"Form")
}

/// The form XObject registered as `name`, if any.
fn form_named(doc: &Document, resources: &[Dictionary], name: &[u8]) -> Option<ObjectId> {
    resources.iter().find_map(|res| {
        let id = xobjects(doc, res)?.get(name).ok()?.as_reference().ok()?;
        is_form(doc, id).then_some(id)
    })
}

fn all_forms(doc: &Document, resources: &[Dictionary]) -> Vec<ObjectId> {
    resources
        .iter()
        .filter_map(|res| xobjects(doc, res))
        .flat_map(|dict| dict.iter().filter_map(|(_, obj)| obj.as_reference().ok()))
        .filter(|id| is_form(doc, *id))
        .collect()
}

/// A form waiting to be scrubbed.
struct PendingForm {
    id: ObjectId,
    ctm: Matrix,
    depth: usize,
}

/// Paints opaque covers and removes the text they hide.
#[derive(Debug, Clone)]
pub struct Redactor {
    fill: [f32; 3],
}

/// A redacted copy of a document.
#[derive(Debug, Clone, Default)]
pub struct Redaction {
    pub document: Vec<u8>,
    /// Pages or forms whose content was dropped because it could not be read.
    pub issues: Vec<Issue>,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new([1.0, 1.0, 1.0])
    }
}

impl Redactor {
    pub fn new(fill: [f32; 3]) -> Self {
        Self { fill }
    }

    /// Redact a copy of `pdf`; the input bytes are never modified.
    #[instrument(skip_all)]
    pub fn redact(&self, pdf: &[u8], pages: &[PageRedaction]) -> Result<Redaction> {
        let source = PdfDocument::load(pdf)?;
        let mut doc = source.document().clone();
        let mut issues = Vec::new();

        for redaction in pages.iter().filter(|r| !r.rects.is_empty()) {
            let id = source.page_id(redaction.page)?;
            let media = source.media_box(redaction.page)?;
            let targets = Targets::new(redaction, media);
            let resources = page_resources(&doc, id);

            let mut body = match page_operations(&doc, id) {
                Ok(mut ops) => {
                    let scrubbed = scrub(&mut ops, &targets, Matrix::IDENTITY);
                    debug!(
                        "Page {}: scrubbed {} text operators",
                        redaction.page, scrubbed.operators
                    );
                    let forms = scrubbed
                        .invoked
                        .iter()
                        .filter_map(|(name, ctm)| {
                            form_named(&doc, &resources, name).map(|id| PendingForm {
                                id,
                                ctm: *ctm,
                                depth: 1,
                            })
                        })
                        .collect();
                    scrub_forms(&mut doc, forms, &targets, &resources, redaction.page, &mut issues)?;
                    encode(ops)?
                }
                Err(reason) => {
                    warn!(
                        "Page {} content unreadable ({}), dropping all of its text",
                        redaction.page, reason
                    );
                    issues.push(Issue::RedactionFallback {
                        page: redaction.page,
                        reason,
                    });
                    let forms = all_forms(&doc, &resources)
                        .into_iter()
                        .map(|id| PendingForm {
                            id,
                            ctm: Matrix::IDENTITY,
                            depth: 1,
                        })
                        .collect();
                    let whole = Targets::whole_page(media);
                    scrub_forms(&mut doc, forms, &whole, &resources, redaction.page, &mut issues)?;
                    Vec::new()
                }
            };

            let mut wrapped = b"q\n".to_vec();
            wrapped.append(&mut body);
            wrapped.extend_from_slice(b"\nQ\n");
            wrapped.extend(encode(self.covers(&redaction.rects, media))?);

            doc.change_page_content(id, wrapped)
                .map_err(PdfError::from)?;
        }

        // Replaced content streams would otherwise still be written out.
        let pruned = doc.prune_objects();
        debug!("Pruned {} unreferenced objects", pruned.len());

        Ok(Redaction {
            document: save_to_bytes(&mut doc)?,
            issues,
        })
    }

    /// `q r g b rg x y w h re f Q` per rectangle: filled, no stroke.
    fn covers(&self, rects: &[Rect], media: [f32; 4]) -> Vec<Operation> {
        let [r, g, b] = self.fill;
        let mut ops = Vec::with_capacity(rects.len() * 4);
        for rect in rects {
            let [x0, y0, x1, y1] = to_pdf_space(rect, media);
            ops.push(Operation::new("q", vec![]));
            ops.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
            ops.push(Operation::new(
                "re",
                vec![x0.into(), y0.into(), (x1 - x0).into(), (y1 - y0).into()],
            ));
            ops.push(Operation::new("f", vec![]));
            ops.push(Operation::new("Q", vec![]));
        }
        ops
    }
}

/// Scrub form XObjects in place, following forms they draw in turn.
/// Forms that cannot be read are emptied.
fn scrub_forms(
    doc: &mut Document,
    mut pending: Vec<PendingForm>,
    targets: &Targets,
    page_resources: &[Dictionary],
    page: usize,
    issues: &mut Vec<Issue>,
) -> std::result::Result<(), PdfError> {
    while let Some(form) = pending.pop() {
        let stream = doc
            .get_object(form.id)
            .and_then(Object::as_stream)
            .map_err(PdfError::from)?;
        let matrix = stream
            .dict
            .get(b"Matrix")
            .and_then(Object::as_array)
            .ok()
            .and_then(|m| Matrix::from_operands(m))
            .unwrap_or(Matrix::IDENTITY);
        let resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|obj| doc.dereference(obj).ok())
            .and_then(|(_, obj)| obj.as_dict().ok())
            .map(|dict| vec![dict.clone()])
            .unwrap_or_else(|| page_resources.to_vec());

        let decoded = if form.depth > MAX_FORM_DEPTH {
            Err(format!("forms nested deeper than {}", MAX_FORM_DEPTH))
        } else {
            stream_data(stream).and_then(|data| decode_operations(&data))
        };

        let body = match decoded {
            Ok(mut ops) => {
                let scrubbed = scrub(&mut ops, targets, matrix.then(form.ctm));
                debug!(
                    "Form {:?} on page {}: scrubbed {} text operators",
                    form.id, page, scrubbed.operators
                );
                for (name, ctm) in &scrubbed.invoked {
                    if let Some(id) = form_named(doc, &resources, name) {
                        pending.push(PendingForm {
                            id,
                            ctm: *ctm,
                            depth: form.depth + 1,
                        });
                    }
                }
                encode(ops)?
            }
            Err(reason) => {
                warn!(
                    "Form {:?} on page {} unreadable ({}), emptying it",
                    form.id, page, reason
                );
                issues.push(Issue::RedactionFallback { page, reason });
                Vec::new()
            }
        };
        doc.change_content_stream(form.id, body);
    }
    Ok(())
}

fn encode(operations: Vec<Operation>) -> std::result::Result<Vec<u8>, PdfError> {
    Content { operations }
        .encode()
        .map_err(|e| PdfError::Write(e.to_string()))
}

/// Text shown on page `index` of a document, one string per operator.
pub fn page_strings(doc: &Document, index: usize) -> std::result::Result<Vec<String>, PdfError> {
    let id = page_id(doc, index)?;
    let content = Content::decode(&doc.get_page_content(id)?)?;
    Ok(content
        .operations
        .iter()
        .filter(|op| is_text_show(&op.operator))
        .map(|op| shown_text(&op.operands))
        .filter(|s| !s.is_empty())
        .collect())
}
