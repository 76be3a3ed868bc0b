//! Document access with lopdf: loading, page geometry and ROI cropping.

use lopdf::{Document, Object, ObjectId};
use tracing::{debug, trace};

use crate::error::PdfError;
use crate::geometry::Rect;

/// A loaded PDF document.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    document: Document,
    raw_data: Vec<u8>,
}

impl PdfDocument {
    /// Parse a PDF from bytes. Corrupt input is `PdfError::Malformed`.
    pub fn load(data: &[u8]) -> Result<Self, PdfError> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Malformed(e.to_string()))?;

        // Handle PDFs with empty password encryption
        let raw_data = if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            let mut decrypted = Vec::new();
            doc.save_to(&mut decrypted)
                .map_err(|e| PdfError::Write(format!("failed to save decrypted PDF: {}", e)))?;
            decrypted
        } else {
            data.to_vec()
        };

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        Ok(Self {
            document: doc,
            raw_data,
        })
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Bytes of the (decrypted) document.
    pub fn raw_data(&self) -> &[u8] {
        &self.raw_data
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Object id of the page at `index` (0-based).
    pub fn page_id(&self, index: usize) -> Result<ObjectId, PdfError> {
        page_id(&self.document, index)
    }

    /// MediaBox of the page at `index` as [x0, y0, x1, y1], bottom-left origin.
    pub fn media_box(&self, index: usize) -> Result<[f32; 4], PdfError> {
        media_box(&self.document, self.page_id(index)?)
    }

    /// Whether any page carries extractable text.
    pub fn has_text_layer(&self) -> bool {
        match pdf_extract::extract_text_from_mem(&self.raw_data) {
            Ok(text) => !text.trim().is_empty(),
            Err(e) => {
                debug!("pdf-extract failed ({}), falling back to lopdf", e);
                let pages: Vec<u32> = self.document.get_pages().keys().copied().collect();
                self.document
                    .extract_text(&pages)
                    .map(|t| !t.trim().is_empty())
                    .unwrap_or(false)
            }
        }
    }

    /// A single-page copy of page `index` whose CropBox is `roi`.
    ///
    /// Content streams are left untouched so vector rulings survive.
    pub fn crop_page(&self, index: usize, roi: &Rect) -> Result<Document, PdfError> {
        let media = self.media_box(index)?;
        let keep = index as u32 + 1;

        let mut doc = self.document.clone();
        let others: Vec<u32> = doc.get_pages().keys().copied().filter(|n| *n != keep).collect();
        if !others.is_empty() {
            doc.delete_pages(&others);
        }
        let page_id = page_id(&doc, 0)?;

        let crop = to_pdf_space(roi, media);
        trace!("Cropping page {} to {:?} (media {:?})", index, crop, media);

        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
        page.set("MediaBox", number_array(&media));
        page.set("CropBox", number_array(&crop));
        doc.prune_objects();

        Ok(doc)
    }
}

/// Serialize a document to bytes.
pub(crate) fn save_to_bytes(doc: &mut Document) -> Result<Vec<u8>, PdfError> {
    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| PdfError::Write(e.to_string()))?;
    Ok(out)
}

pub(crate) fn page_id(doc: &Document, index: usize) -> Result<ObjectId, PdfError> {
    doc.get_pages()
        .get(&(index as u32 + 1))
        .copied()
        .ok_or(PdfError::InvalidPage(index))
}

pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> Result<[f32; 4], PdfError> {
    let obj = inherited_attribute(doc, page_id, b"MediaBox")
        .ok_or_else(|| PdfError::Malformed("page has no MediaBox".to_string()))?;
    let arr = obj.as_array()?;
    if arr.len() != 4 {
        return Err(PdfError::Malformed(format!(
            "MediaBox has {} entries",
            arr.len()
        )));
    }
    let mut out = [0.0f32; 4];
    for (slot, value) in out.iter_mut().zip(arr) {
        *slot = match doc.dereference(value) {
            Ok((_, v)) => v.as_float()?,
            Err(e) => return Err(e.into()),
        };
    }
    let [x0, y0, x1, y1] = out;
    Ok([x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)])
}

/// Convert a top-left-origin rectangle to PDF user space.
pub fn to_pdf_space(rect: &Rect, media_box: [f32; 4]) -> [f32; 4] {
    let [mx0, _my0, _mx1, my1] = media_box;
    [mx0 + rect.x0, my1 - rect.y1, mx0 + rect.x1, my1 - rect.y0]
}

fn number_array(values: &[f32; 4]) -> Object {
    Object::Array(values.iter().map(|v| Object::Real(*v)).collect())
}

/// Look up a page attribute, following the Parent chain for inherited keys.
fn inherited_attribute<'a>(doc: &'a Document, node_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let node = doc.get_object(node_id).ok()?;
    let dict = node.as_dict().ok()?;

    if let Ok(value) = dict.get(key) {
        return doc.dereference(value).ok().map(|(_, v)| v);
    }

    match dict.get(b"Parent") {
        Ok(Object::Reference(parent_id)) => inherited_attribute(doc, *parent_id, key),
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::text_pdf;
    use super::*;

    #[test]
    fn test_garbage_is_malformed() {
        let err = PdfDocument::load(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, PdfError::Malformed(_)));
    }

    #[test]
    fn test_inherited_media_box() {
        let bytes = text_pdf(&[&[(72.0, 700.0, "hello")], &[]]);
        let pdf = PdfDocument::load(&bytes).unwrap();
        assert_eq!(pdf.page_count(), 2);
        assert_eq!(pdf.media_box(1).unwrap(), [0.0, 0.0, 612.0, 792.0]);
        assert!(matches!(pdf.media_box(5), Err(PdfError::InvalidPage(5))));
    }

    #[test]
    fn test_to_pdf_space_flips_y() {
        let roi = Rect::new(0.0, 100.0, 612.0, 792.0);
        assert_eq!(to_pdf_space(&roi, [0.0, 0.0, 612.0, 792.0]), [0.0, 0.0, 612.0, 692.0]);
    }

    #[test]
    fn test_crop_page_keeps_single_page() {
        let bytes = text_pdf(&[&[(72.0, 700.0, "one")], &[(72.0, 700.0, "two")]]);
        let pdf = PdfDocument::load(&bytes).unwrap();
        let roi = Rect::new(0.0, 94.0, 612.0, 792.0);

        let mut cropped = pdf.crop_page(1, &roi).unwrap();
        assert_eq!(cropped.get_pages().len(), 1);

        let id = page_id(&cropped, 0).unwrap();
        let page = cropped.get_object(id).unwrap().as_dict().unwrap();
        let crop = page.get(b"CropBox").unwrap().as_array().unwrap();
        assert_eq!(crop[3].as_float().unwrap(), 698.0);

        let reloaded = PdfDocument::load(&save_to_bytes(&mut cropped).unwrap()).unwrap();
        assert_eq!(reloaded.page_count(), 1);
    }

    #[test]
    fn test_has_text_layer() {
        let with_text = PdfDocument::load(&text_pdf(&[&[(72.0, 700.0, "ledger")]])).unwrap();
        assert!(with_text.has_text_layer());

        let blank = PdfDocument::load(&text_pdf(&[&[]])).unwrap();
        assert!(!blank.has_text_layer());
    }
}
