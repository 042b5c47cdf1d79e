// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Source PDF: loads the scanned input document with `lopdf` and answers the
// page-level questions the compositor needs (count, size, page objects).

use lopdf::{Dictionary, Document, Object, ObjectId};
use scanlayer_core::error::{Result, ScanLayerError};
use tracing::{debug, info, instrument, warn};

/// US Letter, used when a page tree carries no MediaBox at all.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Parent-chain depth after which an inherited lookup gives up.
const MAX_TREE_DEPTH: usize = 32;

/// A loaded, unencrypted input PDF with at least one page.
pub struct SourcePdf {
    document: Document,
    /// Page object ids in page order.
    pages: Vec<ObjectId>,
}

impl SourcePdf {
    /// Load a PDF from memory.
    ///
    /// Unreadable, encrypted, and page-less documents are all rejected with
    /// [`ScanLayerError::UnsupportedFeature`].
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            if contains_encrypt_key(data) {
                ScanLayerError::UnsupportedFeature(format!("document is encrypted: {err}"))
            } else {
                ScanLayerError::UnsupportedFeature(format!("failed to load PDF: {err}"))
            }
        })?;

        if document.trailer.has(b"Encrypt") {
            return Err(ScanLayerError::UnsupportedFeature(
                "document is encrypted".into(),
            ));
        }

        let pages: Vec<ObjectId> = document.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(ScanLayerError::UnsupportedFeature(
                "document has no pages".into(),
            ));
        }

        info!(pages = pages.len(), version = %document.version, "Source PDF loaded");
        Ok(Self { document, pages })
    }

    // -- Inspection -----------------------------------------------------------

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Object id of the page at 0-based `index`.
    pub fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.pages
            .get(index)
            .copied()
            .ok_or_else(|| ScanLayerError::render(index as u32 + 1, "page index out of range"))
    }

    /// MediaBox of the page at `index` as `[x0, y0, x1, y1]`, normalised so
    /// that `x0 < x1` and `y0 < y1`.
    pub fn media_box(&self, index: usize) -> Result<[f32; 4]> {
        let page_id = self.page_id(index)?;
        let Some(object) = inherited_attribute(&self.document, page_id, b"MediaBox") else {
            warn!(page = index + 1, "Page has no MediaBox; assuming US Letter");
            return Ok(DEFAULT_MEDIA_BOX);
        };

        let values = resolve(&self.document, object)
            .as_array()
            .map_err(|_| ScanLayerError::render(index as u32 + 1, "MediaBox is not an array"))?
            .iter()
            .filter_map(|v| number(&self.document, v))
            .collect::<Vec<_>>();

        let &[a, b, c, d] = values.as_slice() else {
            return Err(ScanLayerError::render(
                index as u32 + 1,
                format!("MediaBox has {} numeric entries", values.len()),
            ));
        };
        let media_box = [a.min(c), b.min(d), a.max(c), b.max(d)];
        if media_box[2] - media_box[0] <= 0.0 || media_box[3] - media_box[1] <= 0.0 {
            return Err(ScanLayerError::render(index as u32 + 1, "MediaBox is empty"));
        }

        debug!(page = index + 1, ?media_box, "MediaBox resolved");
        Ok(media_box)
    }

    /// Clockwise display rotation of the page at `index`: 0, 90, 180 or 270.
    ///
    /// `/Rotate` values that are not a multiple of 90 are invalid and read as 0.
    pub fn rotation(&self, index: usize) -> Result<u16> {
        let page_id = self.page_id(index)?;
        let Some(rotate) = inherited_attribute(&self.document, page_id, b"Rotate")
            .and_then(|r| number(&self.document, r))
        else {
            return Ok(0);
        };
        let degrees = (rotate as i64).rem_euclid(360);
        if rotate.fract() != 0.0 || degrees % 90 != 0 {
            warn!(page = index + 1, rotate, "Ignoring /Rotate that is not a multiple of 90");
            return Ok(0);
        }
        Ok(degrees as u16)
    }

    /// Width and height of the page at `index`, in points.
    pub fn page_size(&self, index: usize) -> Result<(f32, f32)> {
        let [x0, y0, x1, y1] = self.media_box(index)?;
        Ok((x1 - x0, y1 - y0))
    }
}

/// Look `key` up on a page dictionary, walking `/Parent` for inheritable
/// attributes.
pub(crate) fn inherited_attribute<'a>(
    document: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut dict: &Dictionary = document.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        let parent = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
        dict = document.get_dictionary(parent).ok()?;
    }
    None
}

/// Follow a single indirect reference, leaving direct objects untouched.
pub(crate) fn resolve<'a>(document: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => document.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// Numeric value of an Integer or Real object (through one reference).
pub(crate) fn number(document: &Document, object: &Object) -> Option<f32> {
    match resolve(document, object) {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn contains_encrypt_key(data: &[u8]) -> bool {
    data.windows(b"/Encrypt".len()).any(|w| w == b"/Encrypt")
}
