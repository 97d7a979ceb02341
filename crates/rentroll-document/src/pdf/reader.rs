// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: open documents, read page text layers and locate page images
// using the `lopdf` crate.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use rentroll_core::error::{RentrollError, Result};
use tracing::{debug, instrument};

/// US Letter in points, used when a page carries no MediaBox.
const DEFAULT_MEDIA_BOX: (f64, f64) = (612.0, 792.0);

/// Read-only view over a parsed PDF.
///
/// Page indices are 0-based throughout; lopdf's 1-based page numbers stay
/// inside this module.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            RentrollError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self { document })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Page width and height in points, inherited through the page tree.
    pub fn media_box(&self, index: usize) -> Result<(f64, f64)> {
        let page_id = self.page_id(index)?;
        let Some(obj) = resolve_inherited(&self.document, page_id, b"MediaBox")? else {
            return Ok(DEFAULT_MEDIA_BOX);
        };
        let array = self
            .resolve(obj)?
            .as_array()
            .map_err(|err| RentrollError::PdfError(format!("MediaBox is not an array: {}", err)))?;
        if array.len() != 4 {
            return Err(RentrollError::PdfError(format!(
                "MediaBox has {} entries, expected 4",
                array.len()
            )));
        }
        let mut coords = [0.0f64; 4];
        for (slot, value) in coords.iter_mut().zip(array) {
            *slot = object_to_f64(self.resolve(value)?)?;
        }
        let width = (coords[2] - coords[0]).abs();
        let height = (coords[3] - coords[1]).abs();
        if width < 1.0 || height < 1.0 {
            return Ok(DEFAULT_MEDIA_BOX);
        }
        Ok((width, height))
    }

    // -- Extraction -----------------------------------------------------------

    /// Extract the embedded text layer of one page.
    #[instrument(skip(self))]
    pub fn page_text(&self, index: usize) -> Result<String> {
        // Validates the index before lopdf sees it.
        self.page_id(index)?;
        let page_number = index as u32 + 1;
        let text = self.document.extract_text(&[page_number]).map_err(|err| {
            RentrollError::PdfError(format!("text layer of page {} unreadable: {}", index, err))
        })?;
        debug!(chars = text.len(), "Text layer extracted");
        Ok(text)
    }

    /// Image XObjects placed directly on a page, in resource-dictionary order.
    pub fn page_images(&self, index: usize) -> Result<Vec<&Stream>> {
        let page_id = self.page_id(index)?;
        let Some(resources) = resolve_inherited(&self.document, page_id, b"Resources")? else {
            return Ok(Vec::new());
        };
        let resources = self.resolve_dict(resources)?;
        let Ok(xobjects) = resources.get(b"XObject") else {
            return Ok(Vec::new());
        };
        let xobjects = self.resolve_dict(xobjects)?;

        let mut images = Vec::new();
        for (_, value) in xobjects.iter() {
            let Ok(stream) = self.resolve(value)?.as_stream() else {
                continue;
            };
            let is_image = stream
                .dict
                .get(b"Subtype")
                .and_then(|s| s.as_name())
                .map(|name| name == b"Image")
                .unwrap_or(false);
            if is_image {
                images.push(stream);
            }
        }
        Ok(images)
    }

    /// Follow an indirect reference, if `object` is one.
    pub(crate) fn resolve<'a>(&'a self, object: &'a Object) -> Result<&'a Object> {
        match object {
            Object::Reference(id) => self.document.get_object(*id).map_err(|err| {
                RentrollError::PdfError(format!("dangling reference {:?}: {}", id, err))
            }),
            other => Ok(other),
        }
    }

    // -- Helpers --------------------------------------------------------------

    fn page_id(&self, index: usize) -> Result<ObjectId> {
        let pages = self.document.get_pages();
        pages.get(&(index as u32 + 1)).copied().ok_or_else(|| {
            RentrollError::PdfError(format!(
                "page {} out of range (document has {} pages)",
                index,
                pages.len()
            ))
        })
    }

    fn resolve_dict<'a>(&'a self, object: &'a Object) -> Result<&'a Dictionary> {
        self.resolve(object)?
            .as_dict()
            .map_err(|err| RentrollError::PdfError(format!("expected dictionary: {}", err)))
    }
}

/// Look a key up on a page, walking `/Parent` links until it is found.
fn resolve_inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>> {
    let mut current = page_id;
    // Bounded walk; malformed trees can loop.
    for _ in 0..64 {
        let dict = doc
            .get_object(current)
            .and_then(|o| o.as_dict())
            .map_err(|err| RentrollError::PdfError(format!("bad page dictionary: {}", err)))?;
        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }
        match dict.get(b"Parent").and_then(|p| p.as_reference()) {
            Ok(parent) => current = parent,
            Err(_) => return Ok(None),
        }
    }
    Ok(None)
}

pub(crate) fn object_to_f64(obj: &Object) -> Result<f64> {
    match obj {
        Object::Integer(i) => Ok(*i as f64),
        Object::Real(f) => Ok(*f as f64),
        _ => Err(RentrollError::PdfError(format!("expected number, got {:?}", obj))),
    }
}
