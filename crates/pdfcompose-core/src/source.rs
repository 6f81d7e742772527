//! Source documents
//!
//! Sources are parsed once and only ever read from. Assembly borrows them
//! immutably, so two operations on the same source never observe each other.

use crate::error::{ComposeError, Result};
use crate::plan::DocumentId;
use crate::rotation::Rotation;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;
use std::collections::BTreeMap;

/// US Letter, used when a page tree has no `/MediaBox` at all.
pub const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Page tree depth beyond which inheritance lookups give up.
const MAX_TREE_DEPTH: usize = 64;

/// A loaded, read-only source document.
#[derive(Debug)]
pub struct SourceDocument {
    id: DocumentId,
    document: Document,
    pages: Vec<ObjectId>,
}

impl SourceDocument {
    /// Parse source bytes. Any failure is a `SourceLoad` error for `id`.
    pub fn load(id: DocumentId, bytes: &[u8]) -> Result<Self> {
        if !bytes.starts_with(b"%PDF-") {
            return Err(load_error(id, "missing %PDF- header"));
        }
        let document = Document::load_mem(bytes).map_err(|e| load_error(id, e))?;
        Self::from_document(id, document)
    }

    pub fn from_document(id: DocumentId, document: Document) -> Result<Self> {
        if document.is_encrypted() {
            return Err(load_error(id, "document is encrypted"));
        }

        let pages: Vec<ObjectId> = document.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(load_error(id, "document has no pages"));
        }

        tracing::debug!(document = id.0, pages = pages.len(), "loaded source document");
        Ok(Self {
            id,
            document,
            pages,
        })
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.pages
            .get(index)
            .copied()
            .ok_or(ComposeError::PageIndex {
                document: self.id,
                index,
                page_count: self.pages.len(),
            })
    }

    pub fn page_dict(&self, index: usize) -> Result<&Dictionary> {
        let page_id = self.page_id(index)?;
        self.document
            .get_dictionary(page_id)
            .map_err(|e| load_error(self.id, format!("page {}: {}", index + 1, e)))
    }

    /// Look up a page attribute, walking up `/Parent` for inheritable keys.
    pub fn inherited(&self, index: usize, key: &[u8]) -> Result<Option<&Object>> {
        let mut dict = self.page_dict(index)?;
        for _ in 0..MAX_TREE_DEPTH {
            if let Ok(value) = dict.get(key) {
                return Ok(Some(resolve(&self.document, value)));
            }
            let parent = match dict.get(b"Parent").and_then(Object::as_reference) {
                Ok(parent) => parent,
                Err(_) => return Ok(None),
            };
            dict = match self.document.get_dictionary(parent) {
                Ok(parent) => parent,
                Err(_) => return Ok(None),
            };
        }
        Ok(None)
    }

    pub fn page_geometry(&self, index: usize) -> Result<PageGeometry> {
        let media_box = self.page_box(index, b"MediaBox")?.unwrap_or_else(|| {
            tracing::warn!(document = self.id.0, page = index + 1, "page has no usable MediaBox");
            DEFAULT_MEDIA_BOX
        });
        // Viewers show the CropBox clipped to the MediaBox
        let crop_box = self
            .page_box(index, b"CropBox")?
            .and_then(|crop| intersect(crop, media_box))
            .unwrap_or(media_box);

        let degrees = match self.inherited(index, b"Rotate")? {
            Some(value) => value.as_i64().unwrap_or(0),
            None => 0,
        };

        Ok(PageGeometry {
            media_box,
            crop_box,
            width: crop_box[2] - crop_box[0],
            height: crop_box[3] - crop_box[1],
            rotation: Rotation::from_degrees(degrees)?,
        })
    }

    fn page_box(&self, index: usize, key: &[u8]) -> Result<Option<[f64; 4]>> {
        Ok(match self.inherited(index, key)? {
            Some(Object::Array(values)) => parse_box(&self.document, values),
            _ => None,
        })
    }

    pub fn page_info(&self, index: usize) -> Result<PageInfo> {
        let geometry = self.page_geometry(index)?;
        let has_content = self.page_dict(index)?.get(b"Contents").is_ok();
        Ok(PageInfo::new(index + 1, &geometry, has_content))
    }
}

fn load_error(document: DocumentId, reason: impl std::fmt::Display) -> ComposeError {
    ComposeError::SourceLoad {
        document,
        reason: reason.to_string(),
    }
}

/// Follow a chain of references to the underlying object.
pub(crate) fn resolve<'a>(doc: &'a Document, mut obj: &'a Object) -> &'a Object {
    for _ in 0..MAX_TREE_DEPTH {
        match obj {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(target) => obj = target,
                Err(_) => return obj,
            },
            _ => return obj,
        }
    }
    obj
}

/// Numeric value of a PDF object.
pub(crate) fn extract_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Parse a `[llx lly urx ury]` box, normalising the corner order.
fn parse_box(doc: &Document, values: &[Object]) -> Option<[f64; 4]> {
    if values.len() != 4 {
        return None;
    }
    let mut n = [0.0; 4];
    for (slot, value) in n.iter_mut().zip(values) {
        *slot = extract_number(resolve(doc, value))?;
    }
    Some([n[0].min(n[2]), n[1].min(n[3]), n[0].max(n[2]), n[1].max(n[3])])
}

/// Intersection of two normalised boxes, if it has any area.
fn intersect(a: [f64; 4], b: [f64; 4]) -> Option<[f64; 4]> {
    let clipped = [a[0].max(b[0]), a[1].max(b[1]), a[2].min(b[2]), a[3].min(b[3])];
    (clipped[2] > clipped[0] && clipped[3] > clipped[1]).then_some(clipped)
}

/// Size and rotation of a source page, in unrotated page space.
///
/// `width` and `height` are those of the visible `crop_box`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub media_box: [f64; 4],
    pub crop_box: [f64; 4],
    pub width: f64,
    pub height: f64,
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub enum PageOrientation {
    Portrait,
    Landscape,
    Square,
}

/// Page summary for UI display.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageInfo {
    /// 1-based page number
    pub page_num: usize,
    /// Width in points (1 point = 1/72 inch)
    pub width: f64,
    pub height: f64,
    /// Rotation in degrees (0, 90, 180, 270)
    pub rotation: i64,
    pub has_content: bool,
    /// Orientation as displayed, after rotation
    pub orientation: PageOrientation,
}

impl PageInfo {
    fn new(page_num: usize, geometry: &PageGeometry, has_content: bool) -> Self {
        let (shown_w, shown_h) = if geometry.rotation.is_quarter_turn() {
            (geometry.height, geometry.width)
        } else {
            (geometry.width, geometry.height)
        };

        let orientation = if (shown_w - shown_h).abs() < 1.0 {
            PageOrientation::Square
        } else if shown_w > shown_h {
            PageOrientation::Landscape
        } else {
            PageOrientation::Portrait
        };

        Self {
            page_num,
            width: geometry.width,
            height: geometry.height,
            rotation: geometry.rotation.degrees(),
            has_content,
            orientation,
        }
    }
}

/// The source documents available to one assembly.
#[derive(Debug, Default)]
pub struct SourceSet {
    documents: BTreeMap<DocumentId, SourceDocument>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: SourceDocument) {
        self.documents.insert(source.id(), source);
    }

    /// Parse `bytes` and register them under `id`.
    pub fn load(&mut self, id: DocumentId, bytes: &[u8]) -> Result<()> {
        self.insert(SourceDocument::load(id, bytes)?);
        Ok(())
    }

    /// Load several byte buffers, numbering them from 0 in order.
    pub fn from_bytes<B: AsRef<[u8]>>(buffers: &[B]) -> Result<Self> {
        let mut set = Self::new();
        for (i, bytes) in buffers.iter().enumerate() {
            set.load(DocumentId(i as u32), bytes.as_ref())?;
        }
        Ok(set)
    }

    pub fn get(&self, id: DocumentId) -> Result<&SourceDocument> {
        self.documents
            .get(&id)
            .ok_or_else(|| load_error(id, "document is not loaded"))
    }

    pub fn remove(&mut self, id: DocumentId) -> Option<SourceDocument> {
        self.documents.remove(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.documents.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Parse PDF bytes and return the page count.
pub fn get_page_count(bytes: &[u8]) -> Result<usize> {
    Ok(SourceDocument::load(DocumentId(0), bytes)?.page_count())
}
