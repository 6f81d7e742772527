//! Document assembly
//!
//! Turns a [`PagePlan`] into output bytes. Assembly runs in two phases:
//! every entry is validated and every overlay decoded and placed before the
//! first object is written, so a failing plan never produces partial output.

use crate::error::{ComposeError, Result};
use crate::plan::{DocumentId, PagePlan};
use crate::rotation::{accumulate, Rotation};
use crate::source::{PageGeometry, SourceDocument, SourceSet};
use crate::stamp::{stamp_page, PreparedOverlay};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 3] = [b"Resources", b"CropBox", b"MediaBox"];

/// Shared flag for abandoning an assembly between pages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear a cancellation so the token can guard the next run.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ComposeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// One plan entry after validation.
struct PreparedPage<'a> {
    source: &'a SourceDocument,
    index: usize,
    page_id: ObjectId,
    geometry: PageGeometry,
    rotation: Rotation,
    overlays: Vec<PreparedOverlay>,
}

/// Builds output documents from pages of a [`SourceSet`].
pub struct Assembler<'a> {
    sources: &'a SourceSet,
    cancel: CancelToken,
    compress: bool,
}

impl<'a> Assembler<'a> {
    pub fn new(sources: &'a SourceSet) -> Self {
        Self {
            sources,
            cancel: CancelToken::new(),
            compress: true,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Leave new content streams uncompressed (useful when inspecting output).
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn assemble(&self, plan: &PagePlan) -> Result<Vec<u8>> {
        self.assemble_with_progress(plan, |_, _| {})
    }

    /// Assemble `plan`, calling `on_page(done, total)` after each page.
    pub fn assemble_with_progress<F>(&self, plan: &PagePlan, mut on_page: F) -> Result<Vec<u8>>
    where
        F: FnMut(usize, usize),
    {
        let pages = self.prepare(plan)?;
        let total = pages.len();

        let mut out = Document::with_version("1.7");
        let pages_id = out.new_object_id();
        let page_ids: Vec<ObjectId> = pages.iter().map(|_| out.new_object_id()).collect();

        // Links to a source page land on its first copy
        let mut links: HashMap<(DocumentId, ObjectId), ObjectId> = HashMap::new();
        for (page, &page_id) in pages.iter().zip(&page_ids) {
            links.entry((page.source.id(), page.page_id)).or_insert(page_id);
        }

        let mut caches: HashMap<DocumentId, HashMap<ObjectId, ObjectId>> = HashMap::new();
        let mut kids = Vec::with_capacity(total);

        for (position, (page, &page_id)) in pages.iter().zip(&page_ids).enumerate() {
            self.cancel.check()?;

            let cache = caches.entry(page.source.id()).or_default();
            copy_page(&mut out, page, page_id, pages_id, cache, &links)?;
            let origin = (page.geometry.crop_box[0], page.geometry.crop_box[1]);
            stamp_page(&mut out, page_id, &page.overlays, origin)?;
            kids.push(Object::Reference(page_id));

            tracing::debug!(
                position = position + 1,
                document = page.source.id().0,
                source_page = page.index + 1,
                rotation = page.rotation.degrees(),
                overlays = page.overlays.len(),
                "copied page"
            );
            on_page(position + 1, total);
        }
        self.cancel.check()?;

        let mut pages_dict = Dictionary::new();
        pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
        pages_dict.set("Kids", Object::Array(kids));
        pages_dict.set("Count", Object::Integer(total as i64));
        out.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = out.add_object(catalog);
        out.trailer.set("Root", Object::Reference(catalog_id));

        if self.compress {
            out.compress();
        }

        let mut bytes = Vec::new();
        out.save_to(&mut bytes)
            .map_err(|e| ComposeError::Serialization(e.to_string()))?;

        tracing::info!(
            pages = total,
            sources = caches.len(),
            bytes = bytes.len(),
            "assembled document"
        );
        Ok(bytes)
    }

    /// Validate every entry and prepare its overlays. Writes nothing.
    fn prepare(&self, plan: &PagePlan) -> Result<Vec<PreparedPage<'a>>> {
        if plan.is_empty() {
            return Err(ComposeError::EmptySelection);
        }

        plan.entries()
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                let source = self.sources.get(entry.source.document)?;
                let page_id = source.page_id(entry.source.index)?;
                let geometry = source.page_geometry(entry.source.index)?;
                let rotation = accumulate(geometry.rotation.degrees(), entry.rotation_delta)?;
                let overlays = entry
                    .overlays
                    .iter()
                    .map(|spec| PreparedOverlay::prepare(spec, &geometry, rotation, position + 1))
                    .collect::<Result<Vec<_>>>()?;

                Ok(PreparedPage {
                    source,
                    index: entry.source.index,
                    page_id,
                    geometry,
                    rotation,
                    overlays,
                })
            })
            .collect()
    }
}

/// Assemble `plan` from `sources` with default settings.
pub fn assemble(sources: &SourceSet, plan: &PagePlan) -> Result<Vec<u8>> {
    Assembler::new(sources).assemble(plan)
}

/// Copy one source page into `out` as the object `new_id`.
fn copy_page(
    out: &mut Document,
    page: &PreparedPage<'_>,
    new_id: ObjectId,
    parent: ObjectId,
    cache: &mut HashMap<ObjectId, ObjectId>,
    links: &HashMap<(DocumentId, ObjectId), ObjectId>,
) -> Result<()> {
    let source_dict = page.source.page_dict(page.index)?;

    let mut copier = PageCopier {
        source: page.source.document(),
        document: page.source.id(),
        out,
        cache,
        links,
        page: (page.page_id, new_id),
        annots: annotation_ids(page.source.document(), source_dict),
        local: HashMap::new(),
    };

    let mut dict = Dictionary::new();
    for (key, value) in source_dict.iter() {
        if key.as_slice() == b"Parent" {
            continue;
        }
        dict.set(key.clone(), copier.copy_object(value));
    }

    for key in INHERITABLE {
        if !dict.has(key) {
            if let Some(value) = page.source.inherited(page.index, key)? {
                dict.set(key.to_vec(), copier.copy_object(value));
            }
        }
    }
    if !dict.has(b"MediaBox") {
        let media_box = page.geometry.media_box;
        dict.set(
            "MediaBox",
            Object::Array(media_box.iter().map(|&v| Object::Real(v as f32)).collect()),
        );
    }

    dict.set("Parent", Object::Reference(parent));
    dict.set("Rotate", Object::Integer(page.rotation.degrees()));

    out.objects.insert(new_id, Object::Dictionary(dict));
    Ok(())
}

/// Indirect objects making up a page's `/Annots`: the array and its entries.
fn annotation_ids(doc: &Document, page: &Dictionary) -> HashSet<ObjectId> {
    let mut ids = HashSet::new();
    let items = match page.get(b"Annots") {
        Ok(Object::Array(items)) => items,
        Ok(Object::Reference(id)) => {
            ids.insert(*id);
            match doc.get_object(*id) {
                Ok(Object::Array(items)) => items,
                _ => return ids,
            }
        }
        _ => return ids,
    };
    ids.extend(items.iter().filter_map(|item| item.as_reference().ok()));
    ids
}

/// Deep copy of objects reachable from one page.
///
/// `cache` maps source ids to output ids for the whole source document, so
/// resources shared between pages are written once. Annotations are the
/// exception: each copy of a page gets its own, tracked in `local`, since an
/// annotation's `/P` names a single page.
///
/// References to other pages follow `links` to the page's first copy in the
/// output. Pages left out of the output, and intermediate page tree nodes,
/// become `null` rather than dragging their subtree along.
struct PageCopier<'s, 'o> {
    source: &'s Document,
    document: DocumentId,
    out: &'o mut Document,
    cache: &'o mut HashMap<ObjectId, ObjectId>,
    links: &'o HashMap<(DocumentId, ObjectId), ObjectId>,
    page: (ObjectId, ObjectId),
    annots: HashSet<ObjectId>,
    local: HashMap<ObjectId, ObjectId>,
}

impl PageCopier<'_, '_> {
    fn copy_object(&mut self, obj: &Object) -> Object {
        match obj {
            Object::Reference(id) => self.copy_reference(*id),
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dict(dict)),
            Object::Array(items) => {
                Object::Array(items.iter().map(|item| self.copy_object(item)).collect())
            }
            Object::Stream(stream) => {
                let mut copy = stream.clone();
                copy.dict = self.copy_dict(&stream.dict);
                Object::Stream(copy)
            }
            other => other.clone(),
        }
    }

    fn copy_dict(&mut self, dict: &Dictionary) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            copy.set(key.clone(), self.copy_object(value));
        }
        copy
    }

    fn copy_reference(&mut self, id: ObjectId) -> Object {
        if id == self.page.0 {
            return Object::Reference(self.page.1);
        }
        let per_page = self.annots.contains(&id);
        let known = if per_page {
            self.local.get(&id)
        } else {
            self.cache.get(&id)
        };
        if let Some(&new_id) = known {
            return Object::Reference(new_id);
        }

        let source = self.source;
        let Ok(obj) = source.get_object(id) else {
            tracing::warn!(object = ?id, "dropping dangling reference");
            return Object::Null;
        };
        match page_tree_kind(obj) {
            Some(b"Page") => {
                return match self.links.get(&(self.document, id)) {
                    Some(&new_id) => Object::Reference(new_id),
                    None => Object::Null,
                }
            }
            Some(_) => return Object::Null,
            None => {}
        }

        // Reserve the id first so reference cycles terminate
        let new_id = self.out.new_object_id();
        if per_page {
            self.local.insert(id, new_id);
        } else {
            self.cache.insert(id, new_id);
        }
        let copy = self.copy_object(obj);
        self.out.objects.insert(new_id, copy);
        Object::Reference(new_id)
    }
}

/// `Page` or `Pages` for page tree nodes.
fn page_tree_kind(obj: &Object) -> Option<&[u8]> {
    let kind = obj.as_dict().ok()?.get(b"Type").and_then(Object::as_name).ok()?;
    matches!(kind, b"Page" | b"Pages").then_some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::encode_test_png;
    use crate::overlay::{Anchor, OverlayContent, OverlaySpec, TextStyle};
    use crate::plan::{PageRef, PageTargets, PlanEntry};
    use crate::test_support::{create_test_pdf, create_test_pdf_with, page_content, page_rotate};
    use lopdf::dictionary;
    use pretty_assertions::assert_eq;

    const A: DocumentId = DocumentId(0);
    const B: DocumentId = DocumentId(1);

    fn sources(docs: &[Vec<u8>]) -> SourceSet {
        SourceSet::from_bytes(docs).unwrap()
    }

    fn load(bytes: &[u8]) -> Document {
        Document::load_mem(bytes).unwrap()
    }

    fn label(text: &str) -> OverlaySpec {
        OverlaySpec::at_anchor(
            OverlayContent::Text {
                text: text.into(),
                style: TextStyle::default(),
            },
            Anchor::BottomCenter,
        )
    }

    #[test]
    fn test_merge_preserves_order_and_count() {
        let set = sources(&[create_test_pdf(3, "A"), create_test_pdf(2, "B")]);
        let plan = PagePlan::merge(&[(A, 3), (B, 2)]);
        let out = load(&assemble(&set, &plan).unwrap());

        assert_eq!(out.get_pages().len(), 5);
        let expected = ["A-Page-1", "A-Page-2", "A-Page-3", "B-Page-1", "B-Page-2"];
        for (i, text) in expected.iter().enumerate() {
            assert!(page_content(&out, i).contains(text), "page {} should show {}", i + 1, text);
        }
    }

    #[test]
    fn test_identity_plan_is_a_no_op() {
        let set = sources(&[create_test_pdf(3, "A")]);
        let out = load(&assemble(&set, &PagePlan::identity(A, 3)).unwrap());

        let source = set.get(A).unwrap();
        for i in 0..3 {
            assert_eq!(page_content(&out, i), page_content(source.document(), i));
            assert_eq!(page_rotate(&out, i), 0);
        }
    }

    #[test]
    fn test_reorder_and_repeat_pages() {
        let set = sources(&[create_test_pdf(3, "A")]);
        let plan = PagePlan::new(vec![
            PlanEntry::copy_of(PageRef::new(A, 2)),
            PlanEntry::copy_of(PageRef::new(A, 0)),
            PlanEntry::copy_of(PageRef::new(A, 2)),
        ]);
        let out = load(&assemble(&set, &plan).unwrap());

        let pages: Vec<ObjectId> = out.get_pages().into_values().collect();
        assert_eq!(pages.len(), 3);
        assert_ne!(pages[0], pages[2]);
        assert!(page_content(&out, 0).contains("A-Page-3"));
        assert!(page_content(&out, 1).contains("A-Page-1"));
        assert!(page_content(&out, 2).contains("A-Page-3"));
    }

    #[test]
    fn test_rotation_adds_to_source_rotation() {
        let pdf = create_test_pdf_with(2, "A", |i, page| {
            if i == 1 {
                page.set("Rotate", 90);
            }
        }, |_| {});
        let set = sources(&[pdf]);
        let plan = PagePlan::identity(A, 2).rotate_all(270).unwrap();
        let out = load(&assemble(&set, &plan).unwrap());
        assert_eq!(page_rotate(&out, 0), 270);
        assert_eq!(page_rotate(&out, 1), 0);
    }

    #[test]
    fn test_inherited_attributes_are_materialised() {
        let pdf = create_test_pdf_with(1, "A", |_, page| {
            page.remove(b"MediaBox");
        }, |pages| {
            pages.set(
                "MediaBox",
                vec![Object::Integer(0), Object::Integer(0), Object::Integer(300), Object::Integer(400)],
            );
            pages.set("Rotate", 180);
        });
        let set = sources(&[pdf]);
        let out = load(&assemble(&set, &PagePlan::identity(A, 1)).unwrap());

        let page_id = out.get_pages().into_values().next().unwrap();
        let page = out.get_dictionary(page_id).unwrap();
        assert!(page.get(b"Resources").is_ok());
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[2].as_i64().unwrap(), 300);
        assert_eq!(page_rotate(&out, 0), 180);
    }

    #[test]
    fn test_shared_resources_copied_once() {
        let set = sources(&[create_test_pdf(4, "A")]);
        let out = load(&assemble(&set, &PagePlan::identity(A, 4)).unwrap());

        let fonts = out
            .objects
            .values()
            .filter(|obj| {
                obj.as_dict()
                    .ok()
                    .and_then(|d| d.get(b"Type").ok())
                    .and_then(|t| t.as_name().ok())
                    == Some(b"Font".as_slice())
            })
            .count();
        assert_eq!(fonts, 1);
    }

    #[test]
    fn test_annotation_back_links_point_at_the_copy() {
        let mut doc = Document::load_mem(&create_test_pdf(2, "A")).unwrap();
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let annot = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Text",
            "P" => pages[0],
            "Dest" => vec![Object::Reference(pages[1]), Object::Name(b"Fit".to_vec())],
        });
        doc.get_object_mut(pages[0])
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("Annots", vec![Object::Reference(annot)]);

        let mut set = SourceSet::new();
        set.insert(SourceDocument::from_document(A, doc).unwrap());
        let out = load(&assemble(&set, &PagePlan::select(A, &[0])).unwrap());

        assert_eq!(out.get_pages().len(), 1);
        let page_id = out.get_pages().into_values().next().unwrap();
        let page = out.get_dictionary(page_id).unwrap();
        let annot_id = page.get(b"Annots").unwrap().as_array().unwrap()[0]
            .as_reference()
            .unwrap();
        let annot = out.get_dictionary(annot_id).unwrap();
        assert_eq!(annot.get(b"P").unwrap().as_reference().unwrap(), page_id);
        let dest = annot.get(b"Dest").unwrap().as_array().unwrap();
        assert_eq!(dest[0], Object::Null);
    }

    /// Two pages; the first carries a Link annotation pointing at the second.
    fn linked_source(indirect_annots: bool) -> SourceSet {
        let mut doc = Document::load_mem(&create_test_pdf(2, "A")).unwrap();
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let link = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "P" => pages[0],
            "Dest" => vec![Object::Reference(pages[1]), Object::Name(b"Fit".to_vec())],
        });
        let mut annots = Object::Array(vec![Object::Reference(link)]);
        if indirect_annots {
            annots = Object::Reference(doc.add_object(annots));
        }
        doc.get_object_mut(pages[0])
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("Annots", annots);

        let mut set = SourceSet::new();
        set.insert(SourceDocument::from_document(A, doc).unwrap());
        set
    }

    fn first_annotation(doc: &Document, page_id: ObjectId) -> (ObjectId, &Dictionary) {
        let page = doc.get_dictionary(page_id).unwrap();
        let annots = match page.get(b"Annots").unwrap() {
            Object::Reference(id) => doc.get_object(*id).unwrap(),
            inline => inline,
        };
        let id = annots.as_array().unwrap()[0].as_reference().unwrap();
        (id, doc.get_dictionary(id).unwrap())
    }

    #[test]
    fn test_links_follow_pages_into_the_output() {
        let set = linked_source(false);

        let out = load(&assemble(&set, &PagePlan::identity(A, 2)).unwrap());
        let pages: Vec<ObjectId> = out.get_pages().into_values().collect();
        let (_, link) = first_annotation(&out, pages[0]);
        assert_eq!(link.get(b"Dest").unwrap().as_array().unwrap()[0], Object::Reference(pages[1]));

        // Reversed, the link still lands on the same source page
        let out = load(&assemble(&set, &PagePlan::select(A, &[1, 0])).unwrap());
        let pages: Vec<ObjectId> = out.get_pages().into_values().collect();
        let (_, link) = first_annotation(&out, pages[1]);
        assert_eq!(link.get(b"Dest").unwrap().as_array().unwrap()[0], Object::Reference(pages[0]));
        assert_eq!(link.get(b"P").unwrap(), &Object::Reference(pages[1]));
    }

    #[test]
    fn test_repeated_page_gets_its_own_annotations() {
        let set = linked_source(true);
        let out = load(&assemble(&set, &PagePlan::select(A, &[0, 0])).unwrap());
        let pages: Vec<ObjectId> = out.get_pages().into_values().collect();

        let (first_id, first) = first_annotation(&out, pages[0]);
        let (second_id, second) = first_annotation(&out, pages[1]);
        assert_ne!(first_id, second_id);
        assert_eq!(first.get(b"P").unwrap(), &Object::Reference(pages[0]));
        assert_eq!(second.get(b"P").unwrap(), &Object::Reference(pages[1]));

        let annots = |page: ObjectId| out.get_dictionary(page).unwrap().get(b"Annots").unwrap().clone();
        assert_ne!(annots(pages[0]), annots(pages[1]));

        // The second source page is not in the output
        assert_eq!(first.get(b"Dest").unwrap().as_array().unwrap()[0], Object::Null);
    }

    fn image_overlay(width: f64, height: f64, anchor: Anchor) -> OverlaySpec {
        OverlaySpec::at_anchor(
            OverlayContent::Image {
                data: encode_test_png(2, 2, [0, 0, 0, 255]),
                width,
                height,
            },
            anchor,
        )
    }

    fn stamped_content(pdf: Vec<u8>, overlay: OverlaySpec) -> String {
        let set = sources(&[pdf]);
        let plan = PagePlan::identity(A, 1).stamp(overlay, &PageTargets::All).unwrap();
        let bytes = Assembler::new(&set)
            .with_compression(false)
            .assemble(&plan)
            .unwrap();
        page_content(&load(&bytes), 0)
    }

    #[test]
    fn test_overlay_is_placed_in_the_crop_box() {
        let pdf = create_test_pdf_with(1, "A", |_, page| {
            page.set(
                "CropBox",
                vec![Object::Integer(100), Object::Integer(100), Object::Integer(512), Object::Integer(692)],
            );
        }, |_| {});
        let content = stamped_content(pdf, image_overlay(50.0, 20.0, Anchor::BottomRight));
        assert!(content.contains("1 0 0 1 462 100 cm"), "{}", content);
    }

    #[test]
    fn test_overlay_on_rotated_page_reads_upright() {
        let pdf = create_test_pdf_with(1, "A", |_, page| {
            page.set("Rotate", 90);
        }, |_| {});
        let content = stamped_content(pdf, image_overlay(100.0, 50.0, Anchor::TopLeft));
        assert!(content.contains("0 1 -1 0 50 0 cm"), "{}", content);
    }

    #[test]
    fn test_overlays_are_drawn_after_content() {
        let set = sources(&[create_test_pdf(3, "A")]);
        let plan = PagePlan::identity(A, 3)
            .stamp(label("CONFIDENTIAL"), &PageTargets::ExcludeFirst)
            .unwrap();
        let bytes = Assembler::new(&set)
            .with_compression(false)
            .assemble(&plan)
            .unwrap();
        let out = load(&bytes);

        assert!(!page_content(&out, 0).contains("Do"));
        let stamped = page_content(&out, 1);
        let original = stamped.find("A-Page-2").unwrap();
        let overlay = stamped.find("/PcOv0 Do").unwrap();
        assert!(original < overlay);
    }

    #[test]
    fn test_unsupported_image_names_output_page() {
        let set = sources(&[create_test_pdf(3, "A")]);
        let gif = OverlaySpec::new(
            OverlayContent::Image {
                data: b"GIF89a....".to_vec(),
                width: 10.0,
                height: 10.0,
            },
            0.0,
            0.0,
        );
        let plan = PagePlan::identity(A, 3)
            .stamp(gif, &PageTargets::Only(vec![2]))
            .unwrap();

        let err = assemble(&set, &plan).unwrap_err();
        assert_eq!(
            err,
            ComposeError::UnsupportedOverlayFormat {
                page: 3,
                format: "GIF".into()
            }
        );
    }

    #[test]
    fn test_image_overlay_is_embedded() {
        let set = sources(&[create_test_pdf(1, "A")]);
        let png = OverlaySpec::at_anchor(
            OverlayContent::Image {
                data: encode_test_png(4, 4, [0, 0, 255, 128]),
                width: 100.0,
                height: 50.0,
            },
            Anchor::BottomRight,
        );
        let plan = PagePlan::identity(A, 1).stamp(png, &PageTargets::All).unwrap();
        let out = load(&assemble(&set, &plan).unwrap());

        let images = out
            .objects
            .values()
            .filter_map(|obj| obj.as_stream().ok())
            .filter(|s| s.dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Image".as_slice()))
            .count();
        // Colour image plus its soft mask
        assert_eq!(images, 2);
    }

    #[test]
    fn test_bad_index_fails_before_output() {
        let set = sources(&[create_test_pdf(2, "A")]);
        let plan = PagePlan::select(A, &[0, 5]);
        assert_eq!(
            assemble(&set, &plan).unwrap_err(),
            ComposeError::PageIndex {
                document: A,
                index: 5,
                page_count: 2
            }
        );
    }

    #[test]
    fn test_unknown_document_is_a_load_error() {
        let set = sources(&[create_test_pdf(2, "A")]);
        let err = assemble(&set, &PagePlan::identity(B, 1)).unwrap_err();
        assert!(matches!(err, ComposeError::SourceLoad { document: B, .. }));
    }

    #[test]
    fn test_empty_plan() {
        let set = sources(&[create_test_pdf(1, "A")]);
        assert_eq!(
            assemble(&set, &PagePlan::default()).unwrap_err(),
            ComposeError::EmptySelection
        );
    }

    #[test]
    fn test_cancel_before_first_page() {
        let set = sources(&[create_test_pdf(2, "A")]);
        let token = CancelToken::new();
        token.cancel();
        let err = Assembler::new(&set)
            .with_cancel(token)
            .assemble(&PagePlan::identity(A, 2))
            .unwrap_err();
        assert_eq!(err, ComposeError::Cancelled);
    }

    #[test]
    fn test_cancel_mid_assembly() {
        let set = sources(&[create_test_pdf(4, "A")]);
        let token = CancelToken::new();
        let remote = token.clone();
        let mut seen = Vec::new();
        let err = Assembler::new(&set)
            .with_cancel(token)
            .assemble_with_progress(&PagePlan::identity(A, 4), |done, total| {
                seen.push((done, total));
                if done == 2 {
                    remote.cancel();
                }
            })
            .unwrap_err();
        assert_eq!(err, ComposeError::Cancelled);
        assert_eq!(seen, vec![(1, 4), (2, 4)]);
    }

    #[test]
    fn test_sources_are_not_mutated() {
        let bytes = create_test_pdf(2, "A");
        let set = sources(&[bytes]);
        let before = set.get(A).unwrap().document().objects.len();
        let plan = PagePlan::identity(A, 2)
            .rotate_all(90)
            .unwrap()
            .stamp(label("x"), &PageTargets::All)
            .unwrap();
        assemble(&set, &plan).unwrap();
        assemble(&set, &plan).unwrap();
        assert_eq!(set.get(A).unwrap().document().objects.len(), before);
        assert_eq!(page_rotate(set.get(A).unwrap().document(), 0), 0);
    }
}
