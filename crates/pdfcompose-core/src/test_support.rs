//! In-memory PDF fixtures shared by the unit tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

/// A letter-sized document whose page `n` shows the text `{label}-Page-{n}`.
pub fn create_test_pdf(num_pages: usize, label: &str) -> Vec<u8> {
    create_test_pdf_with(num_pages, label, |_, _| {}, |_| {})
}

/// Like [`create_test_pdf`], with hooks to edit each page and the page tree root.
pub fn create_test_pdf_with(
    num_pages: usize,
    label: &str,
    mut edit_page: impl FnMut(usize, &mut Dictionary),
    edit_pages: impl FnOnce(&mut Dictionary),
) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::with_capacity(num_pages);
    for i in 0..num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("{}-Page-{}", label, i + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            content.encode().unwrap_or_default(),
        ));

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
        };
        edit_page(i, &mut page);
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let mut pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => num_pages as i64,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
    };
    edit_pages(&mut pages);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Concatenated, decompressed content streams of a page (0-based).
pub fn page_content(doc: &Document, index: usize) -> String {
    let page_id = doc.get_pages().into_values().nth(index).unwrap();
    let content = doc.get_page_content(page_id).unwrap();
    String::from_utf8_lossy(&content).into_owned()
}

/// Integer `/Rotate` set directly on a page (0 when absent).
pub fn page_rotate(doc: &Document, index: usize) -> i64 {
    let page_id = doc.get_pages().into_values().nth(index).unwrap();
    doc.get_dictionary(page_id)
        .unwrap()
        .get(b"Rotate")
        .and_then(Object::as_i64)
        .unwrap_or(0)
}
