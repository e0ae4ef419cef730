//! Minimal PDFs built in memory for tests.

use crate::{PageSize, PdfEngineError};
use lopdf::{dictionary, Document, Object};

pub const LETTER: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

/// A document of `page_count` empty letter-sized pages.
pub fn blank_pdf(page_count: u32) -> Result<Vec<u8>, PdfEngineError> {
    let sizes = vec![LETTER; page_count as usize];
    sized_pdf(&sizes)
}

/// A document with one empty page per entry of `sizes`.
pub fn sized_pdf(sizes: &[PageSize]) -> Result<Vec<u8>, PdfEngineError> {
    to_bytes(&mut document(sizes))
}

/// Unsaved document, for tests that add objects before serializing.
pub fn document(sizes: &[PageSize]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(sizes.len());
    for size in sizes {
        let media_box: Vec<Object> = vec![
            0_i64.into(),
            0_i64.into(),
            (size.width_pt.round() as i64).into(),
            (size.height_pt.round() as i64).into(),
        ];
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box,
        });
        kids.push(Object::from(page_id));
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => sizes.len() as i64,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

pub fn to_bytes(doc: &mut Document) -> Result<Vec<u8>, PdfEngineError> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(|err| PdfEngineError::Backend(err.to_string()))?;
    Ok(bytes)
}
