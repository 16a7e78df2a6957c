//! In-memory PDF fixtures for the overlay merge tests
//!
//! Base documents carry a line of text per page. Overlay documents carry blank
//! pages with widget annotations and an AcroForm listing the fields.

#![allow(dead_code)]

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

pub const LETTER: [i64; 4] = [0, 0, 612, 792];
pub const A4: [i64; 4] = [0, 0, 595, 842];

/// One field of an overlay document
pub enum FieldSpec {
    /// A text field whose single widget sits on `page` (0-based)
    Text { name: &'static str, page: usize, rect: [i64; 4] },
    /// A radio group with one widget per `(page, rect)` entry
    Radio { name: &'static str, widgets: Vec<(usize, [i64; 4])> },
}

fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

fn rect(values: [i64; 4]) -> Object {
    Object::Array(values.iter().map(|v| Object::Integer(*v)).collect())
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture should serialize");
    bytes
}

/// Set up the page tree skeleton: returns (doc, pages root id, page ids)
fn skeleton(page_count: usize) -> (Document, ObjectId, Vec<ObjectId>) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_ids: Vec<ObjectId> = (0..page_count).map(|_| doc.new_object_id()).collect();

    for &page_id in &page_ids {
        let mut page = Dictionary::new();
        page.set("Type", name("Page"));
        page.set("Parent", Object::Reference(pages_id));
        page.set("MediaBox", rect(LETTER));
        doc.objects.insert(page_id, Object::Dictionary(page));
    }

    let mut pages = Dictionary::new();
    pages.set("Type", name("Pages"));
    pages.set("Count", Object::Integer(page_count as i64));
    pages.set("Kids", Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", name("Catalog"));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    (doc, pages_id, page_ids)
}

fn page_mut(doc: &mut Document, page_id: ObjectId) -> &mut Dictionary {
    match doc.get_object_mut(page_id) {
        Ok(Object::Dictionary(dict)) => dict,
        _ => panic!("fixture page should be a dictionary"),
    }
}

fn push_annot(doc: &mut Document, page_id: ObjectId, annot_id: ObjectId) {
    let page = page_mut(doc, page_id);
    let mut annots = match page.get(b"Annots") {
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    annots.push(Object::Reference(annot_id));
    page.set("Annots", Object::Array(annots));
}

/// Text shown on base page `index` (0-based)
pub fn base_text(index: usize) -> String {
    format!("Base page {}", index + 1)
}

/// A base document with one line of Helvetica text per page
pub fn base_pdf(page_count: usize) -> Vec<u8> {
    save(base_document(page_count))
}

/// Like [`base_pdf`], plus a link annotation on the first page
pub fn base_pdf_with_link(page_count: usize) -> Vec<u8> {
    let mut doc = base_document(page_count);
    let first_page = doc.get_pages()[&1];

    let mut link = Dictionary::new();
    link.set("Type", name("Annot"));
    link.set("Subtype", name("Link"));
    link.set("Rect", rect([72, 72, 200, 90]));
    link.set("P", Object::Reference(first_page));
    let link_id = doc.add_object(link);
    push_annot(&mut doc, first_page, link_id);

    save(doc)
}

/// Like [`base_pdf`], plus a text field `base_field` and the base's own AcroForm
pub fn base_pdf_with_acroform(page_count: usize) -> Vec<u8> {
    let mut doc = base_document(page_count);
    let first_page = doc.get_pages()[&1];

    let mut widget = Dictionary::new();
    widget.set("Type", name("Annot"));
    widget.set("Subtype", name("Widget"));
    widget.set("FT", name("Tx"));
    widget.set("T", Object::string_literal("base_field"));
    widget.set("Rect", rect([72, 100, 300, 120]));
    widget.set("P", Object::Reference(first_page));
    let widget_id = doc.add_object(widget);
    push_annot(&mut doc, first_page, widget_id);

    let mut acroform = Dictionary::new();
    acroform.set("Fields", Object::Array(vec![Object::Reference(widget_id)]));
    let catalog_id = root_id(&doc);
    if let Ok(Object::Dictionary(catalog)) = doc.get_object_mut(catalog_id) {
        catalog.set("AcroForm", Object::Dictionary(acroform));
    }

    save(doc)
}

/// Like [`base_pdf`], with MediaBox and Resources inherited from an
/// intermediate Pages node instead of set on each page
pub fn base_pdf_nested(page_count: usize, media_box: [i64; 4]) -> Vec<u8> {
    let mut doc = base_document(page_count);
    let first_page = doc.get_pages()[&1];
    let resources = page_mut(&mut doc, first_page)
        .get(b"Resources")
        .cloned()
        .expect("base page resources");

    nest_page_tree(&mut doc, media_box, resources);
    save(doc)
}

fn root_id(doc: &Document) -> ObjectId {
    doc.trailer.get(b"Root").and_then(Object::as_reference).expect("fixture root")
}

/// Put an intermediate Pages node between the root and the pages, moving
/// MediaBox and Resources onto it
fn nest_page_tree(doc: &mut Document, media_box: [i64; 4], resources: Object) {
    let pages_id = doc
        .get_object(root_id(doc))
        .and_then(Object::as_dict)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .expect("fixture pages root");
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let middle_id = doc.new_object_id();

    for &page_id in &page_ids {
        let page = page_mut(doc, page_id);
        page.remove(b"MediaBox");
        page.remove(b"Resources");
        page.set("Parent", Object::Reference(middle_id));
    }

    let mut middle = Dictionary::new();
    middle.set("Type", name("Pages"));
    middle.set("Parent", Object::Reference(pages_id));
    middle.set("Kids", Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()));
    middle.set("Count", Object::Integer(page_ids.len() as i64));
    middle.set("MediaBox", rect(media_box));
    middle.set("Resources", resources);
    doc.objects.insert(middle_id, Object::Dictionary(middle));

    page_mut(doc, pages_id).set("Kids", Object::Array(vec![Object::Reference(middle_id)]));
}

fn base_document(page_count: usize) -> Document {
    let (mut doc, _, page_ids) = skeleton(page_count);

    let mut font = Dictionary::new();
    font.set("Type", name("Font"));
    font.set("Subtype", name("Type1"));
    font.set("BaseFont", name("Helvetica"));
    let font_id = doc.add_object(font);

    for (index, page_id) in page_ids.into_iter().enumerate() {
        let content = format!("BT /F1 18 Tf 72 720 Td ({}) Tj ET\n", base_text(index));
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut fonts = Dictionary::new();
        fonts.set("F1", Object::Reference(font_id));
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        let page = page_mut(&mut doc, page_id);
        page.set("Contents", Object::Reference(content_id));
        page.set("Resources", Object::Dictionary(resources));
    }

    doc
}

/// An overlay document with blank pages, the given fields, and an AcroForm
pub fn overlay_pdf(page_count: usize, fields: &[FieldSpec]) -> Vec<u8> {
    save(overlay_document(page_count, fields, true))
}

/// An overlay whose widgets exist but whose catalog has no AcroForm
pub fn overlay_pdf_without_acroform(page_count: usize, fields: &[FieldSpec]) -> Vec<u8> {
    save(overlay_document(page_count, fields, false))
}

/// An overlay whose first page also draws a rectangle
pub fn overlay_pdf_with_drawing(page_count: usize, fields: &[FieldSpec]) -> Vec<u8> {
    let mut doc = overlay_document(page_count, fields, true);
    let first_page = doc.get_pages()[&1];

    let drawing_id = doc.add_object(Stream::new(
        Dictionary::new(),
        b"0 0 1 RG 60 60 200 40 re S\n".to_vec(),
    ));
    page_mut(&mut doc, first_page).set("Contents", Object::Reference(drawing_id));

    save(doc)
}

/// An overlay whose pages all use `media_box`
pub fn overlay_pdf_with_media_box(page_count: usize, fields: &[FieldSpec], media_box: [i64; 4]) -> Vec<u8> {
    let mut doc = overlay_document(page_count, fields, true);
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for page_id in page_ids {
        page_mut(&mut doc, page_id).set("MediaBox", rect(media_box));
    }
    save(doc)
}

/// An overlay whose first page draws text with a font it inherits, together
/// with its MediaBox, from an intermediate Pages node
pub fn overlay_pdf_nested(page_count: usize, fields: &[FieldSpec], media_box: [i64; 4]) -> Vec<u8> {
    let mut doc = overlay_document(page_count, fields, true);
    let first_page = doc.get_pages()[&1];

    let mut font = Dictionary::new();
    font.set("Type", name("Font"));
    font.set("Subtype", name("Type1"));
    font.set("BaseFont", name("Courier"));
    let font_id = doc.add_object(font);

    let drawing_id = doc.add_object(Stream::new(
        Dictionary::new(),
        b"BT /F1 10 Tf 72 72 Td (Overlay) Tj ET\n".to_vec(),
    ));
    page_mut(&mut doc, first_page).set("Contents", Object::Reference(drawing_id));

    let mut fonts = Dictionary::new();
    fonts.set("F1", Object::Reference(font_id));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));

    nest_page_tree(&mut doc, media_box, Object::Dictionary(resources));
    save(doc)
}

/// An overlay with annotations that point at overlay pages: a link on the
/// first page whose `/Dest` names the last page, and an inline note on the
/// first page whose GoTo action also names the last page
pub fn overlay_pdf_with_links(page_count: usize, fields: &[FieldSpec]) -> Vec<u8> {
    let mut doc = overlay_document(page_count, fields, true);
    let pages = doc.get_pages();
    let first_page = pages[&1];
    let last_page = pages[&(page_count as u32)];

    let mut link = Dictionary::new();
    link.set("Type", name("Annot"));
    link.set("Subtype", name("Link"));
    link.set("Rect", rect([72, 40, 200, 60]));
    link.set("P", Object::Reference(first_page));
    link.set("Dest", Object::Array(vec![Object::Reference(last_page), name("Fit")]));
    let link_id = doc.add_object(link);
    push_annot(&mut doc, first_page, link_id);

    let mut action = Dictionary::new();
    action.set("S", name("GoTo"));
    action.set("D", Object::Array(vec![Object::Reference(last_page), name("Fit")]));

    let mut note = Dictionary::new();
    note.set("Type", name("Annot"));
    note.set("Subtype", name("Link"));
    note.set("Rect", rect([220, 40, 300, 60]));
    note.set("P", Object::Reference(first_page));
    note.set("A", Object::Dictionary(action));

    let page = page_mut(&mut doc, first_page);
    let mut annots = match page.get(b"Annots") {
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    annots.push(Object::Dictionary(note));
    page.set("Annots", Object::Array(annots));

    save(doc)
}

fn overlay_document(page_count: usize, fields: &[FieldSpec], with_acroform: bool) -> Document {
    let (mut doc, _, page_ids) = skeleton(page_count);
    let mut field_refs = Vec::new();

    for field in fields {
        match field {
            FieldSpec::Text { name: field_name, page, rect: bounds } => {
                let page_id = page_ids[*page];
                let mut widget = Dictionary::new();
                widget.set("Type", name("Annot"));
                widget.set("Subtype", name("Widget"));
                widget.set("FT", name("Tx"));
                widget.set("T", Object::string_literal(*field_name));
                widget.set("Rect", rect(*bounds));
                widget.set("P", Object::Reference(page_id));
                widget.set("F", Object::Integer(4));
                let widget_id = doc.add_object(widget);

                push_annot(&mut doc, page_id, widget_id);
                field_refs.push(Object::Reference(widget_id));
            }
            FieldSpec::Radio { name: field_name, widgets } => {
                let group_id = doc.new_object_id();
                let mut kids = Vec::new();

                for (index, (page, bounds)) in widgets.iter().enumerate() {
                    let page_id = page_ids[*page];

                    let mut states = Dictionary::new();
                    states.set(format!("option{}", index), Object::Null);
                    states.set("Off", Object::Null);
                    let mut appearance = Dictionary::new();
                    appearance.set("N", Object::Dictionary(states));

                    let mut widget = Dictionary::new();
                    widget.set("Type", name("Annot"));
                    widget.set("Subtype", name("Widget"));
                    widget.set("Parent", Object::Reference(group_id));
                    widget.set("Rect", rect(*bounds));
                    widget.set("P", Object::Reference(page_id));
                    widget.set("AS", name("Off"));
                    widget.set("AP", Object::Dictionary(appearance));
                    let widget_id = doc.add_object(widget);

                    push_annot(&mut doc, page_id, widget_id);
                    kids.push(Object::Reference(widget_id));
                }

                let mut group = Dictionary::new();
                group.set("FT", name("Btn"));
                group.set("Ff", Object::Integer(49152));
                group.set("T", Object::string_literal(*field_name));
                group.set("V", name("Off"));
                group.set("Kids", Object::Array(kids));
                doc.objects.insert(group_id, Object::Dictionary(group));

                field_refs.push(Object::Reference(group_id));
            }
        }
    }

    if with_acroform {
        let mut acroform = Dictionary::new();
        acroform.set("Fields", Object::Array(field_refs));
        acroform.set("DA", Object::string_literal("/Helv 0 Tf 0 g"));
        let acroform_id = doc.add_object(acroform);

        let catalog_id = doc.trailer.get(b"Root").and_then(Object::as_reference).expect("fixture root");
        if let Ok(Object::Dictionary(catalog)) = doc.get_object_mut(catalog_id) {
            catalog.set("AcroForm", Object::Reference(acroform_id));
        }
    }

    doc
}

/// Load merged bytes back into a document
pub fn load(bytes: &[u8]) -> Document {
    Document::load_mem(bytes).expect("merged output should parse")
}

/// Object ids listed in a page's `/Annots`
pub fn annotation_ids(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let page = doc.get_object(page_id).and_then(Object::as_dict).expect("page dictionary");
    match page.get(b"Annots") {
        Ok(Object::Array(items)) => items.iter().filter_map(|item| item.as_reference().ok()).collect(),
        _ => Vec::new(),
    }
}

/// Number of `/Type /Page` objects in the file, reachable or not
pub fn page_object_count(doc: &Document) -> usize {
    doc.objects
        .values()
        .filter(|object| matches!(
            object.as_dict().and_then(|d| d.get(b"Type")).and_then(Object::as_name),
            Ok(b"Page")
        ))
        .count()
}

/// Resolve a dictionary entry that may be stored inline or by reference
pub fn resolved_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> &'a Dictionary {
    match dict.get(key).expect("dictionary entry") {
        Object::Reference(id) => doc.get_object(*id).and_then(Object::as_dict).expect("referenced dictionary"),
        object => object.as_dict().expect("inline dictionary"),
    }
}

/// Count objects in the document whose `/T` equals `field_name`
pub fn objects_named(doc: &Document, field_name: &str) -> usize {
    doc.objects
        .values()
        .filter(|object| match object {
            Object::Dictionary(dict) => dict
                .get(b"T")
                .and_then(Object::as_str)
                .map(|t| t == field_name.as_bytes())
                .unwrap_or(false),
            _ => false,
        })
        .count()
}
