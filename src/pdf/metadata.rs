//! PDF metadata and form-field inspection

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use lopdf::{Dictionary, Document, Object, ObjectId};
use crate::error::{Error, Result};
use super::acroform;
use super::page;

/// Guard against malformed, cyclic field trees
const MAX_FIELD_DEPTH: usize = 32;

/// Count pages by reading the Count field from the Pages dictionary
/// This is more reliable than get_pages() which doesn't handle nested page trees
fn count_pages_from_catalog(doc: &Document) -> Result<usize> {
    let catalog_id = acroform::catalog_id(doc)?;

    let catalog_dict = match doc.get_object(catalog_id)? {
        Object::Dictionary(dict) => dict,
        _ => return Err(Error::MissingStructure("Catalog is not a dictionary".to_string())),
    };

    let pages_id = match catalog_dict.get(b"Pages") {
        Ok(Object::Reference(id)) => *id,
        Ok(_) => return Err(Error::MissingStructure("Pages is not a reference".to_string())),
        Err(_) => return Err(Error::MissingStructure("No Pages in catalog".to_string())),
    };

    let pages_dict = match doc.get_object(pages_id)? {
        Object::Dictionary(dict) => dict,
        _ => return Err(Error::MissingStructure("Pages is not a dictionary".to_string())),
    };

    match pages_dict.get(b"Count") {
        Ok(Object::Integer(n)) => Ok(*n as usize),
        Ok(_) => Err(Error::MissingStructure("Count is not an integer".to_string())),
        Err(_) => Err(Error::MissingStructure("No Count in Pages".to_string())),
    }
}

/// A terminal form field and where its widgets live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFieldInfo {
    /// Fully qualified field name (`parent.child`)
    pub name: String,
    /// Field type (`Tx`, `Btn`, `Ch`, `Sig`), inherited from ancestors if needed
    pub field_type: Option<String>,
    /// Number of widget annotations belonging to the field
    pub widget_count: usize,
    /// 1-based page number of each widget, in widget order (0 if unplaced)
    pub pages: Vec<u32>,
}

/// PDF metadata
#[derive(Debug, Clone)]
pub struct PdfMetadata {
    /// Number of pages in the PDF
    pub page_count: usize,
    /// Document title (if present)
    pub title: Option<String>,
    /// Document author (if present)
    pub author: Option<String>,
    /// Whether the catalog declares an AcroForm
    pub has_acroform: bool,
    /// Terminal form fields, in field-tree order
    pub fields: Vec<FormFieldInfo>,
}

impl PdfMetadata {
    /// Look up a field by its fully qualified name
    pub fn field(&self, name: &str) -> Option<&FormFieldInfo> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Extract metadata from a PDF file
pub fn extract_metadata(path: &Path) -> Result<PdfMetadata> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let doc = Document::load(path)?;
    metadata_from_document(&doc, &path.display().to_string())
}

/// Extract metadata from PDF bytes
pub fn inspect_pdf(bytes: &[u8]) -> Result<PdfMetadata> {
    let doc = Document::load_mem(bytes)?;
    metadata_from_document(&doc, "in-memory document")
}

fn metadata_from_document(doc: &Document, label: &str) -> Result<PdfMetadata> {
    // Use catalog-based counting for accuracy
    let page_count = count_pages_from_catalog(doc)?;

    if page_count == 0 {
        return Err(Error::EmptyPdf(label.to_string()));
    }

    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(info_id)) => doc.get_object(*info_id).ok().and_then(|o| o.as_dict().ok()),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };

    Ok(PdfMetadata {
        page_count,
        title: info.and_then(|dict| text_entry(dict, b"Title")),
        author: info.and_then(|dict| text_entry(dict, b"Author")),
        has_acroform: acroform::acroform_dict(doc).is_some(),
        fields: form_fields(doc),
    })
}

/// Count the number of pages in a PDF file
///
/// This is a quick operation that reads the Count field from the Pages dictionary.
pub fn count_pages(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let doc = Document::load(path)?;
    let page_count = count_pages_from_catalog(&doc)?;

    if page_count == 0 {
        return Err(Error::EmptyPdf(path.display().to_string()));
    }

    Ok(page_count)
}

/// Walk the AcroForm field tree and describe each terminal field
///
/// A radio group shows up as one field whose `widget_count` is the number of
/// buttons, however many pages they are spread across.
pub fn form_fields(doc: &Document) -> Vec<FormFieldInfo> {
    let placements = widget_placements(doc);
    let mut visited = BTreeSet::new();
    let mut fields = Vec::new();

    for root in acroform::root_field_ids(doc) {
        collect_fields(doc, root, None, None, &placements, &mut visited, &mut fields, 0);
    }

    fields
}

/// Map each annotation reference to the 1-based page whose `/Annots` lists it
fn widget_placements(doc: &Document) -> BTreeMap<ObjectId, u32> {
    let mut placements = BTreeMap::new();

    for (page_number, page_id) in doc.get_pages() {
        let annots = page::page_annotations(doc, page_id).unwrap_or_default();
        for annot in annots {
            if let Ok(annot_id) = annot.as_reference() {
                placements.entry(annot_id).or_insert(page_number);
            }
        }
    }

    placements
}

#[allow(clippy::too_many_arguments)]
fn collect_fields(
    doc: &Document,
    id: ObjectId,
    parent_name: Option<&str>,
    parent_type: Option<&str>,
    placements: &BTreeMap<ObjectId, u32>,
    visited: &mut BTreeSet<ObjectId>,
    fields: &mut Vec<FormFieldInfo>,
    depth: usize,
) {
    if depth > MAX_FIELD_DEPTH || !visited.insert(id) {
        return;
    }

    let Ok(Object::Dictionary(node)) = doc.get_object(id) else {
        return;
    };

    let name = match (parent_name, text_entry(node, b"T")) {
        (Some(parent), Some(own)) => format!("{}.{}", parent, own),
        (None, Some(own)) => own,
        (Some(parent), None) => parent.to_string(),
        (None, None) => String::new(),
    };
    let field_type = name_entry(node, b"FT").or_else(|| parent_type.map(str::to_string));

    if acroform::is_terminal_field(doc, node) {
        let kids = acroform::kid_ids(doc, node);
        let widgets = if kids.is_empty() { vec![id] } else { kids };

        let pages = widgets
            .iter()
            .map(|widget| widget_page(doc, *widget, placements))
            .collect();

        fields.push(FormFieldInfo {
            name,
            field_type,
            widget_count: widgets.len(),
            pages,
        });
        return;
    }

    for kid in acroform::kid_ids(doc, node) {
        collect_fields(
            doc,
            kid,
            Some(name.as_str()),
            field_type.as_deref(),
            placements,
            visited,
            fields,
            depth + 1,
        );
    }
}

/// Page number a widget appears on: its page's `/Annots` first, then `/P`
fn widget_page(doc: &Document, widget: ObjectId, placements: &BTreeMap<ObjectId, u32>) -> u32 {
    if let Some(page_number) = placements.get(&widget) {
        return *page_number;
    }

    let back_reference = match doc.get_object(widget) {
        Ok(Object::Dictionary(dict)) if acroform::is_widget(dict) || dict.has(b"P") => {
            dict.get(b"P").and_then(Object::as_reference).ok()
        }
        _ => None,
    };

    back_reference
        .and_then(|page_id| {
            doc.get_pages()
                .into_iter()
                .find(|(_, id)| *id == page_id)
                .map(|(number, _)| number)
        })
        .unwrap_or(0)
}

fn text_entry(dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key)
        .and_then(Object::as_str)
        .ok()
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}

fn name_entry(dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key)
        .and_then(Object::as_name)
        .ok()
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}
