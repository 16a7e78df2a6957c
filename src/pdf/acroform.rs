//! Interactive-form (AcroForm) bookkeeping
//!
//! The field tree is walked by reference. Nothing in here copies field or
//! widget objects; it only reads them or patches individual entries in place.

use std::collections::{BTreeMap, BTreeSet};
use lopdf::{Dictionary, Document, Object, ObjectId};
use crate::error::{Error, Result};
use super::page::{page_annotations, page_dict_mut, remap_page_references, resolve_array, resolve_dict};

/// Guard against malformed, cyclic field trees
const MAX_FIELD_DEPTH: usize = 32;

/// Object id of the document catalog
pub fn catalog_id(doc: &Document) -> Result<ObjectId> {
    match doc.trailer.get(b"Root") {
        Ok(Object::Reference(id)) => Ok(*id),
        Ok(_) => Err(Error::MissingStructure("Root is not a reference".to_string())),
        Err(_) => Err(Error::MissingStructure("No Root in trailer".to_string())),
    }
}

/// Mutably borrow the catalog dictionary
pub fn catalog_mut(doc: &mut Document) -> Result<&mut Dictionary> {
    let id = catalog_id(doc)?;
    match doc.get_object_mut(id)? {
        Object::Dictionary(dict) => Ok(dict),
        _ => Err(Error::MissingStructure("Catalog is not a dictionary".to_string())),
    }
}

/// The catalog's `/AcroForm` entry exactly as stored (reference or inline)
pub fn acroform_entry(doc: &Document) -> Result<Option<Object>> {
    let id = catalog_id(doc)?;
    let catalog = match doc.get_object(id)? {
        Object::Dictionary(dict) => dict,
        _ => return Err(Error::MissingStructure("Catalog is not a dictionary".to_string())),
    };

    Ok(catalog.get(b"AcroForm").ok().cloned())
}

/// The resolved AcroForm dictionary, if the document declares one
pub fn acroform_dict(doc: &Document) -> Option<&Dictionary> {
    let id = catalog_id(doc).ok()?;
    let catalog = doc.get_object(id).ok()?.as_dict().ok()?;
    resolve_dict(doc, catalog.get(b"AcroForm").ok()?)
}

/// Ids of the top-level fields listed in `/Fields`
pub fn root_field_ids(doc: &Document) -> Vec<ObjectId> {
    let Some(acroform) = acroform_dict(doc) else {
        return Vec::new();
    };

    acroform
        .get(b"Fields")
        .map(|fields| resolve_array(doc, fields))
        .unwrap_or_default()
        .iter()
        .filter_map(|field| field.as_reference().ok())
        .collect()
}

/// The `/Kids` of a field node as object ids
pub fn kid_ids(doc: &Document, node: &Dictionary) -> Vec<ObjectId> {
    node.get(b"Kids")
        .map(|kids| resolve_array(doc, kids))
        .unwrap_or_default()
        .iter()
        .filter_map(|kid| kid.as_reference().ok())
        .collect()
}

/// Every node of the field tree (fields and widgets) in depth-first order
pub fn field_tree_nodes(doc: &Document) -> Vec<ObjectId> {
    let mut visited = BTreeSet::new();
    let mut ordered = Vec::new();

    for root in root_field_ids(doc) {
        collect_nodes(doc, root, 0, &mut visited, &mut ordered);
    }

    ordered
}

fn collect_nodes(
    doc: &Document,
    id: ObjectId,
    depth: usize,
    visited: &mut BTreeSet<ObjectId>,
    ordered: &mut Vec<ObjectId>,
) {
    if depth > MAX_FIELD_DEPTH || !visited.insert(id) {
        return;
    }

    let Ok(Object::Dictionary(node)) = doc.get_object(id) else {
        return;
    };

    ordered.push(id);
    for kid in kid_ids(doc, node) {
        collect_nodes(doc, kid, depth + 1, visited, ordered);
    }
}

/// Whether a field-tree node is a terminal field (its kids, if any, are widgets)
pub fn is_terminal_field(doc: &Document, node: &Dictionary) -> bool {
    kid_ids(doc, node).iter().all(|kid| {
        !matches!(doc.get_object(*kid), Ok(Object::Dictionary(k)) if k.has(b"T"))
    })
}

/// Whether a dictionary is (or doubles as) a widget annotation
pub fn is_widget(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Widget")
}

/// Re-point references to pages that were folded away or discarded
///
/// Walks every annotation listed on `pages`, whether stored inline or by
/// reference, and every node of the field tree, so `/P`, `/Dest` and action
/// destinations follow a folded page to its replacement. A `/P` naming a
/// discarded page is removed. Returns the field-tree nodes that lost their `/P`.
pub fn repoint_page_references(
    doc: &mut Document,
    pages: &[ObjectId],
    moved: &BTreeMap<ObjectId, Option<ObjectId>>,
) -> Result<Vec<ObjectId>> {
    let field_nodes = field_tree_nodes(doc);
    let mut targets = field_nodes.clone();

    for &page_id in pages {
        let mut annots = page_annotations(doc, page_id)?;
        let mut inline = false;

        for annot in annots.iter_mut() {
            match annot {
                Object::Reference(id) => targets.push(*id),
                Object::Dictionary(_) => {
                    let mut remapped = remap_page_references(annot, moved);
                    drop_null_back_reference(&mut remapped);
                    *annot = remapped;
                    inline = true;
                }
                _ => {}
            }
        }

        if inline {
            page_dict_mut(doc, page_id)?.set("Annots", Object::Array(annots));
        }
    }

    let mut visited = BTreeSet::new();
    let mut detached = Vec::new();
    for id in targets {
        if !visited.insert(id) {
            continue;
        }
        let mut remapped = match doc.get_object(id) {
            Ok(object) if matches!(object, Object::Dictionary(_)) => remap_page_references(object, moved),
            _ => continue,
        };
        if drop_null_back_reference(&mut remapped) && field_nodes.contains(&id) {
            detached.push(id);
        }
        doc.objects.insert(id, remapped);
    }

    Ok(detached)
}

fn drop_null_back_reference(annot: &mut Object) -> bool {
    match annot {
        Object::Dictionary(dict) if matches!(dict.get(b"P"), Ok(Object::Null)) => {
            dict.remove(b"P");
            true
        }
        _ => false,
    }
}

/// Set `/NeedAppearances` on the AcroForm, wherever it is stored
pub fn set_need_appearances(doc: &mut Document, value: bool) -> Result<bool> {
    match acroform_entry(doc)? {
        Some(Object::Reference(id)) => match doc.get_object_mut(id)? {
            Object::Dictionary(acroform) => {
                acroform.set("NeedAppearances", Object::Boolean(value));
                Ok(true)
            }
            _ => Err(Error::MissingStructure("AcroForm is not a dictionary".to_string())),
        },
        Some(Object::Dictionary(_)) => {
            if let Ok(Object::Dictionary(acroform)) = catalog_mut(doc)?.get_mut(b"AcroForm") {
                acroform.set("NeedAppearances", Object::Boolean(value));
            }
            Ok(true)
        }
        Some(_) => Err(Error::MissingStructure("AcroForm is not a dictionary".to_string())),
        None => Ok(false),
    }
}
