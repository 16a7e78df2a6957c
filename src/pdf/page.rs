//! Page-level helpers shared by the overlay merge and form inspection
//!
//! Everything here edits page dictionaries only. Annotation and field objects
//! are addressed by reference and never cloned, so references held elsewhere
//! in the document (the AcroForm field tree in particular) stay valid.

use std::collections::BTreeMap;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use crate::error::{Error, Result};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against malformed, cyclic page trees
const MAX_TREE_DEPTH: usize = 64;

/// US Letter, used when a page declares no MediaBox anywhere in its tree
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Page object ids in display order
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Borrow a page dictionary, failing if the id does not name one
pub fn page_dict(doc: &Document, page_id: ObjectId) -> Result<&Dictionary> {
    match doc.get_object(page_id)? {
        Object::Dictionary(dict) => Ok(dict),
        _ => Err(Error::MissingStructure(format!(
            "page {} {} R is not a dictionary",
            page_id.0, page_id.1
        ))),
    }
}

/// Mutably borrow a page dictionary
pub fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary> {
    match doc.get_object_mut(page_id)? {
        Object::Dictionary(dict) => Ok(dict),
        _ => Err(Error::MissingStructure(format!(
            "page {} {} R is not a dictionary",
            page_id.0, page_id.1
        ))),
    }
}

/// Look up `key` on the page itself, then on each ancestor page-tree node
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;

    for _ in 0..MAX_TREE_DEPTH {
        let dict = match doc.get_object(current) {
            Ok(Object::Dictionary(dict)) => dict,
            _ => return None,
        };

        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => current = *parent_id,
            _ => return None,
        }
    }

    None
}

/// Copy inherited attributes directly onto each page
///
/// Pages are about to be re-parented under a new page-tree root, so anything
/// they picked up from their old ancestors has to move onto the page first.
pub fn pin_inherited_attributes(doc: &mut Document, page_ids: &[ObjectId]) -> Result<()> {
    for &page_id in page_ids {
        let mut pinned = Vec::new();
        {
            let dict = page_dict(doc, page_id)?;
            for key in INHERITABLE_KEYS {
                if dict.has(key) {
                    continue;
                }
                if let Some(value) = inherited_attribute(doc, page_id, key) {
                    pinned.push((key.to_vec(), value));
                }
            }
        }

        if pinned.is_empty() {
            continue;
        }

        let dict = page_dict_mut(doc, page_id)?;
        for (key, value) in pinned {
            dict.set(key, value);
        }
    }

    Ok(())
}

/// Resolve an object that may be a reference to an array into its elements
pub fn resolve_array(doc: &Document, object: &Object) -> Vec<Object> {
    match object {
        Object::Array(items) => items.clone(),
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Resolve an object that may be a reference to a dictionary
pub fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match object {
        Object::Dictionary(dict) => Some(dict),
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Dictionary(dict)) => Some(dict),
            _ => None,
        },
        _ => None,
    }
}

/// The page's `/Annots` entries, resolved if the array itself is indirect
pub fn page_annotations(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let dict = page_dict(doc, page_id)?;
    Ok(dict
        .get(b"Annots")
        .map(|annots| resolve_array(doc, annots))
        .unwrap_or_default())
}

/// The page's MediaBox as `[llx, lly, urx, ury]`
pub fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let Some(object) = inherited_attribute(doc, page_id, b"MediaBox") else {
        return DEFAULT_MEDIA_BOX;
    };

    let values: Vec<f32> = resolve_array(doc, &object)
        .iter()
        .filter_map(|value| value.as_float().ok())
        .collect();

    match values.as_slice() {
        [llx, lly, urx, ury] => [*llx, *lly, *urx, *ury],
        _ => DEFAULT_MEDIA_BOX,
    }
}

/// The page's Resources dictionary, dereferenced and cloned
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let dict = page_dict(doc, page_id)?;
    Ok(dict
        .get(b"Resources")
        .ok()
        .and_then(|res| resolve_dict(doc, res))
        .cloned()
        .unwrap_or_default())
}

/// Create a Form XObject holding `content`, drawn with its own `resources`
///
/// Keeping the overlay's drawing inside a Form XObject means its resource
/// names live in their own namespace and cannot collide with the base page's.
pub fn create_form_xobject(
    doc: &mut Document,
    content: Vec<u8>,
    resources: Dictionary,
    bbox: [f32; 4],
) -> ObjectId {
    let mut xobject_dict = Dictionary::new();
    xobject_dict.set("Type", Object::Name(b"XObject".to_vec()));
    xobject_dict.set("Subtype", Object::Name(b"Form".to_vec()));
    xobject_dict.set("FormType", Object::Integer(1));
    xobject_dict.set("BBox", Object::Array(bbox.iter().map(|v| Object::Real(*v)).collect()));
    xobject_dict.set("Matrix", Object::Array(vec![
        Object::Integer(1),
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(1),
        Object::Integer(0),
        Object::Integer(0),
    ]));
    xobject_dict.set("Resources", Object::Dictionary(resources));

    doc.add_object(Stream::new(xobject_dict, content))
}

/// Register an XObject in the page's Resources under a name not already taken
///
/// Returns the name chosen. The page ends up with its own direct Resources
/// dictionary so shared resource dictionaries are never modified.
pub fn add_xobject_to_page_resources(
    doc: &mut Document,
    page_id: ObjectId,
    base_name: &str,
    xobject_id: ObjectId,
) -> Result<String> {
    let mut resources = page_resources(doc, page_id)?;

    let mut xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|xo| resolve_dict(doc, xo))
        .cloned()
        .unwrap_or_default();

    let mut name = base_name.to_string();
    let mut suffix = 1;
    while xobjects.has(name.as_bytes()) {
        name = format!("{}{}", base_name, suffix);
        suffix += 1;
    }

    xobjects.set(name.as_bytes().to_vec(), Object::Reference(xobject_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(resources));

    Ok(name)
}

/// Wrap the page's existing contents in `q`/`Q` and append `trailing` after them
///
/// The wrap stops any transformation left active by the original content from
/// displacing what is drawn afterwards.
pub fn wrap_and_append_content(
    doc: &mut Document,
    page_id: ObjectId,
    trailing: ObjectId,
) -> Result<()> {
    let existing = doc.get_page_contents(page_id);

    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let restore_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));

    let mut contents = Vec::with_capacity(existing.len() + 3);
    contents.push(Object::Reference(save_id));
    contents.extend(existing.into_iter().map(Object::Reference));
    contents.push(Object::Reference(restore_id));
    contents.push(Object::Reference(trailing));

    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));

    Ok(())
}

/// Shift every indirect reference inside `object` by `offset` object numbers
pub fn offset_references(object: &Object, offset: u32) -> Object {
    match object {
        Object::Reference((number, generation)) => Object::Reference((number + offset, *generation)),
        Object::Array(items) => {
            Object::Array(items.iter().map(|item| offset_references(item, offset)).collect())
        }
        Object::Dictionary(dict) => Object::Dictionary(offset_dict_references(dict, offset)),
        Object::Stream(stream) => {
            let mut shifted = stream.clone();
            shifted.dict = offset_dict_references(&stream.dict, offset);
            Object::Stream(shifted)
        }
        _ => object.clone(),
    }
}

fn offset_dict_references(dict: &Dictionary, offset: u32) -> Dictionary {
    let mut shifted = Dictionary::new();
    for (key, value) in dict.iter() {
        shifted.set(key.clone(), offset_references(value, offset));
    }
    shifted
}

/// Rewrite references to moved pages inside `object`
///
/// A page mapped to `Some(id)` is replaced by a reference to `id`; one mapped
/// to `None` no longer exists and becomes `null`. Referenced objects are not
/// followed.
pub fn remap_page_references(object: &Object, moved: &BTreeMap<ObjectId, Option<ObjectId>>) -> Object {
    match object {
        Object::Reference(id) => match moved.get(id) {
            Some(Some(page_id)) => Object::Reference(*page_id),
            Some(None) => Object::Null,
            None => object.clone(),
        },
        Object::Array(items) => {
            Object::Array(items.iter().map(|item| remap_page_references(item, moved)).collect())
        }
        Object::Dictionary(dict) => {
            let mut remapped = Dictionary::new();
            for (key, value) in dict.iter() {
                remapped.set(key.clone(), remap_page_references(value, moved));
            }
            Object::Dictionary(remapped)
        }
        _ => object.clone(),
    }
}
