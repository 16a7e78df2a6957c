//! Merge a static base PDF with an interactive form-field overlay
//!
//! The base PDF carries the visual content; the overlay carries widget
//! annotations and the AcroForm that lists them. The merge appends the whole
//! overlay object graph to the base first and only then folds overlay pages
//! onto base pages, so the field tree (radio groups included) travels as one
//! unit and every widget keeps its object id.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::PathBuf;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, warn};
use crate::error::{Error, Result};
use super::acroform;
use super::page;

/// Resource name under which overlay drawing is registered on a base page
const OVERLAY_XOBJECT_NAME: &str = "FormOverlay";

/// Options controlling how the merged document is written
#[derive(Debug, Clone)]
pub struct OverlayOptions {
    /// Compress streams before serializing
    pub compress: bool,
    /// Force `/NeedAppearances` on the output AcroForm (left untouched if `None`)
    pub need_appearances: Option<bool>,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            compress: true,
            need_appearances: None,
        }
    }
}

/// Options for merging files on disk
#[derive(Debug, Clone)]
pub struct OverlayMergeOptions {
    /// Static base PDF
    pub base_path: PathBuf,
    /// Form-field overlay PDF
    pub overlay_path: PathBuf,
    /// Where the fillable PDF is written
    pub output_path: PathBuf,
    /// Write options
    pub options: OverlayOptions,
}

/// Merge a base PDF with a form-field overlay using default options
///
/// The overlay must have at least as many pages as the base. The output has
/// exactly the base's page count: page `i` shows base page `i` with overlay
/// page `i`'s widgets on top, and the overlay's AcroForm resolves to those
/// pages.
///
/// # Example
///
/// ```no_run
/// use fillable_pdf::pdf::merge_with_overlay;
/// use std::io::Cursor;
///
/// let base = std::fs::read("base.pdf").unwrap();
/// let overlay = std::fs::read("fields.pdf").unwrap();
///
/// let fillable = merge_with_overlay(&base, Cursor::new(overlay))
///     .expect("Failed to merge");
/// std::fs::write("fillable.pdf", fillable).unwrap();
/// ```
pub fn merge_with_overlay<R: Read>(base_pdf: &[u8], overlay: R) -> Result<Vec<u8>> {
    merge_with_overlay_opts(base_pdf, overlay, &OverlayOptions::default())
}

/// Merge a base PDF with a form-field overlay
///
/// Any failure, whether parsing either input, a structural mismatch, or
/// writing the output, comes back as [`Error::MergeFailed`] carrying the
/// cause. No partial output is ever returned.
pub fn merge_with_overlay_opts<R: Read>(
    base_pdf: &[u8],
    overlay: R,
    options: &OverlayOptions,
) -> Result<Vec<u8>> {
    merge_bytes(base_pdf, overlay, options).map_err(Error::into_merge_failure)
}

fn merge_bytes<R: Read>(base_pdf: &[u8], mut overlay: R, options: &OverlayOptions) -> Result<Vec<u8>> {
    let base = Document::load_mem(base_pdf)?;

    let mut overlay_bytes = Vec::new();
    overlay.read_to_end(&mut overlay_bytes)?;
    let overlay = Document::load_mem(&overlay_bytes)?;

    let mut merged = merge_documents(base, overlay, options)?;

    let mut output = Vec::new();
    merged.save_to(&mut output)?;

    info!("Wrote fillable PDF ({} bytes)", output.len());
    Ok(output)
}

/// Merge files on disk
///
/// # Example
///
/// ```no_run
/// use fillable_pdf::pdf::{merge_overlay_files, OverlayMergeOptions, OverlayOptions};
/// use std::path::PathBuf;
///
/// let options = OverlayMergeOptions {
///     base_path: PathBuf::from("base.pdf"),
///     overlay_path: PathBuf::from("fields.pdf"),
///     output_path: PathBuf::from("fillable.pdf"),
///     options: OverlayOptions::default(),
/// };
///
/// merge_overlay_files(&options).expect("Failed to merge");
/// ```
pub fn merge_overlay_files(options: &OverlayMergeOptions) -> Result<()> {
    for path in [&options.base_path, &options.overlay_path] {
        if !path.exists() {
            return Err(Error::FileNotFound(path.clone()));
        }
    }

    let base = std::fs::read(&options.base_path)?;
    let overlay = std::fs::File::open(&options.overlay_path)?;

    let merged = merge_with_overlay_opts(&base, overlay, &options.options)?;
    std::fs::write(&options.output_path, merged)?;

    Ok(())
}

/// Merge two parsed documents, returning the merged (unsaved) document
///
/// Errors are returned as-is; the byte-level entry points wrap them.
pub fn merge_documents(
    mut base: Document,
    mut overlay: Document,
    options: &OverlayOptions,
) -> Result<Document> {
    let base_pages = page::page_ids(&base);
    let overlay_pages = page::page_ids(&overlay);
    let page_count = base_pages.len();

    if page_count == 0 {
        return Err(Error::EmptyPdf("base document".to_string()));
    }
    if overlay_pages.len() < page_count {
        return Err(Error::PageCountMismatch {
            base: page_count,
            overlay: overlay_pages.len(),
        });
    }

    debug!(
        "Merging {} base pages with {} overlay pages",
        page_count,
        overlay_pages.len()
    );

    page::pin_inherited_attributes(&mut base, &base_pages)?;
    page::pin_inherited_attributes(&mut overlay, &overlay_pages)?;

    // Pass 1: append the whole overlay, base pages first.
    let appended = append_overlay(&mut base, overlay)?;
    let mut kids = base_pages;
    kids.extend(appended.page_ids);
    let pages_root = install_page_tree(&mut base, &kids)?;

    {
        let catalog = acroform::catalog_mut(&mut base)?;
        catalog.remove(b"AcroForm");
        if let Some(acroform) = appended.acroform {
            catalog.set("AcroForm", acroform);
        }
    }

    // Pass 2: fold overlay page N+i onto page i.
    for index in 0..page_count {
        fold_page(&mut base, kids[index], kids[page_count + index], index)?;
    }

    // Drop the trailing overlay pages, highest index first. A folded page is
    // replaced by its base page; pages past 2N have no replacement.
    let mut moved: BTreeMap<ObjectId, Option<ObjectId>> = BTreeMap::new();
    for index in (page_count..kids.len()).rev() {
        let removed = kids.remove(index);
        let replacement = (index < 2 * page_count).then(|| kids[index - page_count]);
        moved.insert(removed, replacement);
        debug!("Removed overlay page {} ({} {} R)", index + 1, removed.0, removed.1);
    }
    set_page_tree_kids(&mut base, pages_root, &kids)?;

    let detached = acroform::repoint_page_references(&mut base, &kids, &moved)?;
    if !detached.is_empty() {
        warn!(
            "{} form widget(s) referenced overlay pages beyond the base page count",
            detached.len()
        );
    }

    if let Some(value) = options.need_appearances {
        acroform::set_need_appearances(&mut base, value)?;
    }

    let pruned = base.prune_objects();
    debug!("Pruned {} unreachable objects", pruned.len());

    if options.compress {
        base.compress();
    }

    info!(
        "Merged {} pages, {} form field node(s)",
        kids.len(),
        acroform::field_tree_nodes(&base).len()
    );

    Ok(base)
}

/// What the overlay contributed after being appended to the base
struct AppendedOverlay {
    /// Overlay page ids, renumbered into the base's id space
    page_ids: Vec<ObjectId>,
    /// The overlay catalog's `/AcroForm` entry, renumbered
    acroform: Option<Object>,
}

/// Move every overlay object into `base`, shifted past the base's highest id
///
/// One offset applies to every object and every reference, so the overlay's
/// internal links (field parents, kids, widget pages) survive unchanged.
fn append_overlay(base: &mut Document, overlay: Document) -> Result<AppendedOverlay> {
    let base_max = base
        .objects
        .keys()
        .map(|id| id.0)
        .max()
        .unwrap_or(0)
        .max(base.max_id);
    let offset = base_max + 1;

    let page_ids = page::page_ids(&overlay)
        .into_iter()
        .map(|(number, generation)| (number + offset, generation))
        .collect();

    let acroform = acroform::acroform_entry(&overlay)?
        .map(|entry| page::offset_references(&entry, offset));

    let overlay_max = overlay.objects.keys().map(|id| id.0).max().unwrap_or(0);
    if overlay.version > base.version {
        base.version = overlay.version.clone();
    }

    for ((number, generation), object) in overlay.objects {
        base.objects
            .insert((number + offset, generation), page::offset_references(&object, offset));
    }

    base.max_id = base.max_id.max(overlay_max + offset);

    Ok(AppendedOverlay { page_ids, acroform })
}

/// Replace the catalog's page tree with a single flat root over `kids`
fn install_page_tree(doc: &mut Document, kids: &[ObjectId]) -> Result<ObjectId> {
    let pages_id = doc.new_object_id();

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    set_page_tree_kids(doc, pages_id, kids)?;
    acroform::catalog_mut(doc)?.set("Pages", Object::Reference(pages_id));

    Ok(pages_id)
}

fn set_page_tree_kids(doc: &mut Document, pages_id: ObjectId, kids: &[ObjectId]) -> Result<()> {
    match doc.get_object_mut(pages_id)? {
        Object::Dictionary(pages) => {
            pages.set("Kids", Object::Array(kids.iter().map(|id| Object::Reference(*id)).collect()));
            pages.set("Count", Object::Integer(kids.len() as i64));
        }
        _ => return Err(Error::MissingStructure("Pages is not a dictionary".to_string())),
    }

    for &page_id in kids {
        page::page_dict_mut(doc, page_id)?.set("Parent", Object::Reference(pages_id));
    }

    Ok(())
}

/// Composite `overlay_id` onto `target_id` in place
///
/// Only the target page's Contents, Resources and Annots change. References
/// to the overlay page held by moved annotations are re-pointed once every
/// page has been folded.
fn fold_page(doc: &mut Document, target_id: ObjectId, overlay_id: ObjectId, index: usize) -> Result<()> {
    let target_box = page::media_box(doc, target_id);
    let overlay_box = page::media_box(doc, overlay_id);
    if target_box != overlay_box {
        warn!(
            "Page {}: overlay MediaBox {:?} differs from base {:?}; widgets may be misaligned",
            index + 1,
            overlay_box,
            target_box
        );
    }

    // Content
    let overlay_content = doc.get_page_content(overlay_id)?;
    if overlay_content.iter().any(|byte| !byte.is_ascii_whitespace()) {
        let resources = page::page_resources(doc, overlay_id)?;
        let xobject_id = page::create_form_xobject(doc, overlay_content, resources, overlay_box);
        let name = page::add_xobject_to_page_resources(doc, target_id, OVERLAY_XOBJECT_NAME, xobject_id)?;

        let invoke_id = doc.add_object(Stream::new(
            Dictionary::new(),
            format!("q\n/{} Do\nQ\n", name).into_bytes(),
        ));
        page::wrap_and_append_content(doc, target_id, invoke_id)?;
    }

    // Annotations
    let mut annots = page::page_annotations(doc, target_id)?;
    let base_count = annots.len();
    let mut seen: BTreeSet<ObjectId> = annots
        .iter()
        .filter_map(|annot| annot.as_reference().ok())
        .collect();

    for annot in page::page_annotations(doc, overlay_id)? {
        if let Object::Reference(annot_id) = annot {
            if !seen.insert(annot_id) {
                continue;
            }
        }
        annots.push(annot);
    }

    let moved = annots.len() - base_count;
    if !annots.is_empty() {
        page::page_dict_mut(doc, target_id)?.set("Annots", Object::Array(annots));
    }
    page::page_dict_mut(doc, overlay_id)?.remove(b"Annots");

    debug!(
        "Page {}: kept {} base annotation(s), added {} from overlay",
        index + 1,
        base_count,
        moved
    );

    Ok(())
}
