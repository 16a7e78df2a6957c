//! PDF manipulation module

pub mod acroform;
pub mod metadata;
pub mod overlay;
pub mod page;

// Re-export commonly used items
pub use metadata::{count_pages, extract_metadata, form_fields, inspect_pdf, FormFieldInfo, PdfMetadata};
pub use overlay::{
    merge_documents, merge_overlay_files, merge_with_overlay, merge_with_overlay_opts,
    OverlayMergeOptions, OverlayOptions,
};
