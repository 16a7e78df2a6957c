//! Fillable PDF Library
//!
//! Turns a statically rendered PDF into a fillable form by merging it with an
//! overlay PDF that carries the interactive widgets. This library provides
//! functionality to:
//! - Merge a base PDF with a form-field overlay, keeping field groups intact
//! - Inspect page counts and form fields of a PDF
//! - Wire a template renderer and an overlay builder into one pipeline
//!
//! # Example
//!
//! ```no_run
//! use fillable_pdf::pdf::{merge_overlay_files, OverlayMergeOptions, OverlayOptions};
//! use std::path::PathBuf;
//!
//! let options = OverlayMergeOptions {
//!     base_path: PathBuf::from("form-base.pdf"),
//!     overlay_path: PathBuf::from("form-fields.pdf"),
//!     output_path: PathBuf::from("fillable_form.pdf"),
//!     options: OverlayOptions::default(),
//! };
//!
//! merge_overlay_files(&options).expect("Failed to merge PDFs");
//! ```

pub mod error;
pub mod fillable;
pub mod pdf;

// Re-export commonly used items
pub use error::{Error, Result};
pub use fillable::{make_fillable, FormContext, OverlayBuilder, TemplateRenderer};
pub use pdf::{merge_with_overlay, OverlayOptions};
