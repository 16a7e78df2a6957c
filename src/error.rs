//! Error types for the fillable PDF library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the fillable PDF library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {0}")]
    EmptyPdf(String),

    /// Overlay does not cover every base page
    #[error("Page count mismatch: base has {base} pages, overlay has {overlay} pages")]
    PageCountMismatch {
        /// Pages in the base document
        base: usize,
        /// Pages in the overlay document
        overlay: usize,
    },

    /// A required document structure is absent or has the wrong type
    #[error("Missing PDF structure: {0}")]
    MissingStructure(String),

    /// Any failure inside the overlay merge, carrying the underlying cause
    #[error("Failed to merge PDF with form fields: {0}")]
    MergeFailed(#[source] Box<Error>),
}

impl Error {
    /// Wrap this error as a merge failure unless it already is one
    pub fn into_merge_failure(self) -> Self {
        match self {
            Error::MergeFailed(_) => self,
            other => Error::MergeFailed(Box::new(other)),
        }
    }
}
