//! Fillable PDF pipeline
//!
//! Rendering the base document and building the field overlay are done by
//! external collaborators; this module only wires them to the overlay merge.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;
use crate::error::Result;
use crate::pdf::{merge_with_overlay_opts, OverlayOptions};

/// Values substituted into the template, keyed by field name
pub type FormContext = BTreeMap<String, String>;

/// Renders a template into the static base PDF
pub trait TemplateRenderer {
    /// Render `template` with `context`, resolving includes against `root`
    fn render(&self, template: &Path, context: &FormContext, root: &Path) -> Result<Vec<u8>>;
}

/// Builds the PDF that carries the interactive widgets and AcroForm
pub trait OverlayBuilder {
    /// Produce an overlay whose pages line up with the rendered base
    fn build_overlay(&self, template: &Path, context: &FormContext, root: &Path) -> Result<Vec<u8>>;
}

impl<F> TemplateRenderer for F
where
    F: Fn(&Path, &FormContext, &Path) -> Result<Vec<u8>>,
{
    fn render(&self, template: &Path, context: &FormContext, root: &Path) -> Result<Vec<u8>> {
        self(template, context, root)
    }
}

impl<F> OverlayBuilder for F
where
    F: Fn(&Path, &FormContext, &Path) -> Result<Vec<u8>>,
{
    fn build_overlay(&self, template: &Path, context: &FormContext, root: &Path) -> Result<Vec<u8>> {
        self(template, context, root)
    }
}

/// Render a template and turn it into a fillable PDF
///
/// # Example
///
/// ```no_run
/// use fillable_pdf::fillable::{make_fillable, FormContext};
/// use fillable_pdf::pdf::OverlayOptions;
/// use std::path::Path;
///
/// let renderer = |_: &Path, _: &FormContext, _: &Path| -> fillable_pdf::Result<Vec<u8>> {
///     Ok(std::fs::read("base.pdf")?)
/// };
/// let overlay = |_: &Path, _: &FormContext, _: &Path| -> fillable_pdf::Result<Vec<u8>> {
///     Ok(std::fs::read("fields.pdf")?)
/// };
///
/// let mut context = FormContext::new();
/// context.insert("full_name".to_string(), "John Doe".to_string());
///
/// let pdf = make_fillable(
///     &renderer,
///     &overlay,
///     Path::new("form.typ"),
///     &context,
///     Path::new("."),
///     &OverlayOptions::default(),
/// ).expect("Failed to build form");
/// ```
pub fn make_fillable<R, B>(
    renderer: &R,
    overlay_builder: &B,
    template: &Path,
    context: &FormContext,
    root: &Path,
    options: &OverlayOptions,
) -> Result<Vec<u8>>
where
    R: TemplateRenderer + ?Sized,
    B: OverlayBuilder + ?Sized,
{
    let base = renderer.render(template, context, root)?;
    debug!("Rendered {} ({} bytes)", template.display(), base.len());

    let overlay = overlay_builder.build_overlay(template, context, root)?;
    debug!("Built field overlay ({} bytes)", overlay.len());

    merge_with_overlay_opts(&base, Cursor::new(overlay), options)
}
