//! Attributing render failures to templates

use super::Template;
use crate::config::consts::template::SOURCE_CODE_RADIUS;
use crate::error::ViewError;
use crate::view::{Locals, View};
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;

/// A failure raised while compiling or running a template
///
/// `template` is the innermost template that failed. Templates that rendered it,
/// directly or indirectly, are appended to `sub_templates` as the error travels out.
#[derive(Error, Debug)]
#[error("RENDER_FAILED: {cause}")]
pub struct RenderError {
    template: Arc<Template>,
    assigns: Locals,
    #[source]
    cause: ViewError,
    sub_templates: Vec<Arc<Template>>,
}

impl RenderError {
    pub fn new(template: Arc<Template>, assigns: Locals, cause: ViewError) -> Self {
        Self {
            template,
            assigns,
            cause,
            sub_templates: Vec::new(),
        }
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    /// The view's assigns when the failure happened
    pub fn assigns(&self) -> &Locals {
        &self.assigns
    }

    pub fn cause(&self) -> &ViewError {
        &self.cause
    }

    pub fn into_cause(self) -> ViewError {
        self.cause
    }

    /// Enclosing templates, innermost first
    pub fn sub_templates(&self) -> &[Arc<Template>] {
        &self.sub_templates
    }

    pub fn push_sub_template(&mut self, template: Arc<Template>) {
        self.sub_templates.push(template);
    }

    /// The failing template followed by every enclosing one
    pub fn template_chain(&self) -> impl Iterator<Item = &Arc<Template>> {
        std::iter::once(&self.template).chain(self.sub_templates.iter())
    }

    pub fn file_name(&self) -> &str {
        self.template.identifier()
    }

    /// Template line the failure happened on, when known
    pub fn line_number(&self) -> Option<usize> {
        match &self.cause {
            ViewError::Execution(err) => Some(err.line()),
            _ => None,
        }
    }

    pub fn sub_template_message(&self) -> String {
        if self.sub_templates.is_empty() {
            return String::new();
        }
        let trace: Vec<&str> = self
            .sub_templates
            .iter()
            .map(|template| template.short_identifier())
            .collect();
        format!("Trace of template inclusion: {}", trace.join(", "))
    }

    /// Numbered source lines around the failing line
    ///
    /// `None` when the line is unknown or the template source is unavailable.
    pub fn source_extract(&self, indentation: usize) -> Option<String> {
        let number = self.line_number()?;
        let source = self.template.source()?;
        let text = source.to_string_lossy();
        let lines: Vec<&str> = text.split('\n').collect();

        let start = number.saturating_sub(SOURCE_CODE_RADIUS + 1);
        let end = (number + SOURCE_CODE_RADIUS - 1).min(lines.len());
        let extract = lines.get(start..=end.min(lines.len().checked_sub(1)?))?;
        let width = end.to_string().len() + indentation;

        let mut formatted = String::new();
        for (offset, line) in extract.iter().enumerate() {
            let _ = writeln!(formatted, "{:>width$}: {}", start + offset + 1, line, width = width);
        }
        Some(formatted)
    }
}

/// Re-express `err`, raised while `template` was rendering, as a render error
///
/// An existing render error only gains `template` as an enclosing template. Encoding
/// and usage errors are returned untouched.
pub(crate) fn attribute(template: &Arc<Template>, view: &dyn View, err: ViewError) -> ViewError {
    match err {
        ViewError::Render(mut render) => {
            render.push_sub_template(Arc::clone(template));
            ViewError::Render(render)
        }
        err @ (ViewError::WrongEncoding(_) | ViewError::Usage(_)) => err,
        cause => {
            let attributed = if template.has_source() {
                Arc::clone(template)
            } else {
                refreshed(template, view)
            };
            let assigns = view.assigns().cloned().unwrap_or_default();
            RenderError::new(attributed, assigns, cause).into()
        }
    }
}

/// A copy of `template` with its source back, for diagnostics
fn refreshed(template: &Arc<Template>, view: &dyn View) -> Arc<Template> {
    match template.refresh(view) {
        Ok(fresh) => {
            fresh.normalize_source(view.engine().normalizer());
            fresh
        }
        Err(err) => {
            tracing::debug!(
                identifier = template.identifier(),
                error = %err,
                "could not refresh template for error attribution"
            );
            Arc::clone(template)
        }
    }
}
