//! Rendering context and the collaborators it exposes
//!
//! The engine core only talks to these through traits: [`View`] (output buffer,
//! current-template slot, render entry points), [`Resolver`] (virtual path to
//! template), [`MimeRegistry`] and [`Instrumenter`]. [`BasicView`] and
//! [`MemoryResolver`] are complete, in-process implementations of them.

mod basic;
mod engine;
mod instrument;
mod lookup;
mod memory;
mod mime;

pub use basic::BasicView;
pub use engine::Engine;
pub use instrument::{Instrumenter, Phase, RenderEvent};
pub use lookup::{LookupContext, Resolver, TemplateQuery};
pub use memory::MemoryResolver;
pub use mime::{MimeRegistry, MimeType, StaticMimeRegistry};

use crate::error::ViewError;
use crate::template::Template;
use crate::unit::UnitRegistry;
use std::sync::Arc;

/// Local variables (and assigns) handed to a render
pub type Locals = serde_json::Map<String, serde_json::Value>;

/// Text produced by the render currently writing into a view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputBuffer(String);

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_str(&mut self, text: &str) {
        self.0.push_str(text);
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// A rendering context
///
/// A view is used by one render at a time: the current-template slot and the output
/// buffer are per-view state, so concurrent renders need their own views.
pub trait View {
    /// Engine-wide state: configuration, shared unit namespace, MIME registry
    fn engine(&self) -> &Engine;

    fn current_template(&self) -> Option<&Arc<Template>>;

    /// Put `template` in the current-template slot, returning what was there
    fn replace_current_template(&mut self, template: Option<Arc<Template>>)
        -> Option<Arc<Template>>;

    fn output_buffer(&mut self) -> &mut OutputBuffer;

    /// Install `buffer` and return the one it replaces
    fn swap_output_buffer(&mut self, buffer: OutputBuffer) -> OutputBuffer {
        std::mem::replace(self.output_buffer(), buffer)
    }

    fn lookup_context(&self) -> &LookupContext;

    /// Variables visible to every template rendered by this view, if any
    fn assigns(&self) -> Option<&Locals> {
        None
    }

    /// The namespace owned by this view instance
    fn namespace(&self) -> Arc<UnitRegistry>;

    /// Whether templates compiled through this view go to the engine's shared namespace
    fn shares_compiled_templates(&self) -> bool {
        false
    }

    /// Render the full template at `path`
    fn render_template(&mut self, path: &str, locals: &Locals) -> Result<String, ViewError>;

    /// Render the partial `path`, where the last segment carries no `_` marker
    fn render_partial(&mut self, path: &str, locals: &Locals) -> Result<String, ViewError>;
}

/// Namespace that units compiled through `view` are registered in
pub(crate) fn target_namespace(view: &dyn View) -> Arc<UnitRegistry> {
    if view.shares_compiled_templates() {
        Arc::clone(view.engine().shared_namespace())
    } else {
        view.namespace()
    }
}

/// Split `dir/name` into its directory and last segment
pub(crate) fn split_virtual_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", path),
    }
}
