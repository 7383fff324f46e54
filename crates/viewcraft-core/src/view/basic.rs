use super::{split_virtual_path, Engine, Locals, LookupContext, OutputBuffer, Resolver, View};
use crate::error::ViewError;
use crate::template::Template;
use crate::unit::UnitRegistry;
use std::fmt;
use std::sync::Arc;

/// A ready-to-use rendering context
///
/// `BasicView::new` shares compiled units through the engine's namespace; an
/// `isolated` view registers everything it compiles in a namespace of its own, which
/// goes away with the view.
pub struct BasicView {
    engine: Arc<Engine>,
    lookup: LookupContext,
    namespace: Arc<UnitRegistry>,
    shares_compiled: bool,
    assigns: Option<Locals>,
    buffer: OutputBuffer,
    current: Option<Arc<Template>>,
}

impl BasicView {
    pub fn new(engine: Arc<Engine>, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            engine,
            lookup: LookupContext::new(resolver),
            namespace: UnitRegistry::new("view"),
            shares_compiled: true,
            assigns: None,
            buffer: OutputBuffer::new(),
            current: None,
        }
    }

    pub fn isolated(engine: Arc<Engine>, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            shares_compiled: false,
            ..Self::new(engine, resolver)
        }
    }

    pub fn with_assigns(mut self, assigns: Locals) -> Self {
        self.assigns = Some(assigns);
        self
    }

    /// Render `path` through the lookup context with the names in `locals`
    fn render_path(
        &mut self,
        path: &str,
        locals: &Locals,
        partial: bool,
    ) -> Result<String, ViewError> {
        let (dir, name) = split_virtual_path(path);
        let prefixes = [dir.to_string()];
        let local_names: Vec<String> = locals.keys().cloned().collect();
        let template = self
            .lookup
            .find_template(name, &prefixes, partial, &local_names)?;
        template.render(self, locals)
    }
}

impl View for BasicView {
    fn engine(&self) -> &Engine {
        &self.engine
    }

    fn current_template(&self) -> Option<&Arc<Template>> {
        self.current.as_ref()
    }

    fn replace_current_template(
        &mut self,
        template: Option<Arc<Template>>,
    ) -> Option<Arc<Template>> {
        std::mem::replace(&mut self.current, template)
    }

    fn output_buffer(&mut self) -> &mut OutputBuffer {
        &mut self.buffer
    }

    fn lookup_context(&self) -> &LookupContext {
        &self.lookup
    }

    fn assigns(&self) -> Option<&Locals> {
        self.assigns.as_ref()
    }

    fn namespace(&self) -> Arc<UnitRegistry> {
        Arc::clone(&self.namespace)
    }

    fn shares_compiled_templates(&self) -> bool {
        self.shares_compiled
    }

    fn render_template(&mut self, path: &str, locals: &Locals) -> Result<String, ViewError> {
        self.render_path(path, locals, false)
    }

    fn render_partial(&mut self, path: &str, locals: &Locals) -> Result<String, ViewError> {
        self.render_path(path, locals, true)
    }
}

impl fmt::Debug for BasicView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicView")
            .field("namespace", &self.namespace)
            .field("shares_compiled", &self.shares_compiled)
            .field("current", &self.current)
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}
