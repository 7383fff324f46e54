//! Templates and their compile-once lifecycle
//!
//! A [`Template`] pairs source with a handler. The first render normalizes the
//! source, has the handler translate it into code text and builds a compiled unit
//! from that; every later render reuses the unit. Failures are attributed to the
//! template as a [`RenderError`] before they reach the caller.

mod attribution;

pub use attribution::RenderError;

use crate::config::consts;
use crate::encoding::{Normalizer, TemplateSource};
use crate::error::{UsageError, ViewError};
use crate::handler::{self, Handler};
use crate::unit::{self, CompiledHandle, CompiledUnit};
use crate::view::{
    split_virtual_path, target_namespace, Locals, MimeRegistry, MimeType, Phase, RenderEvent, View,
};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use std::time::{Duration, Instant};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Format symbol such as `html` or `text`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Format(String);

impl Format {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Format {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

impl From<String> for Format {
    fn from(symbol: String) -> Self {
        Self(symbol)
    }
}

/// Optional attributes of a template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateDetails {
    formats: Vec<Format>,
    virtual_path: Option<String>,
    locals: Vec<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl TemplateDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: impl Into<Format>) -> Self {
        let format = format.into();
        if !self.formats.contains(&format) {
            self.formats.push(format);
        }
        self
    }

    pub fn with_virtual_path(mut self, virtual_path: impl Into<String>) -> Self {
        self.virtual_path = Some(virtual_path.into());
        self
    }

    pub fn with_locals<I, S>(mut self, locals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locals = locals.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }
}

pub struct Template {
    instance: u64,
    identifier: String,
    handler: Arc<dyn Handler>,
    formats: Vec<Format>,
    locals: Vec<String>,
    virtual_path: Option<String>,
    updated_at: RwLock<DateTime<Utc>>,
    source: Mutex<Option<TemplateSource>>,
    /// Held for the whole compile step
    compile_lock: Mutex<()>,
    compiled: OnceLock<CompiledHandle>,
    mime_type: OnceLock<Option<MimeType>>,
    data: Mutex<Option<Locals>>,
}

impl Template {
    /// Create a template
    ///
    /// Formats come from `details`, falling back to the handler's default format.
    pub fn new(
        source: impl Into<TemplateSource>,
        identifier: impl Into<String>,
        handler: Arc<dyn Handler>,
        details: TemplateDetails,
    ) -> Self {
        let TemplateDetails {
            mut formats,
            virtual_path,
            locals,
            updated_at,
        } = details;
        if formats.is_empty() {
            formats.extend(handler.default_format());
        }

        Self {
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            identifier: identifier.into(),
            handler,
            formats,
            locals,
            virtual_path,
            updated_at: RwLock::new(updated_at.unwrap_or_else(Utc::now)),
            source: Mutex::new(Some(source.into())),
            compile_lock: Mutex::new(()),
            compiled: OnceLock::new(),
            mime_type: OnceLock::new(),
            data: Mutex::new(None),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The identifier without its `scheme://` origin
    pub fn short_identifier(&self) -> &str {
        self.identifier
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.identifier)
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn formats(&self) -> &[Format] {
        &self.formats
    }

    pub fn locals(&self) -> &[String] {
        &self.locals
    }

    pub fn virtual_path(&self) -> Option<&str> {
        self.virtual_path.as_deref()
    }

    /// Name a partial's object is bound to: `posts/_comment.html` gives `comment`
    pub fn variable_name(&self) -> Option<&str> {
        let (_, name) = split_virtual_path(self.virtual_path.as_deref()?);
        let name = name.strip_prefix('_').unwrap_or(name);
        name.split('.').next().filter(|name| !name.is_empty())
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        *self.updated_at.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the source, until it is discarded after compilation
    pub fn source(&self) -> Option<TemplateSource> {
        self.lock_source().clone()
    }

    pub fn has_source(&self) -> bool {
        self.lock_source().is_some()
    }

    pub fn supports_streaming(&self) -> bool {
        self.handler.supports_streaming()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    pub fn compiled_unit(&self) -> Option<&Arc<CompiledUnit>> {
        self.compiled.get().map(CompiledHandle::unit)
    }

    /// Name the compiled unit is registered under
    pub fn unit_name(&self) -> Option<&str> {
        self.compiled
            .get()
            .map(|handle| handle.registration().name())
    }

    /// Run `f` on the handler data of this template, creating it on first use
    pub fn with_data<R>(&self, f: impl FnOnce(&mut Locals) -> R) -> R {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        f(data.get_or_insert_with(Locals::new))
    }

    /// Mark the template as always stale
    pub fn expire(&self) {
        let expired =
            DateTime::from_timestamp(consts::template::EXPIRED_AT_SECS, 0).unwrap_or_default();
        *self.updated_at.write().unwrap_or_else(PoisonError::into_inner) = expired;
    }

    /// MIME type of the first format, looked up once
    pub fn mime_type(&self, registry: &dyn MimeRegistry) -> Option<&MimeType> {
        self.mime_type
            .get_or_init(|| {
                self.formats
                    .first()
                    .and_then(|format| registry.lookup_by_extension(format.as_str()))
            })
            .as_ref()
    }

    /// Compile the template for `view`, unless it is compiled already
    pub fn compile(&self, view: &dyn View) -> Result<(), ViewError> {
        self.ensure_compiled(view).map(|_| ())
    }

    /// Render with `locals`, compiling first if needed
    ///
    /// The template is the view's current template while it renders. Failures other
    /// than encoding and usage errors come back as [`ViewError::Render`].
    pub fn render(self: &Arc<Self>, view: &mut dyn View, locals: &Locals) -> Result<String, ViewError> {
        let mime_type = self
            .mime_type(view.engine().mime_registry())
            .map(MimeType::as_str)
            .unwrap_or_default();
        let span = tracing::debug_span!(
            "render_template",
            virtual_path = self.virtual_path.as_deref().unwrap_or(&self.identifier),
            mime_type
        );
        let _entered = span.enter();

        let instrumenter = view.engine().instrumenter().cloned();
        if let Some(instrumenter) = &instrumenter {
            instrumenter.instrument(&self.render_event(Phase::Start, None, false));
        }
        let started = Instant::now();

        let previous = view.replace_current_template(Some(Arc::clone(self)));
        let result = self
            .ensure_compiled(&*view)
            .and_then(|handle| handle.unit().call(view, locals))
            .map_err(|err| attribution::attribute(self, &*view, err));
        view.replace_current_template(previous);

        if let Some(instrumenter) = &instrumenter {
            instrumenter.instrument(&self.render_event(
                Phase::Finish,
                Some(started.elapsed()),
                result.is_err(),
            ));
        }
        result
    }

    /// Resolve a fresh instance of this template, bypassing the resolver cache
    pub fn refresh(&self, view: &dyn View) -> Result<Arc<Template>, ViewError> {
        let virtual_path =
            self.virtual_path
                .as_deref()
                .ok_or_else(|| UsageError::RefreshWithoutVirtualPath {
                    identifier: self.identifier.clone(),
                })?;
        let (prefix, name) = split_virtual_path(virtual_path);
        let (name, partial) = match name.strip_prefix('_') {
            Some(name) => (name, true),
            None => (name, false),
        };
        let prefixes = [prefix.to_string()];

        view.lookup_context().disable_cache(|lookup| {
            lookup.find_template(name, &prefixes, partial, &self.locals)
        })
    }

    /// Render this template's location again through the view
    pub fn rerender(&self, view: &mut dyn View) -> Result<String, ViewError> {
        let virtual_path =
            self.virtual_path
                .as_deref()
                .ok_or_else(|| UsageError::RerenderWithoutVirtualPath {
                    identifier: self.identifier.clone(),
                })?;
        let (prefix, name) = split_virtual_path(virtual_path);

        match name.strip_prefix('_') {
            Some(name) if prefix.is_empty() => view.render_partial(name, &Locals::new()),
            Some(name) => view.render_partial(&format!("{}/{}", prefix, name), &Locals::new()),
            None => view.render_template(virtual_path, &Locals::new()),
        }
    }

    fn lock_source(&self) -> std::sync::MutexGuard<'_, Option<TemplateSource>> {
        self.source.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Convert the source in place, keeping it as-is when it cannot be converted
    pub(crate) fn normalize_source(&self, normalizer: &Normalizer) {
        let mut slot = self.lock_source();
        if let Some(raw) = slot.take() {
            let normalized = normalizer.normalize(raw.clone(), false).unwrap_or(raw);
            *slot = Some(normalized);
        }
    }

    fn ensure_compiled(&self, view: &dyn View) -> Result<&CompiledHandle, ViewError> {
        if let Some(handle) = self.compiled.get() {
            return Ok(handle);
        }
        let _guard = self
            .compile_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = self.compiled.get() {
            return Ok(handle);
        }

        let raw = self.source().ok_or_else(|| UsageError::SourceDiscarded {
            identifier: self.identifier.clone(),
        })?;
        let engine = view.engine();
        let normalized = engine
            .normalizer()
            .normalize(raw.clone(), self.handler.handles_encoding())?;

        // Handlers read the normalized source through the template
        *self.lock_source() = Some(normalized.clone());
        let handle = match self.build_unit(view, &normalized) {
            Ok(handle) => handle,
            Err(err) => {
                *self.lock_source() = Some(raw);
                return Err(err);
            }
        };

        if self.virtual_path.is_some() && engine.config().compile.discard_source {
            *self.lock_source() = None;
        }
        Ok(self.compiled.get_or_init(|| handle))
    }

    fn build_unit(
        &self,
        view: &dyn View,
        source: &TemplateSource,
    ) -> Result<CompiledHandle, ViewError> {
        let code = handler::invoke(self, view, source)?;
        let namespace = target_namespace(view);
        let handle = unit::build(
            unit::unit_name(self.short_identifier(), self.instance),
            code,
            &self.locals,
            &namespace,
        )?;
        tracing::debug!(
            identifier = %self.identifier,
            unit = handle.unit().name(),
            namespace = namespace.label(),
            "compiled template"
        );
        Ok(handle)
    }

    fn render_event(&self, phase: Phase, elapsed: Option<Duration>, failed: bool) -> RenderEvent {
        RenderEvent {
            name: consts::template::RENDER_EVENT,
            phase,
            identifier: self.identifier.clone(),
            virtual_path: self.virtual_path.clone(),
            elapsed,
            failed,
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_identifier())
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("identifier", &self.identifier)
            .field("handler", &self.handler.name())
            .field("virtual_path", &self.virtual_path)
            .field("formats", &self.formats)
            .field("locals", &self.locals)
            .field("compiled", &self.is_compiled())
            .finish_non_exhaustive()
    }
}
