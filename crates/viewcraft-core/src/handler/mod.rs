//! Pluggable markup-to-code handlers
//!
//! A handler turns a template's source into unit code text (see [`crate::unit`]).
//! Handlers are registered per file extension in [`Handlers`].

mod adapter;
mod erb;
mod raw;

pub(crate) use adapter::invoke;
pub use erb::ErbHandler;
pub use raw::RawHandler;

use crate::encoding::{canonical, SourceEncoding};
use crate::template::{Format, Template};
use crate::view::View;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// What a handler wants to be called with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Only the template
    Template,
    /// The template and the rendering context it is compiled for
    TemplateAndView,
}

/// Code text produced by a handler, in the encoding the handler reports
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    bytes: Vec<u8>,
    encoding: SourceEncoding,
}

impl GeneratedCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            bytes: code.into().into_bytes(),
            encoding: canonical(),
        }
    }

    pub fn encoded(bytes: impl Into<Vec<u8>>, encoding: impl Into<SourceEncoding>) -> Self {
        Self {
            bytes: bytes.into(),
            encoding: encoding.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn encoding(&self) -> SourceEncoding {
        self.encoding
    }

    /// Convert to canonical text, or `None` when malformed in the reported encoding
    pub fn to_canonical(&self) -> Option<Cow<'_, str>> {
        self.encoding.decode(&self.bytes)
    }
}

impl fmt::Debug for GeneratedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedCode")
            .field("encoding", &self.encoding.name())
            .field("code", &String::from_utf8_lossy(&self.bytes))
            .finish()
    }
}

/// Translates template source into unit code text
pub trait Handler: Send + Sync {
    /// Produce code for `template`
    ///
    /// `view` is `Some` exactly when [`Handler::arity`] is `TemplateAndView`.
    fn call(&self, template: &Template, view: Option<&dyn View>) -> anyhow::Result<GeneratedCode>;

    fn arity(&self) -> Arity {
        Arity::Template
    }

    /// Handlers returning true receive undeclared sources as tagged, unconverted bytes
    fn handles_encoding(&self) -> bool {
        false
    }

    fn default_format(&self) -> Option<Format> {
        None
    }

    fn supports_streaming(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Handlers by file extension
#[derive(Clone, Default)]
pub struct Handlers {
    by_extension: BTreeMap<String, Arc<dyn Handler>>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// `erb` and `raw`
    pub fn with_defaults() -> Self {
        let mut handlers = Self::new();
        handlers.register("erb", Arc::new(ErbHandler::default()));
        handlers.register("raw", Arc::new(RawHandler));
        handlers
    }

    pub fn register(&mut self, extension: impl Into<String>, handler: Arc<dyn Handler>) {
        self.by_extension.insert(extension.into(), handler);
    }

    pub fn for_extension(&self, extension: &str) -> Option<Arc<dyn Handler>> {
        self.by_extension.get(extension).cloned()
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.by_extension.keys().map(String::as_str)
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.by_extension
                    .iter()
                    .map(|(extension, handler)| (extension, handler.name())),
            )
            .finish()
    }
}
