use crate::error::ViewError;
use crate::template::Template;
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

/// One template lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateQuery<'a> {
    /// Last path segment, without the `_` partial marker
    pub name: &'a str,
    /// Directories searched in order
    pub prefixes: &'a [String],
    pub partial: bool,
    /// Local names the template will be rendered with
    pub locals: &'a [String],
    /// False when the caller needs a freshly built template
    pub use_cache: bool,
}

impl TemplateQuery<'_> {
    /// Virtual path the query names under `prefix`
    pub fn virtual_path(&self, prefix: &str) -> String {
        let name = if self.partial {
            format!("_{}", self.name)
        } else {
            self.name.to_string()
        };
        if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix.trim_end_matches('/'), name)
        }
    }
}

/// Maps a virtual path to a template instance
pub trait Resolver: Send + Sync {
    fn find_template(&self, query: &TemplateQuery<'_>) -> Result<Arc<Template>, ViewError>;
}

/// A view's handle on the resolver, carrying the per-view cache switch
pub struct LookupContext {
    resolver: Arc<dyn Resolver>,
    cache: Cell<bool>,
}

impl LookupContext {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self {
            resolver,
            cache: Cell::new(true),
        }
    }

    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.get()
    }

    pub fn find_template(
        &self,
        name: &str,
        prefixes: &[String],
        partial: bool,
        locals: &[String],
    ) -> Result<Arc<Template>, ViewError> {
        self.resolver.find_template(&TemplateQuery {
            name,
            prefixes,
            partial,
            locals,
            use_cache: self.cache.get(),
        })
    }

    /// Run `f` with caching disabled, restoring the previous setting afterwards
    pub fn disable_cache<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        let previous = self.cache.replace(false);
        let result = f(self);
        self.cache.set(previous);
        result
    }
}

impl fmt::Debug for LookupContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupContext")
            .field("cache", &self.cache.get())
            .finish_non_exhaustive()
    }
}
