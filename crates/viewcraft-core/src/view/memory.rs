use super::lookup::{Resolver, TemplateQuery};
use super::split_virtual_path;
use crate::encoding::TemplateSource;
use crate::error::ViewError;
use crate::handler::Handlers;
use crate::template::{Template, TemplateDetails};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Resolver over an in-memory table of template sources
///
/// Entries are keyed by `dir/name.format.handler` (format optional), e.g.
/// `posts/_comment.html.erb`. The handler extension picks the handler from the
/// resolver's [`Handlers`]; entries with an unknown handler are never found.
pub struct MemoryResolver {
    handlers: Handlers,
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    cache: Mutex<HashMap<CacheKey, Arc<Template>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    virtual_path: String,
    locals: Vec<String>,
}

/// A parsed entry key
#[derive(Debug, PartialEq, Eq)]
struct EntryPath<'a> {
    virtual_path: String,
    format: Option<&'a str>,
    handler: &'a str,
}

fn parse_entry_path(path: &str) -> Option<EntryPath<'_>> {
    let (dir, file) = split_virtual_path(path);
    let mut parts = file.split('.');
    let base = parts.next().filter(|base| !base.is_empty())?;
    let extensions: Vec<&str> = parts.collect();
    let (handler, format) = match extensions.as_slice() {
        [] => return None,
        [handler] => (*handler, None),
        [format, .., handler] => (*handler, Some(*format)),
    };
    let virtual_path = if dir.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", dir, base)
    };
    Some(EntryPath {
        virtual_path,
        format,
        handler,
    })
}

impl MemoryResolver {
    pub fn new(handlers: Handlers) -> Self {
        Self {
            handlers,
            entries: RwLock::new(BTreeMap::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Add or replace the source stored under `path`
    ///
    /// Cached templates are kept; only uncached lookups see the new source.
    pub fn insert(&self, path: impl Into<String>, source: impl Into<Vec<u8>>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), source.into());
    }

    pub fn with_template(self, path: impl Into<String>, source: impl Into<Vec<u8>>) -> Self {
        self.insert(path, source);
        self
    }

    /// Number of cached template instances
    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Build a fresh template for `virtual_path`, if an entry matches
    fn build(&self, virtual_path: &str, locals: &[String]) -> Option<Template> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().find_map(|(path, source)| {
            let entry = parse_entry_path(path)?;
            if entry.virtual_path != virtual_path {
                return None;
            }
            let handler = self.handlers.for_extension(entry.handler)?;
            let mut details = TemplateDetails::new()
                .with_virtual_path(entry.virtual_path)
                .with_locals(locals.iter().cloned());
            if let Some(format) = entry.format {
                details = details.with_format(format);
            }
            Some(Template::new(
                TemplateSource::from_bytes(source.clone()),
                format!("memory://{}", path),
                handler,
                details,
            ))
        })
    }
}

impl Resolver for MemoryResolver {
    fn find_template(&self, query: &TemplateQuery<'_>) -> Result<Arc<Template>, ViewError> {
        let root = [String::new()];
        let prefixes = if query.prefixes.is_empty() {
            &root[..]
        } else {
            query.prefixes
        };

        for prefix in prefixes {
            let virtual_path = query.virtual_path(prefix);
            let key = CacheKey {
                virtual_path: virtual_path.clone(),
                locals: query.locals.to_vec(),
            };

            if query.use_cache {
                let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(template) = cache.get(&key) {
                    return Ok(Arc::clone(template));
                }
            }

            if let Some(template) = self.build(&virtual_path, query.locals) {
                let template = Arc::new(template);
                if query.use_cache {
                    self.cache
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .entry(key)
                        .or_insert_with(|| Arc::clone(&template));
                }
                return Ok(template);
            }
        }

        Err(ViewError::MissingTemplate {
            path: query.virtual_path(&prefixes[0]),
            partial: query.partial,
        })
    }
}

impl fmt::Debug for MemoryResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("MemoryResolver")
            .field("entries", &entries.keys().collect::<Vec<_>>())
            .field("cached", &self.cached_len())
            .finish()
    }
}
