use std::collections::HashMap;
use std::fmt;

/// A MIME type and the format symbol it was registered under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MimeType {
    string: String,
    symbol: String,
}

impl MimeType {
    pub fn new(string: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            string: string.into(),
            symbol: symbol.into(),
        }
    }

    /// e.g. `text/html`
    pub fn as_str(&self) -> &str {
        &self.string
    }

    /// e.g. `html`
    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string)
    }
}

pub trait MimeRegistry: Send + Sync {
    fn lookup_by_extension(&self, extension: &str) -> Option<MimeType>;
}

/// A fixed table of common MIME types
#[derive(Debug, Clone)]
pub struct StaticMimeRegistry {
    by_extension: HashMap<String, MimeType>,
}

impl StaticMimeRegistry {
    pub fn empty() -> Self {
        Self {
            by_extension: HashMap::new(),
        }
    }

    pub fn register(&mut self, extension: impl Into<String>, mime: impl Into<String>) {
        let extension = extension.into();
        let mime_type = MimeType::new(mime, extension.clone());
        self.by_extension.insert(extension, mime_type);
    }
}

impl Default for StaticMimeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for (extension, mime) in [
            ("html", "text/html"),
            ("text", "text/plain"),
            ("json", "application/json"),
            ("xml", "application/xml"),
            ("js", "text/javascript"),
            ("css", "text/css"),
            ("csv", "text/csv"),
            ("svg", "image/svg+xml"),
        ] {
            registry.register(extension, mime);
        }
        registry
    }
}

impl MimeRegistry for StaticMimeRegistry {
    fn lookup_by_extension(&self, extension: &str) -> Option<MimeType> {
        self.by_extension.get(extension).cloned()
    }
}
