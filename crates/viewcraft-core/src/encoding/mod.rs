//! Encoding normalization
//!
//! Template sources arrive as bytes of unknown or mixed origin. Before a handler sees
//! them they are tagged with an encoding (declared in-band on line 1, or the configured
//! default) and converted to the canonical internal encoding, UTF-8.

mod directive;
mod label;

pub use label::SourceEncoding;

use crate::config::{ConfigError, EncodingConfig};
use crate::error::WrongEncodingError;
use std::borrow::Cow;
use std::fmt;

/// The canonical internal encoding every normalized source ends up in
pub fn canonical() -> SourceEncoding {
    SourceEncoding::UTF_8
}

/// Template source bytes, optionally tagged with the encoding they are in
#[derive(Clone, PartialEq, Eq)]
pub struct TemplateSource {
    bytes: Vec<u8>,
    encoding: Option<SourceEncoding>,
}

impl TemplateSource {
    /// Untagged bytes; the normalizer decides what they are
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            encoding: None,
        }
    }

    /// Bytes known to be in `encoding`
    pub fn tagged(bytes: impl Into<Vec<u8>>, encoding: impl Into<SourceEncoding>) -> Self {
        Self {
            bytes: bytes.into(),
            encoding: Some(encoding.into()),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn encoding(&self) -> Option<SourceEncoding> {
        self.encoding
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The source as text, when it is tagged canonical and valid
    pub fn as_str(&self) -> Option<&str> {
        match self.encoding {
            Some(encoding) if encoding == canonical() => std::str::from_utf8(&self.bytes).ok(),
            _ => None,
        }
    }

    /// Strictly decode under the tagged encoding (UTF-8 when untagged)
    ///
    /// Returns `None` when the bytes are malformed in that encoding.
    pub fn decode(&self) -> Option<Cow<'_, str>> {
        self.encoding
            .unwrap_or_else(canonical)
            .decode(&self.bytes)
    }

    /// Lossy text for diagnostics
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        match self.decode() {
            Some(text) => text,
            None => String::from_utf8_lossy(&self.bytes),
        }
    }
}

impl From<&str> for TemplateSource {
    fn from(text: &str) -> Self {
        Self::tagged(text.as_bytes(), canonical())
    }
}

impl From<String> for TemplateSource {
    fn from(text: String) -> Self {
        Self::tagged(text.into_bytes(), canonical())
    }
}

impl From<Vec<u8>> for TemplateSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<&[u8]> for TemplateSource {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl fmt::Debug for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateSource")
            .field("encoding", &self.encoding.map(|encoding| encoding.name()))
            .field("text", &self.to_string_lossy())
            .finish()
    }
}

/// Converts template sources into the canonical internal encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    default_external: SourceEncoding,
    encoding_aware: bool,
}

impl Normalizer {
    pub fn new(default_external: impl Into<SourceEncoding>) -> Self {
        Self {
            default_external: default_external.into(),
            encoding_aware: true,
        }
    }

    pub fn from_config(config: &EncodingConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            default_external: config.default_external_encoding()?,
            encoding_aware: config.encoding_aware,
        })
    }

    /// Byte-oriented mode: sources are handed on untouched
    pub fn byte_oriented(mut self) -> Self {
        self.encoding_aware = false;
        self
    }

    pub fn default_external(&self) -> SourceEncoding {
        self.default_external
    }

    pub fn is_encoding_aware(&self) -> bool {
        self.encoding_aware
    }

    /// Normalize `source` for a handler
    ///
    /// Without a directive, bytes are taken to be in the encoding the source is already
    /// tagged with, or the default external encoding when untagged. A handler that decodes
    /// sources itself then gets them back tagged but unconverted. Otherwise the result is
    /// canonical text, or `WrongEncodingError` naming the encoding the bytes were checked
    /// against (the label as declared, when there is a directive).
    pub fn normalize(
        &self,
        source: TemplateSource,
        handler_handles_encoding: bool,
    ) -> Result<TemplateSource, WrongEncodingError> {
        if !self.encoding_aware {
            return Ok(source);
        }

        let tag = source.encoding();
        let mut bytes = source.into_bytes();
        let (encoding, declared) = match directive::strip_encoding_directive(&mut bytes) {
            Some(label) => match SourceEncoding::for_label(&label) {
                Some(encoding) => (encoding, Some(label)),
                None => return Err(WrongEncodingError::new(bytes, label)),
            },
            None => (tag.unwrap_or(self.default_external), None),
        };

        let tagged = TemplateSource::tagged(bytes, encoding);
        if declared.is_none() && handler_handles_encoding {
            return Ok(tagged);
        }

        let converted = tagged.decode().map(Cow::into_owned);
        match converted {
            Some(text) => Ok(TemplateSource::from(text)),
            None => {
                let name = declared.unwrap_or_else(|| encoding.name().to_string());
                Err(WrongEncodingError::new(tagged.into_bytes(), name))
            }
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(canonical())
    }
}
