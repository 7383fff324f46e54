//! Engine configuration
//!
//! Configuration is plain data deserialized from TOML. Values that need resolving
//! (encoding labels) are checked by [`EngineConfig::validate`], which every loader runs.

pub mod consts;
mod model;

pub use model::{CompileConfig, EncodingConfig, EngineConfig, RenderConfig};

use crate::encoding::SourceEncoding;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CONFIG_READ_ERROR: failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CONFIG_PARSE_ERROR: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("CONFIG_INVALID_VALUE: {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.encoding.default_external_encoding()?;
        Ok(())
    }
}

impl EncodingConfig {
    /// Resolve the `default_external` label
    pub fn default_external_encoding(&self) -> Result<SourceEncoding, ConfigError> {
        SourceEncoding::for_label(&self.default_external).ok_or_else(|| {
            ConfigError::InvalidValue {
                field: "encoding.default_external".to_string(),
                reason: format!("unknown encoding '{}'", self.default_external),
            }
        })
    }
}
