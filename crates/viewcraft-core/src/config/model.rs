use super::consts;
use serde::{Deserialize, Serialize};

/// Engine configuration, usually loaded from a `viewcraft.toml`
///
/// Every section and field has a default, so an empty document is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EngineConfig {
    #[serde(default)]
    pub encoding: EncodingConfig,
    #[serde(default)]
    pub compile: CompileConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncodingConfig {
    /// Encoding assumed for sources without an encoding directive
    #[serde(default = "default_external")]
    pub default_external: String,
    /// When false, sources reach handlers untouched
    #[serde(default = "default_true")]
    pub encoding_aware: bool,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            default_external: default_external(),
            encoding_aware: true,
        }
    }
}

fn default_external() -> String {
    consts::encoding::DEFAULT_EXTERNAL_LABEL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompileConfig {
    /// Drop the source of a compiled template that can be refreshed from its virtual path
    #[serde(default = "default_true")]
    pub discard_source: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            discard_source: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenderConfig {
    /// Send render events to the engine's instrumenter
    #[serde(default = "default_true")]
    pub instrument: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { instrument: true }
    }
}

fn default_true() -> bool {
    true
}
