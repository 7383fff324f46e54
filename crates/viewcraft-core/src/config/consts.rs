//! Constants shared across the engine

/// Encoding defaults
pub mod encoding {
    /// Label of the encoding assumed for sources without an encoding directive
    pub const DEFAULT_EXTERNAL_LABEL: &str = "UTF-8";
}

/// Template lifecycle and diagnostics
pub mod template {
    /// Seconds since the Unix epoch written by `Template::expire`
    pub const EXPIRED_AT_SECS: i64 = 0;

    /// Number of lines shown on each side of a failing line in a source extract
    pub const SOURCE_CODE_RADIUS: usize = 3;

    /// Instrumentation event name bracketing every render
    pub const RENDER_EVENT: &str = "!render_template.viewcraft";
}
