//! viewcraft: compile-once template rendering
//!
//! Templates pair source text with a pluggable [`handler::Handler`]. On first
//! render the source is normalized to UTF-8, translated into unit code and compiled
//! into a [`unit::CompiledUnit`]; later renders reuse it.

// Core modules
pub mod config;
pub mod encoding;
pub mod error;
pub mod handler;
pub mod template;
pub mod unit;
pub mod view;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{Result, ViewError};
pub use template::{Format, RenderError, Template, TemplateDetails};
pub use view::{BasicView, Engine, Locals, MemoryResolver, View};
