use super::{GeneratedCode, Handler};
use crate::encoding::canonical;
use crate::error::WrongEncodingError;
use crate::template::{Format, Template};
use crate::view::View;

/// Emits the source verbatim
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawHandler;

impl Handler for RawHandler {
    fn call(&self, template: &Template, _view: Option<&dyn View>) -> anyhow::Result<GeneratedCode> {
        let source = template
            .source()
            .ok_or_else(|| anyhow::anyhow!("source of '{}' is not available", template.identifier()))?;
        let text = source.decode().ok_or_else(|| {
            let encoding = source.encoding().unwrap_or_else(canonical);
            WrongEncodingError::new(source.bytes(), encoding.name())
        })?;
        Ok(GeneratedCode::new(format!(
            "@line 1\nemit {}\n",
            serde_json::to_string(&*text)?
        )))
    }

    fn default_format(&self) -> Option<Format> {
        Some(Format::new("text"))
    }

    fn name(&self) -> &str {
        "raw"
    }
}
