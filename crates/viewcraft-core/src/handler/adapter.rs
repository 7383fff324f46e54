//! Handler invocation
//!
//! Calls a handler with the arity it declares and re-validates what comes back.
//! Handlers that take care of encodings themselves may still emit malformed code,
//! so their output is never trusted as-is.

use super::Arity;
use crate::encoding::{canonical, TemplateSource};
use crate::error::{ViewError, WrongEncodingError};
use crate::template::Template;
use crate::view::View;

/// Produce canonical code text for `template`
///
/// `source` is the normalized source the handler worked from; it is what a
/// `WrongEncodingError` reports when the generated code is malformed.
pub(crate) fn invoke(
    template: &Template,
    view: &dyn View,
    source: &TemplateSource,
) -> Result<String, ViewError> {
    let handler = template.handler();
    let generated = match handler.arity() {
        Arity::Template => handler.call(template, None),
        Arity::TemplateAndView => handler.call(template, Some(view)),
    }
    .map_err(|err| match err.downcast::<WrongEncodingError>() {
        Ok(wrong_encoding) => ViewError::WrongEncoding(wrong_encoding),
        Err(err) => ViewError::Handler(err),
    })?;

    match generated.to_canonical() {
        Some(code) => Ok(code.into_owned()),
        None => {
            tracing::warn!(
                identifier = template.identifier(),
                handler = handler.name(),
                encoding = generated.encoding().name(),
                "handler produced malformed code text"
            );
            Err(WrongEncodingError::new(source.bytes(), canonical().name()).into())
        }
    }
}
