//! Compiled units
//!
//! A compiled unit is the executable form of a template: the handler's code text,
//! parsed once and compiled into closures, registered under a name that is unique
//! per template instance.

mod code;
mod compile;
mod registry;
mod value;

pub use registry::{Registration, UnitRegistry};

use crate::error::{CompilationError, ViewError};
use crate::view::{Locals, OutputBuffer, View};
use compile::{Body, Scope};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub struct CompiledUnit {
    name: String,
    locals: Vec<String>,
    code: String,
    body: Body,
}

impl CompiledUnit {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Locals bound on every call
    pub fn locals(&self) -> &[String] {
        &self.locals
    }

    /// The code text the unit was compiled from
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Run the unit against `view` and return what it rendered
    ///
    /// The view's output buffer is set aside for the duration of the call and put back
    /// afterwards, whether the call succeeds or not.
    pub(crate) fn call(&self, view: &mut dyn View, locals: &Locals) -> Result<String, ViewError> {
        let mut scope = Scope::bind(&self.locals, locals);
        let saved = view.swap_output_buffer(OutputBuffer::new());
        let result = self.body.run(view, &mut scope);
        let rendered = view.swap_output_buffer(saved);
        result.map(|()| rendered.into_string())
    }
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("name", &self.name)
            .field("locals", &self.locals)
            .finish_non_exhaustive()
    }
}

/// A compiled unit together with the registration that keeps it in its namespace
#[derive(Debug)]
pub(crate) struct CompiledHandle {
    unit: Arc<CompiledUnit>,
    registration: Registration,
}

impl CompiledHandle {
    pub(crate) fn unit(&self) -> &Arc<CompiledUnit> {
        &self.unit
    }

    pub(crate) fn registration(&self) -> &Registration {
        &self.registration
    }
}

/// Name for the unit of template instance `instance` with `identifier`
///
/// Identical identifiers still get distinct names through the instance id.
pub(crate) fn unit_name(identifier: &str, instance: u64) -> String {
    let sanitized: String = identifier
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c == '_' { c } else { '_' })
        .collect();
    let mut hasher = DefaultHasher::new();
    identifier.hash(&mut hasher);
    format!("_{}__{}_{}", sanitized, hasher.finish(), instance)
}

/// Parse `code`, compile it and register the result in `namespace`
pub(crate) fn build(
    name: String,
    code: String,
    locals: &[String],
    namespace: &Arc<UnitRegistry>,
) -> Result<CompiledHandle, CompilationError> {
    let program = match code::parse(&code) {
        Ok(program) => program,
        Err(cause) => return Err(CompilationError { code, cause }),
    };
    let unit = Arc::new(CompiledUnit {
        name,
        locals: locals.to_vec(),
        body: compile::compile(&program),
        code,
    });
    let registration = namespace
        .define(Arc::clone(&unit))
        .map_err(|cause| CompilationError {
            code: unit.code.clone(),
            cause,
        })?;
    Ok(CompiledHandle { unit, registration })
}

#[cfg(test)]
mod tests;
