use crate::template::RenderError;
use thiserror::Error;

/// Errors crossing the engine's collaborator seams
///
/// Every operation that compiles, resolves or renders a template returns this type.
/// `WrongEncoding` and `Usage` always reach the caller as-is; everything else raised
/// while rendering is attributed to a template and re-expressed as `Render`.
#[derive(Error, Debug)]
pub enum ViewError {
    #[error(transparent)]
    WrongEncoding(#[from] WrongEncodingError),

    #[error(transparent)]
    Compilation(#[from] CompilationError),

    // Handlers are pluggable, so their failures are opaque
    #[error(transparent)]
    Handler(anyhow::Error),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("MISSING_TEMPLATE: missing {} '{path}'", template_kind(.partial))]
    MissingTemplate { path: String, partial: bool },

    #[error(transparent)]
    Render(Box<RenderError>),

    #[error(transparent)]
    Usage(#[from] UsageError),
}

fn template_kind(partial: &bool) -> &'static str {
    if *partial {
        "partial"
    } else {
        "template"
    }
}

impl From<RenderError> for ViewError {
    fn from(err: RenderError) -> Self {
        ViewError::Render(Box::new(err))
    }
}

/// Source (or handler output) is not valid under the encoding it was checked against
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "WRONG_ENCODING: template source is not valid {encoding}. Either save it as {encoding} \
     or mark it with its encoding by inserting the following as its first line:\n\n  \
     # encoding: <name of correct encoding>\n\nThe source of the template was:\n\n{}",
    String::from_utf8_lossy(.text)
)]
pub struct WrongEncodingError {
    /// The offending bytes
    pub text: Vec<u8>,
    /// Name of the encoding the bytes were checked against
    pub encoding: String,
}

impl WrongEncodingError {
    pub fn new(text: impl Into<Vec<u8>>, encoding: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            encoding: encoding.into(),
        }
    }
}

/// Building or registering a compiled unit failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("COMPILATION_FAILED: {cause}")]
pub struct CompilationError {
    /// The code text the unit was being built from
    pub code: String,
    #[source]
    pub cause: CompileFailure,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileFailure {
    #[error("syntax error on code line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("unit '{name}' is already defined in namespace '{namespace}'")]
    Redefinition { name: String, namespace: String },
}

impl CompileFailure {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        CompileFailure::Syntax {
            line,
            message: message.into(),
        }
    }
}

/// Runtime failure of a compiled unit
///
/// `line` is the template source line the failing instruction came from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("EXECUTION_FAILED: undefined local variable '{name}' at line {line}")]
    UndefinedLocal { name: String, line: usize },

    #[error("EXECUTION_FAILED: cannot read '{key}' from a non-object in '{expr}' at line {line}")]
    NotAnObject {
        expr: String,
        key: String,
        line: usize,
    },

    #[error("EXECUTION_FAILED: '{expr}' is not iterable at line {line}")]
    NotIterable { expr: String, line: usize },

    #[error("EXECUTION_FAILED: '{expr}' evaluates to {kind} and cannot be printed at line {line}")]
    NotPrintable {
        expr: String,
        kind: &'static str,
        line: usize,
    },
}

impl ExecutionError {
    /// Template line the failure is attributed to
    pub fn line(&self) -> usize {
        match self {
            ExecutionError::UndefinedLocal { line, .. }
            | ExecutionError::NotAnObject { line, .. }
            | ExecutionError::NotIterable { line, .. }
            | ExecutionError::NotPrintable { line, .. } => *line,
        }
    }
}

/// Programming-contract violations, raised synchronously and never wrapped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("USAGE: template '{identifier}' needs a virtual path in order to be refreshed")]
    RefreshWithoutVirtualPath { identifier: String },

    #[error("USAGE: template '{identifier}' needs a virtual path in order to be rerendered")]
    RerenderWithoutVirtualPath { identifier: String },

    #[error("USAGE: source of template '{identifier}' was discarded before compilation")]
    SourceDiscarded { identifier: String },
}

pub type Result<T> = std::result::Result<T, ViewError>;
