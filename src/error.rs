//! The crate-wide error taxonomy (§7) and the parser's diagnostic codes.

use crate::base::{Name, TextRange};
use thiserror::Error;

/// Severity of a parser diagnostic. Only `Error` is currently ever
/// produced — `Warning`/`Hint` exist so a host embedding this crate can
/// downgrade a diagnostic without a breaking enum change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Hint,
}

/// Categorised parser error codes, grouped the way `src/parser/errors/
/// codes.rs`'s numeric ranges are: E01xx lexical, E02xx structural,
/// E03xx declarations, E04xx expressions, E05xx module/alias errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    E0101,
    E0102,
    E0201,
    E0202,
    E0301,
    E0302,
    E0401,
    E0402,
    E0501,
    E0502,
    E0901,
}

impl ErrorCode {
    pub fn default_message(self) -> &'static str {
        match self {
            Self::E0101 => "invalid character",
            Self::E0102 => "unterminated string literal",
            Self::E0201 => "missing semicolon",
            Self::E0202 => "unclosed brace",
            Self::E0301 => "missing module declaration",
            Self::E0302 => "invalid module name",
            Self::E0401 => "invalid expression",
            Self::E0402 => "unsupported construct",
            Self::E0501 => "duplicate helper name",
            Self::E0502 => "unknown alias",
            Self::E0901 => "unexpected token",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A single parse-time diagnostic, carrying byte-range location and an
/// optional hint, following the `SyntaxError`/`SyntaxErrorBuilder` pattern
/// in `src/parser/errors/error.rs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub range: TextRange,
    pub code: ErrorCode,
    pub severity: Severity,
    pub hint: Option<String>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, range: TextRange, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            range,
            code,
            severity: Severity::Error,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

/// Errors raised by the metamodel interface (§6): the fixed collaborator
/// contract taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetamodelError {
    #[error("model is read-only")]
    ReadOnlyModel,
    #[error("unknown class '{0}'")]
    UnknownClass(String),
    #[error("unknown feature '{0}' on class '{1}'")]
    UnknownFeature(String, String),
    #[error("wrong kind of value for this operation")]
    WrongKind,
}

/// The unified crate-wide error enum (§7).
///
/// `Navigation` and `VariableNotFound` are the two kinds the rule engine
/// treats as *recoverable* when they occur while evaluating a binding
/// expression (§4.8) — see [`CoreError::is_recoverable`].
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("invalid syntax at {range:?}: {message}")]
    InvalidSyntax { message: String, range: TextRange },

    #[error("unexpected token at {range:?}: {message}")]
    UnexpectedToken { message: String, range: TextRange },

    #[error("missing 'module' declaration")]
    MissingModule,

    #[error("invalid module name '{0}'")]
    InvalidModuleName(String),

    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    #[error("unsupported construct: {0}")]
    UnsupportedConstruct(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("invalid encoding in {0}")]
    InvalidEncoding(String),

    #[error("variable not found: {0}")]
    VariableNotFound(Name),

    #[error("helper not found: {0}")]
    HelperNotFound(Name),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("unsupported operation '{operation}' on {receiver_type}")]
    UnsupportedOperation {
        operation: String,
        receiver_type: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("type error: {0}")]
    TypeError(String),

    #[error("runtime error: {0}")]
    RuntimeError(String),

    #[error("navigation failed: no property '{0}'")]
    Navigation(Name),

    #[error(transparent)]
    Metamodel(#[from] MetamodelError),

    #[error("execution cancelled")]
    Cancelled,
}

impl CoreError {
    /// Whether the rule engine may convert this error into a lazy binding
    /// (§4.8: "A `Navigation` or `VariableNotFound` error raised while
    /// evaluating a binding expression is recoverable").
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CoreError::Navigation(_) | CoreError::VariableNotFound(_))
    }

    pub fn from_syntax_error(err: SyntaxError) -> Self {
        CoreError::InvalidSyntax {
            message: err.message,
            range: err.range,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
