//! Error taxonomy for the interpreter.
//!
//! Every failure in the core is fatal to the running program: errors carry a
//! kind from the fixed taxonomy plus a rendered message, propagate out via
//! [`RunResult`], and are reported once at the top-level boundary. Nothing is
//! swallowed along the way.

use std::fmt;

use strum::{Display, IntoStaticStr};

/// Result type alias for operations that can fail at runtime.
pub type RunResult<T> = Result<T, Error>;

/// The fixed set of failure classes the interpreter can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum ErrorKind {
    /// Unexpected byte while tokenising input.
    #[strum(serialize = "lex error")]
    Lex,
    /// Unexpected token kind given the parser state.
    #[strum(serialize = "parse error")]
    Parse,
    /// Property absent at the end of a prototype walk.
    #[strum(serialize = "lookup error")]
    Lookup,
    /// Argument type does not satisfy a native function's expectation.
    #[strum(serialize = "type mismatch")]
    TypeMismatch,
    /// A required parameter has neither a binding nor a default.
    #[strum(serialize = "arity mismatch")]
    Arity,
    /// A structural rule of the runtime was broken, e.g. a property-set on a
    /// non-hash site.
    #[strum(serialize = "invariant violation")]
    Invariant,
    /// Allocation exhaustion or an unreadable file.
    #[strum(serialize = "resource error")]
    Resource,
}

/// A fatal interpreter error.
///
/// The message is rendered at the raising site so it can embed positions,
/// names, and type words without the error type carrying them structurally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn lex(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Lex, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn lookup(name: &str) -> Self {
        Self::new(ErrorKind::Lookup, format!("undefined property `{name}`"))
    }

    pub fn type_mismatch(expected: &str, found: &str) -> Self {
        Self::new(
            ErrorKind::TypeMismatch,
            format!("expected {expected}, found {found}"),
        )
    }

    pub fn arity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Arity, message)
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invariant, message)
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resource, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}
