//! Error taxonomy shared by the lexer, parser, evaluator and inferencer.
//!
//! Every fallible core operation returns [`EvalResult<T>`]. A single
//! [`RunError`] type carries both compile-time (lex/parse) and run-time
//! failures so the top-level driver can render one diagnostic line
//! regardless of which phase produced it.

use std::fmt;

use strum::Display;

/// Result alias used throughout the core.
pub type EvalResult<T> = Result<T, RunError>;

/// Why a name lookup or declaration failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NameErrorKind {
    /// The name has no binding visible from the current scope.
    NotFound,
    /// The name was already declared in the same scope.
    AlreadyDeclared,
    /// The name is declared `const` and cannot be assigned to.
    Const,
}

/// The kind of failure that occurred, independent of source location.
///
/// Mirrors §7 of the specification one-for-one; this is the `strum`-derived
/// enum of error *names*, paired with the free-form detail carried on
/// [`RunError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    LexError,
    SyntaxError,
    NameError,
    TypeError,
    ArityError,
    IndexError,
    DivideByZero,
    IoError,
    InferenceError,
    /// Not part of the distilled taxonomy: raised when a call chain exceeds
    /// [`crate::options::InterpreterOptions::max_recursion_depth`], so the
    /// tree-walking evaluator fails cleanly instead of overflowing the Rust
    /// stack.
    Recursion,
}

/// A 1-based source position: line, column, and the source id it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodeLoc {
    pub source: String,
    pub line: u32,
    pub col: u32,
}

impl CodeLoc {
    #[must_use]
    pub fn new(source: impl Into<String>, line: u32, col: u32) -> Self {
        Self { source: source.into(), line, col }
    }
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.line, self.col)
    }
}

/// A single error, as described in §7: a kind, an optional source location,
/// and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunError {
    pub kind: ErrorKind,
    pub loc: Option<CodeLoc>,
    pub message: String,
}

impl RunError {
    #[must_use]
    pub fn new(kind: ErrorKind, loc: Option<CodeLoc>, message: impl Into<String>) -> Self {
        Self { kind, loc, message: message.into() }
    }

    pub fn lex(loc: CodeLoc, got: char) -> Self {
        Self::new(ErrorKind::LexError, Some(loc), format!("unrecognized byte {got:?}"))
    }

    pub fn syntax(loc: CodeLoc, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SyntaxError, Some(loc), message)
    }

    pub fn name_not_found(loc: Option<CodeLoc>, name: &str) -> Self {
        Self::new(ErrorKind::NameError, loc, format!("{} '{name}'", NameErrorKind::NotFound))
    }

    pub fn name_already_declared(loc: Option<CodeLoc>, name: &str) -> Self {
        Self::new(ErrorKind::NameError, loc, format!("{} '{name}'", NameErrorKind::AlreadyDeclared))
    }

    pub fn name_const(loc: Option<CodeLoc>, name: &str) -> Self {
        Self::new(ErrorKind::NameError, loc, format!("{} '{name}'", NameErrorKind::Const))
    }

    pub fn type_error(loc: Option<CodeLoc>, op: &str, operand_types: &[&str]) -> Self {
        Self::new(
            ErrorKind::TypeError,
            loc,
            format!("unsupported operand type(s) for {op}: {}", operand_types.join(", ")),
        )
    }

    pub fn arity(loc: Option<CodeLoc>, callee: &str, expected: i32, given: usize) -> Self {
        Self::new(
            ErrorKind::ArityError,
            loc,
            format!("{callee} takes {expected} argument(s), {given} given"),
        )
    }

    pub fn index(loc: Option<CodeLoc>, length: usize, index: i64) -> Self {
        Self::new(ErrorKind::IndexError, loc, format!("index {index} out of range for length {length}"))
    }

    pub fn divide_by_zero(loc: Option<CodeLoc>) -> Self {
        Self::new(ErrorKind::DivideByZero, loc, "division by zero")
    }

    pub fn io(loc: Option<CodeLoc>, path: &str, reason: impl fmt::Display) -> Self {
        Self::new(ErrorKind::IoError, loc, format!("{path}: {reason}"))
    }

    pub fn inference(context: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InferenceError, None, format!("{context}: {}", message.into()))
    }

    pub fn recursion(loc: Option<CodeLoc>, depth: usize) -> Self {
        Self::new(ErrorKind::Recursion, loc, format!("maximum recursion depth ({depth}) exceeded"))
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = &self.loc {
            write!(f, "{loc}: {}: {}", self.kind, self.message)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for RunError {}
