//! Interpreter error types.
//!
//! Every failure in the interpreter is a `LispError`. Each error maps to a
//! signed status code: positive codes are recoverable (the REPL and the
//! embedding API translate them into the `error` singleton and continue),
//! negative codes are fatal and unwind out of whatever called into the
//! interpreter.

use thiserror::Error;

/// Result alias used throughout the interpreter.
pub type Result<T> = std::result::Result<T, LispError>;

/// All interpreter failures.
///
/// The original nonlocal-exit design (a jump buffer per interpreter) is
/// rendered as ordinary `Result` propagation; nesting host → eval → subr →
/// eval chains each own their `Result` frame, so the save/restore
/// discipline of the jump buffer falls out of the call structure.
#[derive(Debug, Error)]
pub enum LispError {
    /// Reader failure: unmatched delimiter, bad escape, bad literal, bad
    /// sugar split, wrong hash key, malformed dotted pair.
    #[error("parse error: {0}")]
    Parse(String),

    /// A value had the wrong type for an operation, including validation
    /// format mismatches and application of a non-callable.
    #[error("type error: {0}")]
    Type(String),

    /// A callable received the wrong number of arguments.
    #[error("arity error: {0}")]
    Arity(String),

    /// Lookup of a symbol with no binding, or `set!` on one.
    #[error("unbound symbol: {0}")]
    Unbound(String),

    /// Division by zero or integer overflow on the division boundary.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// I/O failure or mid-expression EOF.
    #[error("resource error: {0}")]
    Resource(String),

    /// Evaluation or print recursion exceeded the depth bound.
    #[error("recursion depth exceeded: {0}")]
    Depth(usize),

    /// The asynchronous interrupt flag was set.
    #[error("interrupted by signal")]
    Signal,

    /// `(error n)` was evaluated; the code is carried verbatim. A negative
    /// code is fatal.
    #[error("error raised with code {0}")]
    Thrown(i64),

    /// Internal inconsistency or unrecoverable resource exhaustion.
    #[error("fatal error: {message}")]
    Fatal { code: i64, message: String },
}

impl LispError {
    /// The signed status code of this error. Positive is recoverable,
    /// negative is fatal.
    pub fn code(&self) -> i64 {
        match self {
            LispError::Thrown(n) => *n,
            LispError::Fatal { code, .. } => *code,
            LispError::Signal => 1,
            _ => 1,
        }
    }

    /// True when this error must unwind past the recovery point.
    pub fn is_fatal(&self) -> bool {
        self.code() < 0
    }

    /// A fatal internal-inconsistency error with the conventional code -1.
    pub fn fatal(message: impl Into<String>) -> Self {
        LispError::Fatal {
            code: -1,
            message: message.into(),
        }
    }
}
