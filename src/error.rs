//! Error types.
//!
//! Compile-time and evaluation-time failures are kept in separate types:
//! a `CompileError` is captured once per rule when a script is loaded, an
//! `EvalError` is raised by one rule against one item and never leaves the
//! rule set's scan.

use thiserror::Error;

fn format_position(position: &Option<usize>) -> String {
    match position {
        Some(p) => format!(" (at index {})", p),
        None => String::new(),
    }
}

/// A rule could not be compiled.
///
/// # Examples
///
/// ```rust
/// use itemfilter::CompileError;
///
/// let err = CompileError::at("Unknown identifier 'Foo'", 4);
/// assert_eq!(err.to_string(), "Unknown identifier 'Foo' (at index 4)");
/// ```
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message}{}", format_position(.position))]
pub struct CompileError {
    /// Human-readable description.
    pub message: String,
    /// Character offset into the compiled rule text, when known.
    pub position: Option<usize>,
}

impl CompileError {
    /// Create an error pointing at a character offset.
    pub fn at(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position: Some(position),
        }
    }

    /// Create an error without position information.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
        }
    }
}

/// A compiled predicate failed while running against an item.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    /// Integer division or remainder by zero.
    #[error("Attempted to divide by zero")]
    DivideByZero,

    /// A list index outside of `0..len`.
    #[error("Index {index} was out of range for a sequence of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    /// Two arguments that must line up did not.
    ///
    /// Raised for example by `ModWeightedStatSum` when the names and
    /// weights arrays differ in length.
    #[error("{what}: expected matching lengths, got {left} and {right}")]
    LengthMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },

    /// `First()` on an empty sequence.
    #[error("Sequence contains no elements")]
    EmptySequence,

    /// A value did not have the shape the compiled tree expected.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
}

/// Errors surfaced by the filter loading API.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),
}
