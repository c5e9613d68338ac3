use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReflectError>;

#[derive(Error, Debug)]
pub enum ReflectError {
    #[error("duplicate class registration: {0}")]
    DuplicateClass(String),

    #[error("{0} is not a registered class")]
    NotAClass(String),

    #[error("{0} is not an ancestor of {1}")]
    NotAnAncestor(String, String),

    #[error("unknown operation {0} on {1}")]
    UnknownOperation(String, String),

    #[error("operation {0} takes {expected} arguments, got {actual}", expected = .1, actual = .2)]
    ArityMismatch(String, usize, usize),

    #[error("field access failed: {0}")]
    AccessFailure(String),

    #[error("expected a {expected} value, got {actual}")]
    ValueMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Text-to-value parsing failures. Surfaced at the point of entry; a parse
/// failure never silently falls back to a default value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid {kind} literal: {text:?}")]
    Invalid { kind: &'static str, text: String },

    #[error("unknown character escape: \\{0}")]
    UnknownEscape(char),

    #[error("empty character literal")]
    EmptyChar,

    #[error("no text form for type {0}")]
    NotParseable(String),
}
