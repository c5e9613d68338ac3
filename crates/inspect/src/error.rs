use ferroscope_reflect::ReflectError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, InspectError>;

#[derive(Error, Debug)]
pub enum InspectError {
    #[error(transparent)]
    Reflect(#[from] ReflectError),

    #[error("invalid filter pattern: {0}")]
    BadFilter(#[from] regex::Error),

    #[error("value of type {actual} is not assignable to {expected}")]
    Incompatible { expected: String, actual: String },

    #[error("{0}")]
    InvalidTarget(String),
}

/// Signal that the user aborted a value-entry or selection step. Unwinds
/// only the pending edit/invoke action; the tree is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canceled;
