//! Error types for the surface core.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("button id {id} is out of range (must be 0-63)")]
    ButtonOutOfRange { id: u32 },

    #[error("bulk update needs {expected} values, got {actual}")]
    BulkLength { expected: usize, actual: usize },

    #[error("{0} is not a valid input policy (toggle, trigger, blink)")]
    UnknownPolicy(String),

    #[error("invalid hardware layout: {0}")]
    InvalidLayout(String),

    #[error("malformed sysex frame: {0}")]
    MalformedFrame(String),
}

pub type Result<T> = std::result::Result<T, SurfaceError>;
