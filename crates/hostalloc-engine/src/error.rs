//! Engine error types.

use thiserror::Error;

/// Errors that abort an allocation request.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("state for plugin {0} is poisoned")]
    StatePoisoned(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
