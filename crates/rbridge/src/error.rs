//! Error types for the bridge.

use thiserror::Error;

/// Errors raised by marshalling and dispatch.
///
/// `Parse` and `Evaluation` are produced by the runtime and are normally
/// turned into `err` payloads rather than propagated to the peer. `Transport`
/// is fatal to the call in progress.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error("failed to resolve `{component}` in `{name}`")]
    Resolution { name: String, component: String },

    #[error("internal bridge failure: {0}")]
    Transport(String),

    #[error("host error: {0}")]
    Remote(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
