//! Error types shared across the plugin workers.

use thiserror::Error;

/// Errors raised inside a plugin worker.
///
/// Only the transport and the binaries ever see these; dispatchers catch
/// execution failures at the point of execution and convert them into
/// `status: failed` result directives instead of letting them surface.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A message could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Required configuration is missing or unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// The rule file could not be parsed.
    #[error("rule file error: {0}")]
    Rules(String),

    /// The checkpoint cursor could not be read or written.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// The external session handle could not be created or destroyed.
    #[error("session error: {0}")]
    Session(String),

    /// An external provider call failed.
    #[error("provider error: {0}")]
    Provider(String),

    /// Underlying I/O failure on the transport streams.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for PluginError {
    fn from(err: reqwest::Error) -> Self {
        PluginError::Provider(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type PluginResult<T> = Result<T, PluginError>;
