//! Error types for the meshroute environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The completion channel was closed before every task settled
    #[error("Completion channel closed: {0}")]
    ChannelClosed(String),
}

impl EnvError {
    /// Creates a channel-closed error.
    pub fn closed(msg: impl Into<String>) -> Self {
        Self::ChannelClosed(msg.into())
    }
}
