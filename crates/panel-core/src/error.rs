//! Error types for the panel.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a node.
#[derive(Debug, Error)]
pub enum Error {
    /// A transport failure or an error payload returned by the node API.
    #[error("{method} {path} failed: {message}")]
    RemoteCallFailed {
        /// HTTP method of the failed call.
        method: String,
        /// Request path as given by the caller, before any relay rewrite.
        path: String,
        /// Best available human-readable message.
        message: String,
    },

    /// A wait deadline elapsed before the operation succeeded.
    #[error("timed out after {}ms: {last_error}", .timeout.as_millis())]
    Timeout {
        /// The deadline that elapsed.
        timeout: Duration,
        /// Message of the last observed failure.
        last_error: String,
    },

    /// Peer address is not of the form `pubkey@host`.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// No live channel matches the requested identifier.
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    /// A polled condition does not hold yet; retried until a deadline.
    #[error("{0}")]
    NotReady(String),

    /// Channel point is not of the form `txid:vout`.
    #[error("invalid channel point: {0}")]
    InvalidChannelPoint(String),

    /// Channel status label outside the known vocabulary.
    #[error("invalid channel status: {0}")]
    InvalidChannelStatus(String),

    /// Amount cannot be expressed in millisatoshis.
    #[error("invalid amount: {0} sats")]
    InvalidAmount(u64),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a [`Error::RemoteCallFailed`].
    pub fn remote(
        method: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RemoteCallFailed {
            method: method.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a [`Error::Timeout`].
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
