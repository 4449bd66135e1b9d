//! Error types shared across the engine.
//!
//! Nothing here is fatal to the process: gateway failures are reported through
//! a [`NotificationSink`](crate::notify::NotificationSink) and the coordinator
//! keeps running with the last good state on screen.

use std::path::PathBuf;

/// Failure of a single call through a [`RequestGateway`](crate::gateway::RequestGateway).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The request never produced a response (connect, timeout, reset).
    #[error("transport error: {0}")]
    Transport(String),
    /// The device answered with a non-success HTTP status.
    #[error("{operation} rejected by device (HTTP {status})")]
    Status { operation: String, status: u16 },
    /// The response body could not be decoded into the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The request was superseded or its session closed.
    #[error("request cancelled")]
    Cancelled,
}

/// Coarse classification used to decide whether a failure is user-visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Reported through the notification sink; prior state stays displayed.
    TransientNetwork,
    /// Silently discarded.
    Cancelled,
}

impl GatewayError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Cancelled => ErrorClass::Cancelled,
            // A malformed body is reported exactly like a failed request.
            Self::Transport(_) | Self::Status { .. } | Self::Malformed(_) => {
                ErrorClass::TransientNetwork
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.class() == ErrorClass::Cancelled
    }
}

/// Failure to load or validate an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
