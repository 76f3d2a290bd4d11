//! Unified error type for Roomwatch.

use std::path::PathBuf;

use roomwatch_api::ApiError;
use roomwatch_controller::{ControllerError, ServiceError};
use roomwatch_protocol::ProtocolError;

/// Errors loading a [`WatchConfig`](crate::WatchConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RoomwatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A controller task is gone.
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// A platform collaborator call failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
