//! Audio pipeline error types

use thiserror::Error;

/// Errors that can occur while building or driving the output graph
///
/// Only `initialize` surfaces these to the caller. Every other operation
/// degrades silently (logged no-op) when the graph is unavailable, so no
/// error ever reaches the playback driver mid-transition.
#[derive(Error, Debug)]
pub enum GraphError {
    /// No audio output devices available
    #[error("No audio output devices found")]
    NoDevices,

    /// Failed to get device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Unsupported sample format
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Operation requires an initialized output context
    #[error("Output graph not initialized")]
    NotInitialized,
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;
