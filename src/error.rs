// Error types for the playback core

use thiserror::Error;

/// Playback-related errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Channel full: {0}")]
    ChannelFull(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PlaybackResult<T> = Result<T, PlaybackError>;
