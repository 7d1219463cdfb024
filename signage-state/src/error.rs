//! Error types for signage-state

use std::path::PathBuf;

use signage_model::DisplaySlug;
use signage_stream::StreamError;

/// Result type for signage-state operations
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors surfaced by a display session
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// The session task has exited and no longer accepts commands
    #[error("Session for {0} is not running")]
    SessionClosed(DisplaySlug),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Errors from the snapshot cache
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cached snapshot is unreadable: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("No cache directory available on this platform")]
    NoCacheDir,

    /// The slug cannot be used as a file name
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Playback commands that cannot be carried out in the current state.
///
/// These are never fatal: the session logs them at `debug` and carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Index {index} is outside a playlist of {len} items")]
    OutOfRange { index: usize, len: usize },

    #[error("No playlist is assigned")]
    NoContent,
}
