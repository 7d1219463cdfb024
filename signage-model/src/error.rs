//! Error types for signage-model

use thiserror::Error;

use crate::{ItemId, PlaylistId};

/// A candidate state was structurally incomplete and had to be repaired.
///
/// These are never surfaced as failures: the payload is normalized and the
/// repair is reported so it can be logged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StaleDataError {
    #[error("playlist {playlist} has no item list, treating as empty")]
    MissingItems { playlist: PlaylistId },

    #[error("item {item} has invalid duration {given:?}, using {floor}s")]
    InvalidDuration {
        item: ItemId,
        given: Option<f64>,
        floor: u32,
    },

    #[error("item {item} has invalid transition duration {given}, using 0s")]
    InvalidTransitionDuration { item: ItemId, given: f64 },
}

/// Errors decoding protocol frames
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Result type for signage-model operations
pub type Result<T> = std::result::Result<T, ModelError>;
