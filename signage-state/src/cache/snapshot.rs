//! Snapshot of what a display last showed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signage_model::{Display, Playlist};

/// Display and playlist as of the last accepted apply.
///
/// `playlist` is `None` when the server had no playlist assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    pub display: Display,
    pub playlist: Option<Playlist>,
    pub saved_at: DateTime<Utc>,
}

impl CachedSnapshot {
    pub fn new(display: Display, playlist: Option<Playlist>) -> Self {
        Self {
            display,
            playlist,
            saved_at: Utc::now(),
        }
    }

    /// Time since the snapshot was written
    pub fn age(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.saved_at)
    }
}
