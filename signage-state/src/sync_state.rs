//! State held by a display session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signage_model::{Display, DisplaySlug, ItemId, PlaybackState};
use signage_stream::ConnectionStatus;

use crate::adaptor::DeviceClass;
use crate::reconciler::HeldPlaylist;

/// Where an applied state came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Push,
    Poll,
    /// An explicitly requested pull
    Refresh,
    /// The local snapshot cache, while the server was unreachable
    Cache,
}

/// What a session believes about its display, apart from playback position
#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    pub display: Option<Display>,
    pub playlist: HeldPlaylist,
    pub connection: ConnectionStatus,
    pub last_applied_at: Option<DateTime<Utc>>,
    pub applied_from: Option<Provenance>,
}

impl SyncState {
    pub fn new() -> Self {
        Self {
            display: None,
            playlist: HeldPlaylist::Uninitialized,
            connection: ConnectionStatus::Connecting,
            last_applied_at: None,
            applied_from: None,
        }
    }

    pub(crate) fn mark_applied(&mut self, provenance: Provenance) {
        self.last_applied_at = Some(Utc::now());
        self.applied_from = Some(provenance);
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

/// Observable summary of a session, published after every event
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub slug: DisplaySlug,
    pub connection: ConnectionStatus,
    pub display: Option<Display>,
    pub playlist: HeldPlaylist,
    pub playback: PlaybackState,
    pub index: usize,
    pub current_item: Option<ItemId>,
    pub previous_item: Option<ItemId>,
    pub next_item: Option<ItemId>,
    pub applied_from: Option<Provenance>,
    pub last_applied_at: Option<DateTime<Utc>>,
    pub device_class: DeviceClass,
    /// Dwell timers armed so far; unchanged means no timer reset happened
    pub timer_generation: u64,
}

impl SessionStatus {
    pub fn new(slug: DisplaySlug) -> Self {
        Self {
            slug,
            connection: ConnectionStatus::Connecting,
            display: None,
            playlist: HeldPlaylist::Uninitialized,
            playback: PlaybackState::Idle,
            index: 0,
            current_item: None,
            previous_item: None,
            next_item: None,
            applied_from: None,
            last_applied_at: None,
            device_class: DeviceClass::Standard,
            timer_generation: 0,
        }
    }

    /// Whether something can be shown: a playlist with at least one item
    pub fn has_content(&self) -> bool {
        self.playlist.playlist().is_some_and(|p| !p.is_empty())
    }
}
