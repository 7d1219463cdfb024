//! # signage-model
//!
//! Data model and wire protocol shared by the signage-sync crates.
//!
//! - [`Display`] and [`Playlist`] are immutable snapshots owned by the admin
//!   side.
//! - [`PlaylistPayload`] is the loosely shaped form those snapshots arrive
//!   in; [`PlaylistPayload::normalize`] repairs it.
//! - [`InboundMessage`] / [`OutboundMessage`] are the push channel frames.

mod content;
mod display;
mod error;
mod id_types;
mod message;
mod overlay;
mod playlist;

pub use content::{ContentKind, ContentRef, Renderer};
pub use display::Display;
pub use error::{ModelError, Result, StaleDataError};
pub use id_types::{ContentId, DisplayId, DisplaySlug, ItemId, PlaylistId};
pub use message::{
    EmergencyScope, FullState, InboundMessage, OutboundMessage, PlaybackState, RemoteCommand,
    StatusReport, ViewRecord,
};
pub use overlay::{ClockFormat, ClockOverlay, ClockPosition, ClockSize};
pub use playlist::{
    FitMode, ItemStyle, Playlist, PlaylistItem, PlaylistItemPayload, PlaylistPayload, Transition,
    TransitionKind, TransitionPayload, MIN_DWELL_SECS,
};

/// Treats an explicit `null` the same as a missing field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    use serde::Deserialize;
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
