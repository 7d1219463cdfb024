//! Playlists and their items
//!
//! [`PlaylistPayload`] is what arrives over the wire or from a poll; it may be
//! structurally incomplete. [`PlaylistPayload::normalize`] turns it into a
//! [`Playlist`] that upholds the engine's invariants and reports every repair
//! it had to make.

use serde::{Deserialize, Serialize};

use crate::error::StaleDataError;
use crate::{ContentRef, ItemId, PlaylistId};

/// Lowest dwell time an item can have, in seconds
pub const MIN_DWELL_SECS: u32 = 1;

/// Visual transition into an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum TransitionKind {
    Cut,
    #[default]
    Fade,
    Slide,
    Wipe,
    Zoom,
    Flip,
}

impl TransitionKind {
    /// Relative rendering cost; higher is more expensive
    pub fn complexity(self) -> u8 {
        match self {
            TransitionKind::Cut => 0,
            TransitionKind::Fade => 1,
            TransitionKind::Slide | TransitionKind::Wipe => 2,
            TransitionKind::Zoom | TransitionKind::Flip => 3,
        }
    }
}

impl From<String> for TransitionKind {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "cut" | "none" => TransitionKind::Cut,
            "slide" | "slide-left" | "slide-right" => TransitionKind::Slide,
            "wipe" => TransitionKind::Wipe,
            "zoom" => TransitionKind::Zoom,
            "flip" => TransitionKind::Flip,
            _ => TransitionKind::Fade,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transition {
    pub kind: TransitionKind,
    /// Seconds
    pub duration: f64,
}

impl Transition {
    pub fn new(kind: TransitionKind, duration: f64) -> Self {
        Self { kind, duration }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    Contain,
    Cover,
    Fill,
}

/// Optional per-item presentation hints
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemStyle {
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub fit: Option<FitMode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub id: ItemId,
    pub content: ContentRef,
    pub position: u32,
    /// Dwell time in whole seconds, never below [`MIN_DWELL_SECS`].
    ///
    /// Fractional wire values are rounded to the nearest second, so two
    /// payloads that differ only below that resolution are structurally equal.
    pub duration: u32,
    pub transition: Transition,
    #[serde(default)]
    pub style: ItemStyle,
}

impl PlaylistItem {
    pub fn new(id: impl Into<ItemId>, content: ContentRef, duration: u32) -> Self {
        Self {
            id: id.into(),
            content,
            position: 0,
            duration: duration.max(MIN_DWELL_SECS),
            transition: Transition::default(),
            style: ItemStyle::default(),
        }
    }

    pub fn with_position(mut self, position: u32) -> Self {
        self.position = position;
        self
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition = transition;
        self
    }

    /// Compares the fields that matter for playback. Styling is not compared.
    pub fn same_structure(&self, other: &PlaylistItem) -> bool {
        self.id == other.id
            && self.content == other.content
            && self.position == other.position
            && self.duration == other.duration
            && self.transition.kind == other.transition.kind
            && self.transition.duration == other.transition.duration
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    #[serde(default)]
    pub name: String,
    pub items: Vec<PlaylistItem>,
}

impl Playlist {
    pub fn new(id: impl Into<PlaylistId>, items: Vec<PlaylistItem>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, index: usize) -> Option<&PlaylistItem> {
        self.items.get(index)
    }

    /// Structural equality: id, length, and every positional item
    pub fn same_structure(&self, other: &Playlist) -> bool {
        self.id == other.id
            && self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(&other.items)
                .all(|(a, b)| a.same_structure(b))
    }
}

// ============================================================================
// Wire payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransitionPayload {
    #[serde(default)]
    pub kind: Option<TransitionKind>,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItemPayload {
    pub id: ItemId,
    pub content: ContentRef,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub transition: Option<TransitionPayload>,
    #[serde(default)]
    pub style: Option<ItemStyle>,
}

/// Playlist as delivered; `items` may be missing or `null`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistPayload {
    pub id: PlaylistId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub items: Option<Vec<PlaylistItemPayload>>,
}

impl PlaylistPayload {
    /// Normalize into a [`Playlist`], collecting the repairs that were made.
    ///
    /// Item order is kept exactly as delivered; `position` is only filled in
    /// from the sequence index when it is missing.
    pub fn normalize(self) -> (Playlist, Vec<StaleDataError>) {
        let mut repairs = Vec::new();

        let raw_items = match self.items {
            Some(items) => items,
            None => {
                repairs.push(StaleDataError::MissingItems {
                    playlist: self.id.clone(),
                });
                Vec::new()
            }
        };

        let items = raw_items
            .into_iter()
            .enumerate()
            .map(|(index, raw)| normalize_item(index, raw, &mut repairs))
            .collect();

        let playlist = Playlist {
            id: self.id,
            name: self.name.unwrap_or_default(),
            items,
        };
        (playlist, repairs)
    }
}

impl From<&Playlist> for PlaylistPayload {
    fn from(playlist: &Playlist) -> Self {
        Self {
            id: playlist.id.clone(),
            name: Some(playlist.name.clone()),
            items: Some(
                playlist
                    .items
                    .iter()
                    .map(|item| PlaylistItemPayload {
                        id: item.id.clone(),
                        content: item.content.clone(),
                        position: Some(item.position),
                        duration: Some(f64::from(item.duration)),
                        transition: Some(TransitionPayload {
                            kind: Some(item.transition.kind),
                            duration: Some(item.transition.duration),
                        }),
                        style: Some(item.style.clone()),
                    })
                    .collect(),
            ),
        }
    }
}

fn normalize_item(
    index: usize,
    raw: PlaylistItemPayload,
    repairs: &mut Vec<StaleDataError>,
) -> PlaylistItem {
    let duration = match raw.duration {
        Some(secs) if secs.is_finite() && secs >= f64::from(MIN_DWELL_SECS) => {
            secs.round().min(f64::from(u32::MAX)) as u32
        }
        Some(secs) if secs.is_finite() && secs > 0.0 => MIN_DWELL_SECS,
        other => {
            repairs.push(StaleDataError::InvalidDuration {
                item: raw.id.clone(),
                given: other,
                floor: MIN_DWELL_SECS,
            });
            MIN_DWELL_SECS
        }
    };

    let transition = raw.transition.unwrap_or_default();
    let transition_duration = match transition.duration {
        Some(secs) if secs.is_finite() && secs >= 0.0 => secs,
        None => 0.0,
        Some(secs) => {
            repairs.push(StaleDataError::InvalidTransitionDuration {
                item: raw.id.clone(),
                given: secs,
            });
            0.0
        }
    };

    PlaylistItem {
        id: raw.id,
        content: raw.content,
        position: raw.position.unwrap_or(index as u32),
        duration,
        transition: Transition {
            kind: transition.kind.unwrap_or_default(),
            duration: transition_duration,
        },
        style: raw.style.unwrap_or_default(),
    }
}
