//! Display snapshot

use serde::{Deserialize, Serialize};

use crate::{ClockOverlay, DisplayId, DisplaySlug};

/// Administrative snapshot of a display.
///
/// Owned by the admin side; the engine never mutates one, it only replaces
/// its held copy when a newer snapshot arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Display {
    pub id: DisplayId,
    pub slug: DisplaySlug,
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub name: String,
    /// Declared device class hint. `None` means "detect at runtime".
    #[serde(default)]
    pub low_power: Option<bool>,
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub clock: ClockOverlay,
    /// Set by the admin side to ask the client to reload its content
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub refresh: bool,
}

impl Display {
    pub fn new(id: impl Into<DisplayId>, slug: impl Into<DisplaySlug>) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            name: String::new(),
            low_power: None,
            clock: ClockOverlay::default(),
            refresh: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_low_power(mut self, low_power: bool) -> Self {
        self.low_power = Some(low_power);
        self
    }

    /// Whether an identity from a broadcast target list refers to this display.
    ///
    /// Targets may name either the id or the slug.
    pub fn matches_identity(&self, identity: &str) -> bool {
        self.id.as_str() == identity || self.slug == DisplaySlug::new(identity)
    }
}
