//! Identity types for displays, playlists, items and content

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate common ID type implementations
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name::new(s)
            }
        }
    };
}

id_type!(
    /// Stable identifier of a display, as assigned by the admin side
    DisplayId
);

id_type!(
    /// Identifier of a playlist
    PlaylistId
);

id_type!(
    /// Identifier of a single entry within a playlist
    ItemId
);

id_type!(
    /// Identifier of a piece of uploaded content
    ContentId
);

/// Routing key of a display.
///
/// Slugs are what clients connect with and what the snapshot cache is keyed
/// on. They are compared case-insensitively, so the value is lowercased and
/// trimmed on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DisplaySlug(String);

impl DisplaySlug {
    pub fn new(slug: impl AsRef<str>) -> Self {
        Self(slug.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the slug is usable as a path segment and file stem
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl fmt::Display for DisplaySlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DisplaySlug {
    fn from(s: &str) -> Self {
        DisplaySlug::new(s)
    }
}

impl From<String> for DisplaySlug {
    fn from(s: String) -> Self {
        DisplaySlug::new(s)
    }
}

impl From<DisplaySlug> for String {
    fn from(slug: DisplaySlug) -> Self {
        slug.0
    }
}
