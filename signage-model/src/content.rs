//! Content references and renderer selection

use serde::{Deserialize, Serialize};

use crate::ContentId;

/// What kind of media an item shows, with the locator each kind needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentKind {
    Image {
        url: String,
    },
    Video {
        url: String,
        #[serde(default)]
        muted: bool,
    },
    Pdf {
        url: String,
        /// Page to show; first page when absent
        #[serde(default)]
        page: Option<u32>,
    },
    Youtube {
        video_id: String,
    },
}

/// Presentation-layer component responsible for drawing a content kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Renderer {
    Image,
    Video,
    Document,
    EmbeddedPlayer,
}

impl ContentKind {
    pub fn renderer(&self) -> Renderer {
        match self {
            ContentKind::Image { .. } => Renderer::Image,
            ContentKind::Video { .. } => Renderer::Video,
            ContentKind::Pdf { .. } => Renderer::Document,
            ContentKind::Youtube { .. } => Renderer::EmbeddedPlayer,
        }
    }

    /// URL to hand to a preloader, if the kind has one
    pub fn preload_url(&self) -> Option<&str> {
        match self {
            ContentKind::Image { url } | ContentKind::Video { url, .. } | ContentKind::Pdf { url, .. } => {
                Some(url)
            }
            ContentKind::Youtube { .. } => None,
        }
    }
}

/// Reference from a playlist item to a piece of content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    pub id: ContentId,
    #[serde(flatten)]
    pub kind: ContentKind,
}

impl ContentRef {
    pub fn new(id: impl Into<ContentId>, kind: ContentKind) -> Self {
        Self { id: id.into(), kind }
    }

    pub fn image(id: impl Into<ContentId>, url: impl Into<String>) -> Self {
        Self::new(id, ContentKind::Image { url: url.into() })
    }
}
