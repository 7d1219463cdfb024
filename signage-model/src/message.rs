//! Push channel protocol
//!
//! Frames are JSON text, adjacently tagged:
//!
//! ```text
//! {"type": "playlist_update", "payload": {"playlist": {...}}}
//! {"type": "display_control", "payload": {"action": "seek", "index": 2}}
//! {"type": "emergency_stop",  "payload": {"scope": "all"}}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::{Display, DisplayId, DisplaySlug, PlaylistPayload};
use crate::{ContentId, PlaylistId};

/// Complete state for one display, as returned by a pull or pushed on connect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullState {
    pub display: Display,
    /// `None` means no playlist is assigned to the display
    #[serde(default)]
    pub playlist: Option<PlaylistPayload>,
}

/// Remote transport and presentation commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RemoteCommand {
    Play,
    Pause,
    Stop,
    Restart,
    Next,
    Previous,
    Seek { index: usize },
    Reload,
    RefreshContent,
    ClearCache,
}

/// Which displays an emergency stop applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum EmergencyScope {
    All,
    Displays { ids: Vec<String> },
}

impl EmergencyScope {
    pub fn includes(&self, display: &Display) -> bool {
        match self {
            EmergencyScope::All => true,
            EmergencyScope::Displays { ids } => ids.iter().any(|id| display.matches_identity(id)),
        }
    }
}

/// Frames the server pushes to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum InboundMessage {
    FullSnapshot(FullState),
    PlaylistUpdate {
        #[serde(default)]
        playlist: Option<PlaylistPayload>,
    },
    DisplayUpdate {
        display: Display,
    },
    DisplayControl(RemoteCommand),
    EmergencyStop(EmergencyScope),
    HeartbeatAck,
}

impl InboundMessage {
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::FullSnapshot(_) => "full_snapshot",
            InboundMessage::PlaylistUpdate { .. } => "playlist_update",
            InboundMessage::DisplayUpdate { .. } => "display_update",
            InboundMessage::DisplayControl(_) => "display_control",
            InboundMessage::EmergencyStop(_) => "emergency_stop",
            InboundMessage::HeartbeatAck => "heartbeat_ack",
        }
    }
}

/// Playback state as reported to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// No playlist loaded
    #[default]
    Idle,
    Playing,
    Paused,
    /// Paused at the first item
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: PlaybackState,
    pub index: usize,
}

/// One item's time on screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRecord {
    pub display_id: DisplayId,
    pub playlist_id: PlaylistId,
    pub content_id: ContentId,
    /// Seconds actually shown
    pub observed_duration: f64,
    /// Seconds the item was scheduled for
    pub expected_duration: f64,
    pub completed: bool,
    pub skipped: bool,
}

/// Frames a client sends to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum OutboundMessage {
    Register { slug: DisplaySlug },
    Heartbeat,
    Status(StatusReport),
    View(ViewRecord),
}

impl OutboundMessage {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_playlist_update() {
        let text = json!({
            "type": "playlist_update",
            "payload": {"playlist": {"id": "p1", "items": []}}
        })
        .to_string();
        match InboundMessage::decode(&text).unwrap() {
            InboundMessage::PlaylistUpdate { playlist: Some(p) } => {
                assert_eq!(p.id.as_str(), "p1");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_unassigned_playlist() {
        let text = r#"{"type":"playlist_update","payload":{"playlist":null}}"#;
        assert_eq!(
            InboundMessage::decode(text).unwrap(),
            InboundMessage::PlaylistUpdate { playlist: None }
        );
    }

    #[test]
    fn test_decode_seek() {
        let text = r#"{"type":"display_control","payload":{"action":"seek","index":2}}"#;
        assert_eq!(
            InboundMessage::decode(text).unwrap(),
            InboundMessage::DisplayControl(RemoteCommand::Seek { index: 2 })
        );
    }

    #[test]
    fn test_decode_emergency_scopes() {
        let all = r#"{"type":"emergency_stop","payload":{"scope":"all"}}"#;
        assert_eq!(
            InboundMessage::decode(all).unwrap(),
            InboundMessage::EmergencyStop(EmergencyScope::All)
        );

        let some = r#"{"type":"emergency_stop","payload":{"scope":"displays","ids":["lobby","9"]}}"#;
        let InboundMessage::EmergencyStop(scope) = InboundMessage::decode(some).unwrap() else {
            panic!("expected emergency stop");
        };
        assert!(scope.includes(&Display::new("9", "other")));
        assert!(scope.includes(&Display::new("1", "lobby")));
        assert!(!scope.includes(&Display::new("1", "cafe")));
    }

    #[test]
    fn test_decode_unit_variant() {
        let text = r#"{"type":"heartbeat_ack"}"#;
        assert_eq!(InboundMessage::decode(text).unwrap(), InboundMessage::HeartbeatAck);
    }

    #[test]
    fn test_malformed_frame() {
        assert!(InboundMessage::decode(r#"{"type":"launch_missiles"}"#).is_err());
        assert!(InboundMessage::decode("not json").is_err());
    }

    #[test]
    fn test_encode_status() {
        let text = OutboundMessage::Status(StatusReport {
            state: PlaybackState::Paused,
            index: 1,
        })
        .encode()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"type": "status", "payload": {"state": "paused", "index": 1}})
        );
    }
}
