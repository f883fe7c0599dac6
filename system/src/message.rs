use serde::{Deserialize, Deserializer, Serialize};

use crate::error::FrameError;

/// Host-assigned handle of one transport connection. Unlike `SessionId`, it is never
/// shown to clients.
pub type ConnectionId = u32;

/// Client-chosen participant id, unique per connection for the lifetime of the room.
pub type SessionId = String;

/// Position value meaning "not reported yet". Consumers must not render it.
pub const UNKNOWN_POSITION: f64 = -1.0;

/// Identity and last known pointer position of one participant.
///
/// Coordinates are normalized to the unit interval so that they do not depend on the
/// viewport of whoever reported them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub x: f64,
    pub y: f64,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            x: UNKNOWN_POSITION,
            y: UNKNOWN_POSITION,
        }
    }

    pub fn has_position(&self) -> bool {
        !(self.x == UNKNOWN_POSITION && self.y == UNKNOWN_POSITION)
    }
}

/// Every frame exchanged over a connection, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WsMessage {
    Join {
        id: SessionId,
    },
    Quit {
        id: SessionId,
    },
    Move {
        /// Ignored on input, the coordinator stamps the sender's id.
        #[serde(default, deserialize_with = "nullable_id")]
        id: SessionId,
        x: f64,
        y: f64,
    },
    Message {
        #[serde(rename = "data", alias = "text")]
        text: String,
    },
    GetCursors,
    GetCursorsResponse {
        sessions: Vec<Session>,
    },
}

/// Reads an absent or `null` id as the empty id.
fn nullable_id<'de, D>(deserializer: D) -> Result<SessionId, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<SessionId>::deserialize(deserializer)?.unwrap_or_default())
}

impl WsMessage {
    pub fn from_frame(frame: &str) -> Result<Self, FrameError> {
        serde_json::from_str(frame).map_err(FrameError::Malformed)
    }

    pub fn to_frame(&self) -> Result<String, FrameError> {
        serde_json::to_string(self).map_err(FrameError::Unserializable)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WsMessage::Join { .. } => "join",
            WsMessage::Quit { .. } => "quit",
            WsMessage::Move { .. } => "move",
            WsMessage::Message { .. } => "message",
            WsMessage::GetCursors => "get-cursors",
            WsMessage::GetCursorsResponse { .. } => "get-cursors-response",
        }
    }
}
