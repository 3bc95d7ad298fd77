//! Wire protocol of the real-time channel.
//!
//! Every frame is a JSON text object with a `type` discriminator and its
//! payload fields alongside it:
//!
//! ```json
//! {"type":"viewer_count_update","streamId":"42","count":17}
//! ```
//!
//! Inbound decoding is two-step: the discriminator is read first, then the
//! payload is decoded into the matching struct. Unrecognized discriminators
//! decode to [`ServerMessage::Unknown`] instead of failing, so a server that
//! adds a message type does not break older clients.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChannelError, Result};

/// Messages the client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinStream { stream_id: String },

    #[serde(rename_all = "camelCase")]
    LeaveStream { stream_id: String },

    #[serde(rename_all = "camelCase")]
    ChatMessage { stream_id: String, message: String },
}

impl ClientMessage {
    pub fn join_stream(stream_id: impl Into<String>) -> Self {
        ClientMessage::JoinStream {
            stream_id: stream_id.into(),
        }
    }

    pub fn leave_stream(stream_id: impl Into<String>) -> Self {
        ClientMessage::LeaveStream {
            stream_id: stream_id.into(),
        }
    }

    pub fn chat(stream_id: impl Into<String>, message: impl Into<String>) -> Self {
        ClientMessage::ChatMessage {
            stream_id: stream_id.into(),
            message: message.into(),
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerCountUpdate {
    pub stream_id: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub stream_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub username: String,
    pub message: String,
    /// Server time in milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftSent {
    pub stream_id: String,
    pub sender_name: String,
    pub gift_name: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// Messages the server sends.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    ViewerCountUpdate(ViewerCountUpdate),
    ChatMessage(ChatMessage),
    GiftSent(GiftSent),
    /// A well-formed frame whose type this client does not know.
    Unknown { kind: String, payload: Value },
}

/// Discriminator of a [`ServerMessage`]; the key of the handler table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerMessageKind {
    ViewerCountUpdate,
    ChatMessage,
    GiftSent,
    Unknown,
}

impl ServerMessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerMessageKind::ViewerCountUpdate => "viewer_count_update",
            ServerMessageKind::ChatMessage => "chat_message",
            ServerMessageKind::GiftSent => "gift_sent",
            ServerMessageKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ServerMessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ServerMessage {
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(ChannelError::MissingType)?;

        match kind.as_str() {
            "viewer_count_update" => Ok(ServerMessage::ViewerCountUpdate(
                serde_json::from_value(value)?,
            )),
            "chat_message" => Ok(ServerMessage::ChatMessage(serde_json::from_value(value)?)),
            "gift_sent" => Ok(ServerMessage::GiftSent(serde_json::from_value(value)?)),
            _ => Ok(ServerMessage::Unknown {
                kind,
                payload: value,
            }),
        }
    }

    pub fn kind(&self) -> ServerMessageKind {
        match self {
            ServerMessage::ViewerCountUpdate(_) => ServerMessageKind::ViewerCountUpdate,
            ServerMessage::ChatMessage(_) => ServerMessageKind::ChatMessage,
            ServerMessage::GiftSent(_) => ServerMessageKind::GiftSent,
            ServerMessage::Unknown { .. } => ServerMessageKind::Unknown,
        }
    }

    /// Stream the message belongs to, if it names one.
    pub fn stream_id(&self) -> Option<&str> {
        match self {
            ServerMessage::ViewerCountUpdate(m) => Some(&m.stream_id),
            ServerMessage::ChatMessage(m) => Some(&m.stream_id),
            ServerMessage::GiftSent(m) => Some(&m.stream_id),
            ServerMessage::Unknown { payload, .. } => {
                payload.get("streamId").and_then(Value::as_str)
            }
        }
    }
}
