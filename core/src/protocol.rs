//! Wire types shared by the history endpoint, the post endpoint and the push
//! channel.
//!
//! Inbound push frames are decoded exactly once, here, into [`InboundFrame`].
//! Anything that is neither a `connection_info` event nor a well-formed chat
//! message is rejected with a [`FrameError`] so callers can drop and log it
//! instead of rendering half-populated entries.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Discriminator value of the server metadata event.
pub const CONNECTION_INFO_TYPE: &str = "connection_info";

/// A single chat message as produced by the server. `timestamp` is an opaque
/// display string; the client never generates or parses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    pub username: String,
    pub content: String,
    pub timestamp: String,
}

/// The display identity of a message: author, timestamp and content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageKey {
    pub username: String,
    pub timestamp: String,
    pub content: String,
}

impl ChatMessage {
    pub fn key(&self) -> MessageKey {
        MessageKey {
            username: self.username.clone(),
            timestamp: self.timestamp.clone(),
            content: self.content.clone(),
        }
    }
}

/// Which backend instance is serving the push channel. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub instance_id: String,
    pub availability_zone: String,
}

/// Body of `GET /api/{version}/messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<ChatMessage>,
}

/// Body of `POST /api/{version}/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct PostMessageRequest<'a> {
    pub username: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    ConnectionInfo(InstanceInfo),
    Chat(ChatMessage),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("malformed connection_info frame: {0}")]
    MalformedConnectionInfo(serde_json::Error),

    #[error("frame is not a chat message: {0}")]
    NotAMessage(serde_json::Error),

    #[error("chat message has an empty username")]
    EmptyUsername,
}

#[derive(Deserialize)]
struct ConnectionInfoFrame {
    instance_info: InstanceInfo,
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text).map_err(FrameError::InvalidJson)?;
        let is_connection_info = match &value {
            Value::Object(map) => {
                map.get("type").and_then(Value::as_str) == Some(CONNECTION_INFO_TYPE)
            }
            _ => return Err(FrameError::NotAnObject),
        };

        if is_connection_info {
            let frame: ConnectionInfoFrame =
                serde_json::from_value(value).map_err(FrameError::MalformedConnectionInfo)?;
            return Ok(InboundFrame::ConnectionInfo(frame.instance_info));
        }

        let message: ChatMessage =
            serde_json::from_value(value).map_err(FrameError::NotAMessage)?;
        if message.username.is_empty() {
            return Err(FrameError::EmptyUsername);
        }
        Ok(InboundFrame::Chat(message))
    }
}
