use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::views::clock;

/// Numeric strings are folded into `Int` so `"1"` from the relay matches `1` from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged, from = "RawUserId")]
pub enum UserId {
    Int(i64),
    Str(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUserId {
    Int(i64),
    Str(String),
}

impl From<RawUserId> for UserId {
    fn from(raw: RawUserId) -> Self {
        match raw {
            RawUserId::Int(id) => UserId::Int(id),
            RawUserId::Str(id) => UserId::from(id.as_str()),
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Int(id) => write!(f, "{id}"),
            UserId::Str(id) => f.write_str(id),
        }
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        UserId::Int(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        match id.parse::<i64>() {
            Ok(id) => UserId::Int(id),
            Err(_) => UserId::Str(id.to_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub name: String,
}

/// A row of `GET /api/messages/{peer}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryMessage {
    pub text: String,
    pub sender_username: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub timestamp: String,
    pub is_own: bool,
}

/// Payload of the relay's `receive_message` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IncomingMessage {
    pub sender_id: UserId,
    pub message: String,
    pub sender_name: String,
    #[serde(default)]
    pub sender_username: Option<String>,
    pub timestamp: String,
}

/// Payload of the relay's `message_sent` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SentAck {
    pub message: String,
    pub receiver_id: UserId,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Author {
    Own,
    Peer { name: String },
}

impl Author {
    pub fn display_name(&self) -> &str {
        match self {
            Author::Own => "You",
            Author::Peer { name } => name,
        }
    }
}

/// A message as the conversation view renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub body: String,
    pub author: Author,
    pub sent_at: Option<OffsetDateTime>,
    pub correlation: Option<Uuid>,
}

impl ChatMessage {
    pub fn own(body: impl Into<String>, sent_at: OffsetDateTime, correlation: Uuid) -> Self {
        ChatMessage {
            body: body.into(),
            author: Author::Own,
            sent_at: Some(sent_at),
            correlation: Some(correlation),
        }
    }

    pub fn is_own(&self) -> bool {
        self.author == Author::Own
    }
}

impl From<HistoryMessage> for ChatMessage {
    fn from(msg: HistoryMessage) -> Self {
        let author = if msg.is_own {
            Author::Own
        } else {
            Author::Peer { name: msg.sender_name.unwrap_or(msg.sender_username) }
        };

        ChatMessage {
            sent_at: clock::parse_timestamp(&msg.timestamp),
            body: msg.text,
            author,
            correlation: None,
        }
    }
}

impl From<IncomingMessage> for ChatMessage {
    fn from(msg: IncomingMessage) -> Self {
        ChatMessage {
            sent_at: clock::parse_timestamp(&msg.timestamp),
            body: msg.message,
            author: Author::Peer { name: msg.sender_name },
            correlation: None,
        }
    }
}
