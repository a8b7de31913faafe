//! Chat data models

use serde::{Deserialize, Serialize};

/// Hard cap on message content length, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Message payload. A tagged variant rather than optional fields, so a
/// song share always carries its track reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    Text { content: String },
    SongShare { content: String, track_id: String },
}

impl MessageBody {
    pub fn content(&self) -> &str {
        match self {
            MessageBody::Text { content } => content,
            MessageBody::SongShare { content, .. } => content,
        }
    }
}

/// A chat message, exclusively owned by its match. `seq` is a per-match
/// monotonic counter assigned at append time; `(match_id, seq)` gives the
/// total order since wall-clock timestamps can collide under concurrent
/// senders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub match_id: String,
    pub sender_id: String,
    pub seq: i64,
    pub body: MessageBody,
    pub created_at: i64,
    pub read: bool,
}

/// One row of the conversations view: a match the user participates in,
/// its most recent message and counts. Derived from the match and message
/// stores on demand, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub match_id: String,
    pub other_user_id: String,
    pub status: crate::matching::MatchStatus,
    pub latest_message: Option<Message>,
    pub total_messages: usize,
    pub unread_count: usize,
}
