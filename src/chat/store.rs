//! Message storage trait

use super::models::{ConversationSummary, Message, MessageBody};
use anyhow::Result;

pub trait MessageStore: Send + Sync {
    /// Append a message to a match's log, assigning the next `seq` and a
    /// non-decreasing `created_at` inside one transaction. Returns the
    /// stored message.
    fn append_message(&self, match_id: &str, sender_id: &str, body: MessageBody)
        -> Result<Message>;

    fn get_message(&self, message_id: &str) -> Result<Option<Message>>;

    /// Chronological (oldest first), capped at `limit`.
    fn messages_for_match(&self, match_id: &str, limit: usize) -> Result<Vec<Message>>;

    /// Marks every message in the match not sent by `reader_id` as read.
    /// Returns the number of messages flipped.
    fn mark_read(&self, match_id: &str, reader_id: &str) -> Result<usize>;

    /// Deletes a single message. Returns whether a row existed.
    fn delete_message(&self, message_id: &str) -> Result<bool>;

    /// The conversations projection: one row per match `user_id`
    /// participates in, with the latest message and counts.
    fn conversations_for_user(&self, user_id: &str) -> Result<Vec<ConversationSummary>>;
}
