use super::models::{Match, MatchStatus};
use thiserror::Error;

/// Errors that can occur in the matching and chat core. All variants except
/// `Store` are expected, recoverable, and carry enough structure for the
/// caller to render a specific message.
#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("invalid taste profile for {user_id}: {reason}")]
    InvalidProfile { user_id: String, reason: String },

    #[error("user {0} cannot match with themselves")]
    SelfMatch(String),

    #[error("a match already exists for this pair")]
    DuplicateMatch { existing: Match },

    #[error("{0} not found")]
    NotFound(String),

    #[error("user {user_id} is not a participant of {subject}")]
    Forbidden { user_id: String, subject: String },

    #[error("illegal status transition from {from} to {to}")]
    InvalidTransition { from: MatchStatus, to: MatchStatus },

    #[error("match {0} is not accepted, messaging is unavailable")]
    MatchNotAccepted(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl MatchingError {
    pub fn forbidden(user_id: &str, subject: impl Into<String>) -> Self {
        MatchingError::Forbidden {
            user_id: user_id.to_string(),
            subject: subject.into(),
        }
    }
}
