//! Match storage trait

use crate::matching::{Match, MatchStatus};
use anyhow::Result;

/// Outcome of the atomic insert: either the row went in, or the uniqueness
/// constraint on the canonical pair fired and the existing row is returned
/// so the caller can recover.
#[derive(Debug)]
pub enum MatchInsert {
    Created,
    Conflict(Match),
}

pub trait MatchStore: Send + Sync {
    /// Insert a new match as a single atomic operation. Detecting an
    /// existing row for the same unordered pair is the storage layer's job
    /// (unique constraint), not a check-then-insert in the caller.
    fn insert_match(&self, m: &Match) -> Result<MatchInsert>;

    fn get_match(&self, match_id: &str) -> Result<Option<Match>>;

    /// Looks the pair up in canonical order; argument order does not matter.
    fn get_match_for_pair(&self, user_x: &str, user_y: &str) -> Result<Option<Match>>;

    /// Every user that shares a match (any status) with `user_id`.
    fn related_user_ids(&self, user_id: &str) -> Result<Vec<String>>;

    /// Transition a pending match. Returns the updated row, or None when the
    /// match was not pending anymore (the caller decides what that means).
    fn update_status_if_pending(
        &self,
        match_id: &str,
        new_status: MatchStatus,
    ) -> Result<Option<Match>>;

    /// Deletes the match; messages cascade. Returns whether a row existed.
    fn delete_match(&self, match_id: &str) -> Result<bool>;

    fn matches_for_user(&self, user_id: &str) -> Result<Vec<Match>>;
}
