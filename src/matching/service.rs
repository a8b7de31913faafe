//! Matchmaking service: discovery and the match lifecycle state machine.
//!
//! Lifecycle model: direct request/accept. A match request creates a
//! `pending` row scored server-side; either participant then accepts or
//! rejects it, both terminal. A swipe-style "like" in a client maps onto
//! `create_match`, a like-back onto accept.

use super::error::MatchingError;
use super::models::{Match, MatchStatus};
use super::ranker::{rank_candidates, RankOptions, RankedCandidate};
use super::scorer::ScoringStrategy;
use crate::match_store::{MatchInsert, MatchStore};
use crate::taste::{TasteProfile, TasteProfileStore};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// A match plus both participants' profiles, as returned to a participant.
#[derive(Debug, Clone, Serialize)]
pub struct MatchDetails {
    pub match_record: Match,
    /// Profile of `user_a`, when that user has synced one.
    pub profile_a: Option<TasteProfile>,
    /// Profile of `user_b`, when that user has synced one.
    pub profile_b: Option<TasteProfile>,
}

pub struct MatchmakingService {
    taste: Arc<dyn TasteProfileStore>,
    store: Arc<dyn MatchStore>,
    strategy: Box<dyn ScoringStrategy>,
    rank_defaults: RankOptions,
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

impl MatchmakingService {
    pub fn new(
        taste: Arc<dyn TasteProfileStore>,
        store: Arc<dyn MatchStore>,
        strategy: Box<dyn ScoringStrategy>,
        rank_defaults: RankOptions,
    ) -> Self {
        info!("Matchmaking using '{}' scoring strategy", strategy.name());
        MatchmakingService {
            taste,
            store,
            strategy,
            rank_defaults,
        }
    }

    /// The ranked discovery feed for `requester_id`. Users already in any
    /// match with the requester never re-surface, whatever the status.
    pub fn discover(
        &self,
        requester_id: &str,
        limit: Option<usize>,
        min_score: Option<u8>,
    ) -> Result<Vec<RankedCandidate>, MatchingError> {
        let requester = self.taste.get_profile(requester_id)?.ok_or_else(|| {
            MatchingError::NotFound(format!("taste profile for {}", requester_id))
        })?;

        let pool = self.taste.all_profiles()?;
        let relations: HashSet<String> =
            self.store.related_user_ids(requester_id)?.into_iter().collect();

        let options = RankOptions {
            limit: limit.unwrap_or(self.rank_defaults.limit),
            min_score: min_score.unwrap_or(self.rank_defaults.min_score),
            tiers: self.rank_defaults.tiers,
        };
        rank_candidates(&requester, &pool, &relations, self.strategy.as_ref(), &options)
    }

    /// Create a pending match between two users. The score is computed
    /// server-side; the insert is atomic against the unique constraint on
    /// the canonical pair, so concurrent requests for the same pair cannot
    /// produce two rows, only a `DuplicateMatch` carrying the winner.
    pub fn create_match(
        &self,
        requester_id: &str,
        target_id: &str,
    ) -> Result<Match, MatchingError> {
        if requester_id == target_id {
            return Err(MatchingError::SelfMatch(requester_id.to_string()));
        }

        // A user that has never synced scores as an empty profile rather
        // than blocking the request.
        let requester = self
            .taste
            .get_profile(requester_id)?
            .unwrap_or_else(|| TasteProfile::empty(requester_id));
        let target = self
            .taste
            .get_profile(target_id)?
            .unwrap_or_else(|| TasteProfile::empty(target_id));

        let scored = self.strategy.score(&requester, &target)?;

        let (user_a, user_b) = Match::canonical_pair(requester_id, target_id);
        let now = now_unix();
        let m = Match {
            id: uuid::Uuid::new_v4().to_string(),
            user_a,
            user_b,
            score: scored.score,
            breakdown: scored.breakdown,
            status: MatchStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_match(&m)? {
            MatchInsert::Created => {
                info!(
                    "Match {} created for ({}, {}) with score {}",
                    m.id, m.user_a, m.user_b, m.score
                );
                Ok(m)
            }
            MatchInsert::Conflict(existing) => Err(MatchingError::DuplicateMatch { existing }),
        }
    }

    fn load_match_for(&self, match_id: &str, user_id: &str) -> Result<Match, MatchingError> {
        let m = self
            .store
            .get_match(match_id)?
            .ok_or_else(|| MatchingError::NotFound(format!("match {}", match_id)))?;
        if !m.is_participant(user_id) {
            return Err(MatchingError::forbidden(user_id, format!("match {}", match_id)));
        }
        Ok(m)
    }

    /// `pending -> accepted` and `pending -> rejected` are the only legal
    /// transitions; terminal matches never move again.
    pub fn update_status(
        &self,
        match_id: &str,
        new_status: MatchStatus,
        acting_user: &str,
    ) -> Result<Match, MatchingError> {
        let m = self.load_match_for(match_id, acting_user)?;

        if new_status == MatchStatus::Pending || m.status.is_terminal() {
            return Err(MatchingError::InvalidTransition {
                from: m.status,
                to: new_status,
            });
        }

        match self.store.update_status_if_pending(match_id, new_status)? {
            Some(updated) => Ok(updated),
            // The conditional update lost a race against another transition
            None => {
                let current = self.load_match_for(match_id, acting_user)?;
                Err(MatchingError::InvalidTransition {
                    from: current.status,
                    to: new_status,
                })
            }
        }
    }

    /// Every match `user_id` participates in, newest first.
    pub fn list_matches(&self, user_id: &str) -> Result<Vec<Match>, MatchingError> {
        Ok(self.store.matches_for_user(user_id)?)
    }

    /// Participant-only; the match's conversation goes with it.
    pub fn delete_match(&self, match_id: &str, acting_user: &str) -> Result<(), MatchingError> {
        self.load_match_for(match_id, acting_user)?;
        self.store.delete_match(match_id)?;
        info!("Match {} deleted by {}", match_id, acting_user);
        Ok(())
    }

    /// Participant-only view of a match with both profiles and the stored
    /// score breakdown.
    pub fn get_match(
        &self,
        match_id: &str,
        acting_user: &str,
    ) -> Result<MatchDetails, MatchingError> {
        let m = self.load_match_for(match_id, acting_user)?;
        let profile_a = self.taste.get_profile(&m.user_a)?;
        let profile_b = self.taste.get_profile(&m.user_b)?;
        Ok(MatchDetails {
            match_record: m,
            profile_a,
            profile_b,
        })
    }
}
