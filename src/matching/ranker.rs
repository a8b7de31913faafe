//! Candidate ranking for the discovery feed.

use super::error::MatchingError;
use super::models::{CompatibilityTier, ScoreBreakdown, TierThresholds};
use super::scorer::ScoringStrategy;
use crate::taste::TasteProfile;
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

/// Feed options recognized by the ranker.
#[derive(Debug, Clone, Copy)]
pub struct RankOptions {
    /// Caps the result length.
    pub limit: usize,
    /// Drops candidates scoring below this.
    pub min_score: u8,
    pub tiers: TierThresholds,
}

impl Default for RankOptions {
    fn default() -> Self {
        RankOptions {
            limit: 20,
            min_score: 0,
            tiers: TierThresholds::default(),
        }
    }
}

/// One entry of the discovery feed.
#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    pub profile: TasteProfile,
    pub score: u8,
    pub breakdown: ScoreBreakdown,
    pub tier: CompatibilityTier,
}

/// Scores every eligible candidate in `pool` against `requester` and returns
/// the feed, descending by score with a user-id tie-break so ordering is
/// reproducible for a fixed input snapshot.
///
/// Excluded from the pool: the requester themselves and every user in
/// `existing_relations` (any user already in a match with the requester,
/// regardless of status). Candidates whose snapshot fails scoring are
/// skipped, never fatal to the feed.
pub fn rank_candidates(
    requester: &TasteProfile,
    pool: &[TasteProfile],
    existing_relations: &HashSet<String>,
    strategy: &dyn ScoringStrategy,
    options: &RankOptions,
) -> Result<Vec<RankedCandidate>, MatchingError> {
    // Surface the requester's own malformed snapshot as an error instead of
    // silently returning an empty feed.
    requester
        .validate()
        .map_err(|reason| MatchingError::InvalidProfile {
            user_id: requester.user_id.clone(),
            reason,
        })?;

    let mut ranked: Vec<RankedCandidate> = Vec::new();
    for candidate in pool {
        if candidate.user_id == requester.user_id
            || existing_relations.contains(&candidate.user_id)
        {
            continue;
        }
        let scored = match strategy.score(requester, candidate) {
            Ok(scored) => scored,
            Err(err) => {
                warn!(
                    "Skipping candidate {} in feed for {}: {}",
                    candidate.user_id, requester.user_id, err
                );
                continue;
            }
        };
        if scored.score < options.min_score {
            continue;
        }
        ranked.push(RankedCandidate {
            profile: candidate.clone(),
            score: scored.score,
            breakdown: scored.breakdown,
            tier: options.tiers.tier_for(scored.score),
        });
    }

    ranked.sort_by(|x, y| {
        y.score
            .cmp(&x.score)
            .then_with(|| x.profile.user_id.cmp(&y.profile.user_id))
    });
    ranked.truncate(options.limit);
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::scorer::WeightedScorer;
    use crate::taste::{AudioStats, TopArtist};

    fn profile(user_id: &str, artist_ids: &[&str], genres: &[&str]) -> TasteProfile {
        TasteProfile {
            user_id: user_id.to_string(),
            top_artists: artist_ids
                .iter()
                .map(|id| TopArtist {
                    id: id.to_string(),
                    name: id.to_string(),
                    genres: vec![],
                })
                .collect(),
            top_genres: genres.iter().map(|g| g.to_string()).collect(),
            audio_stats: AudioStats::default(),
        }
    }

    fn rank(
        requester: &TasteProfile,
        pool: &[TasteProfile],
        relations: &[&str],
        options: RankOptions,
    ) -> Vec<RankedCandidate> {
        let relations: HashSet<String> = relations.iter().map(|s| s.to_string()).collect();
        rank_candidates(requester, pool, &relations, &WeightedScorer::default(), &options)
            .unwrap()
    }

    #[test]
    fn excludes_requester_and_existing_relations() {
        let requester = profile("u1", &["x"], &["rock"]);
        let pool = vec![
            profile("u1", &["x"], &["rock"]),
            profile("u2", &["x"], &["rock"]),
            profile("u3", &["x"], &["rock"]),
        ];

        let feed = rank(&requester, &pool, &["u3"], RankOptions::default());
        let ids: Vec<&str> = feed.iter().map(|c| c.profile.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u2"]);
    }

    #[test]
    fn orders_descending_with_id_tie_break() {
        let requester = profile("u1", &["x", "y"], &["rock", "indie"]);
        let pool = vec![
            // u4 and u3 tie exactly, u2 scores higher.
            profile("u4", &["x"], &["rock"]),
            profile("u3", &["x"], &["rock"]),
            profile("u2", &["x", "y"], &["rock", "indie"]),
        ];

        let feed = rank(&requester, &pool, &[], RankOptions::default());
        let ids: Vec<&str> = feed.iter().map(|c| c.profile.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u2", "u3", "u4"]);
    }

    #[test]
    fn two_runs_over_the_same_snapshot_agree() {
        let requester = profile("u1", &["x", "y"], &["rock"]);
        let pool: Vec<TasteProfile> = (2..30)
            .map(|i| profile(&format!("u{:02}", i), &["x"], &["rock"]))
            .collect();

        let first = rank(&requester, &pool, &[], RankOptions::default());
        let second = rank(&requester, &pool, &[], RankOptions::default());
        let first_ids: Vec<&str> = first.iter().map(|c| c.profile.user_id.as_str()).collect();
        let second_ids: Vec<&str> = second.iter().map(|c| c.profile.user_id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[test]
    fn respects_limit_and_min_score() {
        let requester = profile("u1", &["x"], &["rock"]);
        let mut pool: Vec<TasteProfile> = (2..10)
            .map(|i| profile(&format!("u{}", i), &["x"], &["rock"]))
            .collect();
        pool.push(profile("u99", &["nope"], &["polka"]));

        let options = RankOptions {
            limit: 3,
            min_score: 50,
            ..RankOptions::default()
        };
        let feed = rank(&requester, &pool, &[], options);
        assert_eq!(feed.len(), 3);
        assert!(feed.iter().all(|c| c.score >= 50));
        assert!(feed.iter().all(|c| c.profile.user_id != "u99"));
    }

    #[test]
    fn attaches_tier_buckets() {
        let requester = profile("u1", &["x", "y"], &["rock", "indie"]);
        let pool = vec![
            profile("u2", &["x", "y"], &["rock", "indie"]), // full overlap
            profile("u3", &["z"], &["polka"]),              // nothing shared
        ];

        let feed = rank(&requester, &pool, &[], RankOptions::default());
        assert_eq!(feed[0].tier, CompatibilityTier::High);
        assert_eq!(feed[1].tier, CompatibilityTier::Low);
    }

    #[test]
    fn malformed_candidate_is_skipped_not_fatal() {
        let requester = profile("u1", &["x"], &["rock"]);
        let mut broken = profile("u2", &["x"], &["rock"]);
        broken.audio_stats.valence = Some(4.2);
        let pool = vec![broken, profile("u3", &["x"], &["rock"])];

        let feed = rank(&requester, &pool, &[], RankOptions::default());
        let ids: Vec<&str> = feed.iter().map(|c| c.profile.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u3"]);
    }

    #[test]
    fn malformed_requester_is_an_error() {
        let mut requester = profile("u1", &["x"], &["rock"]);
        requester.audio_stats.energy = Some(-1.0);
        let pool = vec![profile("u2", &["x"], &["rock"])];
        let relations = HashSet::new();

        let result = rank_candidates(
            &requester,
            &pool,
            &relations,
            &WeightedScorer::default(),
            &RankOptions::default(),
        );
        assert!(matches!(result, Err(MatchingError::InvalidProfile { .. })));
    }
}
