//! Compatibility scoring, candidate ranking and the match lifecycle.

mod error;
mod models;
mod ranker;
mod scorer;
mod service;

pub use error::MatchingError;
pub use models::{
    CompatibilityScore, CompatibilityTier, Match, MatchStatus, ScoreBreakdown, TierThresholds,
};
pub use ranker::{rank_candidates, RankOptions, RankedCandidate};
pub use scorer::{JaccardScorer, ScoringStrategy, ScoringWeights, WeightedScorer};
pub use service::{MatchDetails, MatchmakingService};
