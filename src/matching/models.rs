//! Match and scoring data models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a match. `Pending` is the only initial state;
/// `Accepted` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Accepted,
    Rejected,
}

impl MatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Accepted | MatchStatus::Rejected)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Accepted => "accepted",
            MatchStatus::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MatchStatus::Pending),
            "accepted" => Ok(MatchStatus::Accepted),
            "rejected" => Ok(MatchStatus::Rejected),
            other => Err(format!("unknown match status '{}'", other)),
        }
    }
}

/// Contributing sub-scores, each already scaled to 0-100. Informational,
/// the composite `score` is the authoritative value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub shared_artists: f64,
    pub shared_genres: f64,
    pub audio_similarity: f64,
    pub taste_diversity: f64,
    pub discovery: f64,
}

/// Result of scoring two taste profiles against each other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityScore {
    /// Composite score, 0-100.
    pub score: u8,
    pub breakdown: ScoreBreakdown,
}

/// Human-facing score bucket, derived from thresholds and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityTier {
    High,
    Medium,
    Low,
}

/// Score thresholds for the tier buckets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TierThresholds {
    pub high: u8,
    pub medium: u8,
}

impl Default for TierThresholds {
    fn default() -> Self {
        TierThresholds { high: 80, medium: 60 }
    }
}

impl TierThresholds {
    pub fn tier_for(&self, score: u8) -> CompatibilityTier {
        if score >= self.high {
            CompatibilityTier::High
        } else if score >= self.medium {
            CompatibilityTier::Medium
        } else {
            CompatibilityTier::Low
        }
    }
}

/// A persisted pairing between two users. The pair is logically unordered;
/// storage keeps the canonical order `user_a < user_b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub user_a: String,
    pub user_b: String,
    pub score: u8,
    pub breakdown: ScoreBreakdown,
    pub status: MatchStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Match {
    /// Canonical storage order for an unordered pair.
    pub fn canonical_pair(user_x: &str, user_y: &str) -> (String, String) {
        if user_x <= user_y {
            (user_x.to_string(), user_y.to_string())
        } else {
            (user_y.to_string(), user_x.to_string())
        }
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    /// The participant that is not `user_id`.
    pub fn other_participant(&self, user_id: &str) -> &str {
        if self.user_a == user_id {
            &self.user_b
        } else {
            &self.user_a
        }
    }
}
