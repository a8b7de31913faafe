//! Pluggable compatibility scoring strategies.
//!
//! A strategy turns two taste profiles into a single 0-100 score plus the
//! per-component breakdown. Strategies are pure and deterministic: no I/O,
//! symmetric in their arguments, and tolerant of empty collections.

use super::error::MatchingError;
use super::models::{CompatibilityScore, ScoreBreakdown};
use crate::taste::TasteProfile;
use std::collections::HashSet;

/// A compatibility scoring formula. Fails only on malformed input.
pub trait ScoringStrategy: Send + Sync {
    fn score(
        &self,
        profile_a: &TasteProfile,
        profile_b: &TasteProfile,
    ) -> Result<CompatibilityScore, MatchingError>;

    /// Name used in logs and config.
    fn name(&self) -> &'static str;
}

/// Weights of the five-factor formula. Passed in explicitly so strategies
/// stay swappable and unit-testable in isolation.
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub shared_artists: f64,
    pub shared_genres: f64,
    pub audio_similarity: f64,
    pub taste_diversity: f64,
    pub discovery: f64,
    /// Fixed baseline of the discovery component, 0-100. A placeholder
    /// dimension kept extensible for exploration tuning.
    pub discovery_baseline: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            shared_artists: 0.30,
            shared_genres: 0.25,
            audio_similarity: 0.20,
            taste_diversity: 0.15,
            discovery: 0.10,
            discovery_baseline: 50.0,
        }
    }
}

fn validate(profile: &TasteProfile) -> Result<(), MatchingError> {
    profile
        .validate()
        .map_err(|reason| MatchingError::InvalidProfile {
            user_id: profile.user_id.clone(),
            reason,
        })
}

/// `|a ∩ b| / min(|a|, |b|)` scaled to 0-100, denominator floored at 1.
fn overlap_ratio(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let shared = a.intersection(b).count();
    let denominator = a.len().min(b.len()).max(1);
    shared as f64 / denominator as f64 * 100.0
}

/// `|a ∩ b| / |a ∪ b|` scaled to 0-100; an empty union counts as no overlap.
fn jaccard_ratio(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    shared as f64 / union as f64 * 100.0
}

fn clamp_to_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

/// Default formula: weighted linear combination of shared artists, shared
/// genres, audio-feature similarity, taste diversity and a discovery
/// baseline.
#[derive(Debug, Clone, Default)]
pub struct WeightedScorer {
    pub weights: ScoringWeights,
}

impl WeightedScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        WeightedScorer { weights }
    }
}

impl ScoringStrategy for WeightedScorer {
    fn score(
        &self,
        profile_a: &TasteProfile,
        profile_b: &TasteProfile,
    ) -> Result<CompatibilityScore, MatchingError> {
        validate(profile_a)?;
        validate(profile_b)?;

        let artists_a = profile_a.artist_ids();
        let artists_b = profile_b.artist_ids();
        let genres_a = profile_a.genre_set();
        let genres_b = profile_b.genre_set();

        let shared_artists = overlap_ratio(&artists_a, &artists_b);
        let shared_genres = overlap_ratio(&genres_a, &genres_b);

        // Euclidean distance over the fixed feature vector; the maximum
        // possible distance is 2 (sqrt of 4 unit axes), so d/2 is in [0,1].
        let vec_a = profile_a.audio_stats.feature_vector();
        let vec_b = profile_b.audio_stats.feature_vector();
        let distance = vec_a
            .iter()
            .zip(vec_b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt();
        let audio_similarity = (1.0 - distance / 2.0).max(0.0) * 100.0;

        // Comparable exploration breadth: smaller genre set over larger.
        let larger = genres_a.len().max(genres_b.len());
        let taste_diversity = if larger == 0 {
            0.0
        } else {
            genres_a.len().min(genres_b.len()) as f64 / larger as f64 * 100.0
        };

        let discovery = self.weights.discovery_baseline;

        let breakdown = ScoreBreakdown {
            shared_artists,
            shared_genres,
            audio_similarity,
            taste_diversity,
            discovery,
        };

        let composite = shared_artists * self.weights.shared_artists
            + shared_genres * self.weights.shared_genres
            + audio_similarity * self.weights.audio_similarity
            + taste_diversity * self.weights.taste_diversity
            + discovery * self.weights.discovery;

        Ok(CompatibilityScore {
            score: clamp_to_score(composite),
            breakdown,
        })
    }

    fn name(&self) -> &'static str {
        "weighted"
    }
}

/// Simpler alternative: Jaccard similarity over artist and genre sets only,
/// 70/30 weighted. Audio features and diversity do not contribute.
#[derive(Debug, Clone)]
pub struct JaccardScorer {
    pub artist_weight: f64,
    pub genre_weight: f64,
}

impl Default for JaccardScorer {
    fn default() -> Self {
        JaccardScorer {
            artist_weight: 0.70,
            genre_weight: 0.30,
        }
    }
}

impl ScoringStrategy for JaccardScorer {
    fn score(
        &self,
        profile_a: &TasteProfile,
        profile_b: &TasteProfile,
    ) -> Result<CompatibilityScore, MatchingError> {
        validate(profile_a)?;
        validate(profile_b)?;

        let shared_artists = jaccard_ratio(&profile_a.artist_ids(), &profile_b.artist_ids());
        let shared_genres = jaccard_ratio(&profile_a.genre_set(), &profile_b.genre_set());

        let breakdown = ScoreBreakdown {
            shared_artists,
            shared_genres,
            ..ScoreBreakdown::default()
        };

        let composite =
            shared_artists * self.artist_weight + shared_genres * self.genre_weight;

        Ok(CompatibilityScore {
            score: clamp_to_score(composite),
            breakdown,
        })
    }

    fn name(&self) -> &'static str {
        "jaccard"
    }
}
