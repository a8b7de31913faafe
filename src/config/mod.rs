//! Optional TOML config file, merged under CLI arguments.

use crate::matching::{
    JaccardScorer, RankOptions, ScoringStrategy, ScoringWeights, TierThresholds, WeightedScorer,
};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,

    // Feature configs
    pub matching: Option<MatchingConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MatchingConfig {
    /// Scoring strategy: "weighted" or "jaccard".
    pub strategy: String,
    pub shared_artists_weight: f64,
    pub shared_genres_weight: f64,
    pub audio_similarity_weight: f64,
    pub taste_diversity_weight: f64,
    pub discovery_weight: f64,
    pub discovery_baseline: f64,
    pub high_tier_threshold: u8,
    pub medium_tier_threshold: u8,
    pub discover_limit: usize,
    pub discover_min_score: u8,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        let weights = ScoringWeights::default();
        let tiers = TierThresholds::default();
        let options = RankOptions::default();
        MatchingConfig {
            strategy: "weighted".to_string(),
            shared_artists_weight: weights.shared_artists,
            shared_genres_weight: weights.shared_genres,
            audio_similarity_weight: weights.audio_similarity,
            taste_diversity_weight: weights.taste_diversity,
            discovery_weight: weights.discovery,
            discovery_baseline: weights.discovery_baseline,
            high_tier_threshold: tiers.high,
            medium_tier_threshold: tiers.medium,
            discover_limit: options.limit,
            discover_min_score: options.min_score,
        }
    }
}

impl MatchingConfig {
    pub fn build_strategy(&self) -> Result<Box<dyn ScoringStrategy>> {
        match self.strategy.as_str() {
            "weighted" => Ok(Box::new(WeightedScorer::new(ScoringWeights {
                shared_artists: self.shared_artists_weight,
                shared_genres: self.shared_genres_weight,
                audio_similarity: self.audio_similarity_weight,
                taste_diversity: self.taste_diversity_weight,
                discovery: self.discovery_weight,
                discovery_baseline: self.discovery_baseline,
            }))),
            "jaccard" => Ok(Box::new(JaccardScorer::default())),
            other => bail!("Unknown scoring strategy {}", other),
        }
    }

    pub fn rank_options(&self) -> RankOptions {
        RankOptions {
            limit: self.discover_limit,
            min_score: self.discover_min_score,
            tiers: TierThresholds {
                high: self.high_tier_threshold,
                medium: self.medium_tier_threshold,
            },
        }
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
