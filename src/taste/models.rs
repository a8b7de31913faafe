//! Taste profile data models

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Number of audio features tracked per profile.
pub const AUDIO_FEATURE_COUNT: usize = 4;

/// Substituted for any audio feature the sync did not provide.
const NEUTRAL_FEATURE: f64 = 0.5;

/// An artist entry in a user's top-artists list. Insertion order is rank
/// order, most-preferred first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopArtist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Normalized audio feature statistics, each in [0,1] when present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioStats {
    pub danceability: Option<f64>,
    pub energy: Option<f64>,
    pub valence: Option<f64>,
    pub acousticness: Option<f64>,
}

impl AudioStats {
    /// The fixed feature vector used for similarity, with missing features
    /// defaulting to the neutral midpoint.
    pub fn feature_vector(&self) -> [f64; AUDIO_FEATURE_COUNT] {
        [
            self.danceability.unwrap_or(NEUTRAL_FEATURE),
            self.energy.unwrap_or(NEUTRAL_FEATURE),
            self.valence.unwrap_or(NEUTRAL_FEATURE),
            self.acousticness.unwrap_or(NEUTRAL_FEATURE),
        ]
    }

    fn named_values(&self) -> [(&'static str, Option<f64>); AUDIO_FEATURE_COUNT] {
        [
            ("danceability", self.danceability),
            ("energy", self.energy),
            ("valence", self.valence),
            ("acousticness", self.acousticness),
        ]
    }
}

/// A user's summarized music preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasteProfile {
    pub user_id: String,
    /// Rank-ordered, bounded (the sync sends at most ~20).
    #[serde(default)]
    pub top_artists: Vec<TopArtist>,
    /// Rank-ordered, deduplicated.
    #[serde(default)]
    pub top_genres: Vec<String>,
    #[serde(default)]
    pub audio_stats: AudioStats,
}

impl TasteProfile {
    pub fn empty(user_id: impl Into<String>) -> Self {
        TasteProfile {
            user_id: user_id.into(),
            top_artists: Vec::new(),
            top_genres: Vec::new(),
            audio_stats: AudioStats::default(),
        }
    }

    /// Checks the profile invariants: no duplicate artist ids or genres,
    /// audio stats finite and within [0,1]. Returns the first violation.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen_artists = HashSet::new();
        for artist in &self.top_artists {
            if !seen_artists.insert(artist.id.as_str()) {
                return Err(format!("duplicate artist id '{}'", artist.id));
            }
        }
        let mut seen_genres = HashSet::new();
        for genre in &self.top_genres {
            if !seen_genres.insert(genre.as_str()) {
                return Err(format!("duplicate genre '{}'", genre));
            }
        }
        for (name, value) in self.audio_stats.named_values() {
            if let Some(value) = value {
                if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                    return Err(format!("audio stat '{}' out of range: {}", name, value));
                }
            }
        }
        Ok(())
    }

    pub fn artist_ids(&self) -> HashSet<&str> {
        self.top_artists.iter().map(|a| a.id.as_str()).collect()
    }

    pub fn genre_set(&self) -> HashSet<&str> {
        self.top_genres.iter().map(|g| g.as_str()).collect()
    }
}
