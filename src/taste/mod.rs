//! Taste profiles: per-user snapshots of listening preferences, written by
//! the external music-service sync and read-only to the matching core.

mod models;
mod schema;
mod store;

pub use models::{AudioStats, TasteProfile, TopArtist, AUDIO_FEATURE_COUNT};
pub use store::{SqliteTasteStore, TasteProfileStore};
