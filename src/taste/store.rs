//! SQLite-backed taste profile store.

use super::models::{AudioStats, TasteProfile, TopArtist};
use super::schema::TASTE_VERSIONED_SCHEMAS;
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Read side used by the matching core; the write side exists for the
/// external music-service sync to push snapshots through.
pub trait TasteProfileStore: Send + Sync {
    /// Replace (or create) a user's profile snapshot.
    fn upsert_profile(&self, profile: &TasteProfile) -> Result<()>;

    /// Returns None when the user has never been synced.
    fn get_profile(&self, user_id: &str) -> Result<Option<TasteProfile>>;

    /// All profiles currently discoverable, in no particular order.
    fn all_profiles(&self) -> Result<Vec<TasteProfile>>;
}

#[derive(Clone)]
pub struct SqliteTasteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTasteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let mut conn = Connection::open_with_flags(
            db_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open taste database")?;

        migrate_if_needed(&mut conn, TASTE_VERSIONED_SCHEMAS, "taste")?;

        let count: usize =
            conn.query_row("SELECT COUNT(*) FROM taste_profile", [], |r| r.get(0))?;
        info!("Taste store ready: {} profiles synced", count);

        Ok(SqliteTasteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn row_to_profile(row: &Row) -> rusqlite::Result<(TasteProfile, String, String)> {
    let user_id: String = row.get(0)?;
    let artists_json: String = row.get(1)?;
    let genres_json: String = row.get(2)?;
    let profile = TasteProfile {
        user_id,
        top_artists: Vec::new(),
        top_genres: Vec::new(),
        audio_stats: AudioStats {
            danceability: row.get(3)?,
            energy: row.get(4)?,
            valence: row.get(5)?,
            acousticness: row.get(6)?,
        },
    };
    Ok((profile, artists_json, genres_json))
}

fn fill_json_columns(
    (mut profile, artists_json, genres_json): (TasteProfile, String, String),
) -> Option<TasteProfile> {
    let artists: Option<Vec<TopArtist>> = serde_json::from_str(&artists_json)
        .map_err(|e| warn!("Malformed artists JSON for {}: {}", profile.user_id, e))
        .ok();
    let genres: Option<Vec<String>> = serde_json::from_str(&genres_json)
        .map_err(|e| warn!("Malformed genres JSON for {}: {}", profile.user_id, e))
        .ok();
    profile.top_artists = artists?;
    profile.top_genres = genres?;
    Some(profile)
}

const PROFILE_COLUMNS: &str =
    "user_id, artists, genres, danceability, energy, valence, acousticness";

impl TasteProfileStore for SqliteTasteStore {
    fn upsert_profile(&self, profile: &TasteProfile) -> Result<()> {
        let artists_json = serde_json::to_string(&profile.top_artists)?;
        let genres_json = serde_json::to_string(&profile.top_genres)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO taste_profile
             (user_id, artists, genres, danceability, energy, valence, acousticness, updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, cast(strftime('%s','now') as int))",
            params![
                profile.user_id,
                artists_json,
                genres_json,
                profile.audio_stats.danceability,
                profile.audio_stats.energy,
                profile.audio_stats.valence,
                profile.audio_stats.acousticness,
            ],
        )
        .with_context(|| format!("Failed to upsert taste profile for {}", profile.user_id))?;
        Ok(())
    }

    fn get_profile(&self, user_id: &str) -> Result<Option<TasteProfile>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM taste_profile WHERE user_id = ?1",
            PROFILE_COLUMNS
        ))?;
        let raw = stmt
            .query_row(params![user_id], row_to_profile)
            .optional()?;
        Ok(raw.and_then(fill_json_columns))
    }

    fn all_profiles(&self) -> Result<Vec<TasteProfile>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare_cached(&format!("SELECT {} FROM taste_profile", PROFILE_COLUMNS))?;
        let profiles = stmt
            .query_map([], row_to_profile)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter_map(fill_json_columns)
            .collect();
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteTasteStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("taste.db");
        let store = SqliteTasteStore::new(&db_path).unwrap();
        (store, tmp)
    }

    fn make_profile(user_id: &str) -> TasteProfile {
        TasteProfile {
            user_id: user_id.to_string(),
            top_artists: vec![TopArtist {
                id: "a1".to_string(),
                name: "The Midnight Owls".to_string(),
                genres: vec!["rock".to_string()],
            }],
            top_genres: vec!["rock".to_string(), "indie".to_string()],
            audio_stats: AudioStats {
                danceability: Some(0.4),
                energy: Some(0.8),
                valence: None,
                acousticness: Some(0.1),
            },
        }
    }

    #[test]
    fn test_profile_crud() {
        let (store, _tmp) = create_test_store();
        let profile = make_profile("u1");

        store.upsert_profile(&profile).unwrap();

        let result = store.get_profile("u1").unwrap().unwrap();
        assert_eq!(result, profile);

        // Not found
        assert!(store.get_profile("nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_snapshot() {
        let (store, _tmp) = create_test_store();
        store.upsert_profile(&make_profile("u1")).unwrap();

        let mut updated = make_profile("u1");
        updated.top_genres = vec!["pop".to_string()];
        updated.audio_stats.energy = Some(0.2);
        store.upsert_profile(&updated).unwrap();

        let result = store.get_profile("u1").unwrap().unwrap();
        assert_eq!(result.top_genres, vec!["pop".to_string()]);
        assert_eq!(result.audio_stats.energy, Some(0.2));

        let all = store.all_profiles().unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_all_profiles() {
        let (store, _tmp) = create_test_store();
        for i in 0..3 {
            store.upsert_profile(&make_profile(&format!("u{}", i))).unwrap();
        }
        let all = store.all_profiles().unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_empty_collections_survive_round_trip() {
        let (store, _tmp) = create_test_store();
        let profile = TasteProfile::empty("u1");
        store.upsert_profile(&profile).unwrap();

        let result = store.get_profile("u1").unwrap().unwrap();
        assert!(result.top_artists.is_empty());
        assert!(result.top_genres.is_empty());
        assert!(result.audio_stats.danceability.is_none());
    }
}
