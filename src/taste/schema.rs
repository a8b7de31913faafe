//! SQLite schema for the taste profile database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP};

/// One row per user, replaced wholesale on every sync run.
const TASTE_PROFILE_TABLE: Table = Table {
    name: "taste_profile",
    columns: &[
        sqlite_column!("user_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("artists", &SqlType::Text, non_null = true), // JSON array
        sqlite_column!("genres", &SqlType::Text, non_null = true),  // JSON array
        sqlite_column!("danceability", &SqlType::Real),
        sqlite_column!("energy", &SqlType::Real),
        sqlite_column!("valence", &SqlType::Real),
        sqlite_column!("acousticness", &SqlType::Real),
        sqlite_column!(
            "updated",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const TASTE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[TASTE_PROFILE_TABLE],
    migration: None,
}];
