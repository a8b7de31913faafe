//! SQLite schema for the auth database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP};

const USER_ACCESS_TABLE: Table = Table {
    name: "user_access",
    columns: &[
        sqlite_column!("user_id", &SqlType::Text, is_primary_key = true),
        // SHA-256 hex digest of the access key, never the key itself
        sqlite_column!("key_digest", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_login", &SqlType::Integer),
    ],
    indices: &[],
    unique_constraints: &[],
};

const AUTH_TOKEN_TABLE: Table = Table {
    name: "auth_token",
    columns: &[
        sqlite_column!("value", &SqlType::Text, is_primary_key = true),
        sqlite_column!("user_id", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    indices: &[("idx_auth_token_user", "user_id")],
    unique_constraints: &[],
};

pub const AUTH_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[USER_ACCESS_TABLE, AUTH_TOKEN_TABLE],
    migration: None,
}];
