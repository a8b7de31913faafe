//! SQLite schema for the match database (matches and their messages).

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

/// One row per unordered user pair; `user_a < user_b` is the canonical
/// order and the unique constraint is what makes create-match atomic.
const USER_MATCH_TABLE: Table = Table {
    name: "user_match",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("user_a", &SqlType::Text, non_null = true),
        sqlite_column!("user_b", &SqlType::Text, non_null = true),
        sqlite_column!("score", &SqlType::Integer, non_null = true),
        sqlite_column!("breakdown", &SqlType::Text, non_null = true), // JSON
        sqlite_column!("status", &SqlType::Text, non_null = true),
        // Next message seq to hand out. Lives here, not as MAX(seq) over the
        // log, so a deleted message can never get its seq reused.
        sqlite_column!(
            "next_seq",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_match_user_a", "user_a"),
        ("idx_match_user_b", "user_b"),
    ],
    unique_constraints: &[&["user_a", "user_b"]],
};

/// Append-only message log. `seq` is the per-match monotonic counter;
/// deleting a match cascades here.
const MESSAGE_TABLE: Table = Table {
    name: "message",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "match_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "user_match",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("sender_id", &SqlType::Text, non_null = true),
        sqlite_column!("seq", &SqlType::Integer, non_null = true),
        sqlite_column!("body", &SqlType::Text, non_null = true), // JSON
        sqlite_column!("created", &SqlType::Integer, non_null = true),
        sqlite_column!("read", &SqlType::Integer, non_null = true, default_value = Some("0")),
    ],
    indices: &[("idx_message_match", "match_id")],
    unique_constraints: &[&["match_id", "seq"]],
};

pub const MATCH_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[USER_MATCH_TABLE, MESSAGE_TABLE],
    migration: None,
}];
