//! SQLite-backed session store.

use super::models::{AccessKey, AuthToken, AuthTokenValue};
use super::schema::AUTH_VERSIONED_SCHEMAS;
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Access provisioning and session tokens. Identity itself lives with the
/// external music service; this only gates who may call the API.
pub trait SessionStore: Send + Sync {
    /// Provision (or rotate) the access key for a user.
    fn upsert_access(&self, user_id: &str, key: &AccessKey) -> Result<()>;

    /// Compares digests; true only for a provisioned user with the right key.
    fn verify_access(&self, user_id: &str, key: &AccessKey) -> Result<bool>;

    fn delete_access(&self, user_id: &str) -> Result<bool>;

    fn provisioned_user_ids(&self) -> Result<Vec<String>>;

    fn create_token(&self, user_id: &str) -> Result<AuthToken>;

    fn get_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>>;

    fn touch_token(&self, value: &AuthTokenValue) -> Result<()>;

    fn delete_token(&self, value: &AuthTokenValue) -> Result<bool>;
}

#[derive(Clone)]
pub struct SqliteAuthStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAuthStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let mut conn = Connection::open_with_flags(
            db_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open auth database")?;

        migrate_if_needed(&mut conn, AUTH_VERSIONED_SCHEMAS, "auth")?;

        let count: usize =
            conn.query_row("SELECT COUNT(*) FROM user_access", [], |r| r.get(0))?;
        info!("Auth store ready: {} users provisioned", count);

        Ok(SqliteAuthStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn row_to_token(row: &Row) -> rusqlite::Result<AuthToken> {
    Ok(AuthToken {
        value: AuthTokenValue(row.get(0)?),
        user_id: row.get(1)?,
        created: row.get(2)?,
        last_used: row.get(3)?,
    })
}

impl SessionStore for SqliteAuthStore {
    fn upsert_access(&self, user_id: &str, key: &AccessKey) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user_access (user_id, key_digest) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET key_digest = excluded.key_digest",
            params![user_id, key.digest()],
        )
        .with_context(|| format!("Failed to provision access for {}", user_id))?;
        Ok(())
    }

    fn verify_access(&self, user_id: &str, key: &AccessKey) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let stored: Option<String> = conn
            .query_row(
                "SELECT key_digest FROM user_access WHERE user_id = ?1",
                params![user_id],
                |r| r.get(0),
            )
            .optional()?;
        let verified = stored.as_deref() == Some(key.digest().as_str());
        if verified {
            conn.execute(
                "UPDATE user_access
                 SET last_login = cast(strftime('%s','now') as int)
                 WHERE user_id = ?1",
                params![user_id],
            )?;
        }
        Ok(verified)
    }

    fn delete_access(&self, user_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        // Active sessions die with the access
        conn.execute("DELETE FROM auth_token WHERE user_id = ?1", params![user_id])?;
        let deleted = conn.execute(
            "DELETE FROM user_access WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(deleted > 0)
    }

    fn provisioned_user_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT user_id FROM user_access ORDER BY user_id")?;
        let ids = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn create_token(&self, user_id: &str) -> Result<AuthToken> {
        let value = AuthTokenValue::generate();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_token (value, user_id) VALUES (?1, ?2)",
            params![value.0, user_id],
        )?;
        let token = conn.query_row(
            "SELECT value, user_id, created, last_used FROM auth_token WHERE value = ?1",
            params![value.0],
            row_to_token,
        )?;
        Ok(token)
    }

    fn get_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let conn = self.conn.lock().unwrap();
        let token = conn
            .query_row(
                "SELECT value, user_id, created, last_used FROM auth_token WHERE value = ?1",
                params![value.0],
                row_to_token,
            )
            .optional()?;
        Ok(token)
    }

    fn touch_token(&self, value: &AuthTokenValue) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE auth_token
             SET last_used = cast(strftime('%s','now') as int)
             WHERE value = ?1",
            params![value.0],
        )?;
        Ok(())
    }

    fn delete_token(&self, value: &AuthTokenValue) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM auth_token WHERE value = ?1",
            params![value.0],
        )?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteAuthStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteAuthStore::new(tmp.path().join("auth.db")).unwrap();
        (store, tmp)
    }

    #[test]
    fn test_access_provisioning_and_verification() {
        let (store, _tmp) = create_test_store();
        let key = AccessKey::generate();

        assert!(!store.verify_access("u1", &key).unwrap());

        store.upsert_access("u1", &key).unwrap();
        assert!(store.verify_access("u1", &key).unwrap());
        assert!(!store.verify_access("u1", &AccessKey::generate()).unwrap());
        assert!(!store.verify_access("u2", &key).unwrap());

        // Rotation invalidates the old key
        let rotated = AccessKey::generate();
        store.upsert_access("u1", &rotated).unwrap();
        assert!(!store.verify_access("u1", &key).unwrap());
        assert!(store.verify_access("u1", &rotated).unwrap());
    }

    #[test]
    fn test_token_lifecycle() {
        let (store, _tmp) = create_test_store();
        store.upsert_access("u1", &AccessKey::generate()).unwrap();

        let token = store.create_token("u1").unwrap();
        assert_eq!(token.user_id, "u1");
        assert!(token.last_used.is_none());

        let loaded = store.get_token(&token.value).unwrap().unwrap();
        assert_eq!(loaded.user_id, "u1");

        store.touch_token(&token.value).unwrap();
        let touched = store.get_token(&token.value).unwrap().unwrap();
        assert!(touched.last_used.is_some());

        assert!(store.delete_token(&token.value).unwrap());
        assert!(store.get_token(&token.value).unwrap().is_none());
        assert!(!store.delete_token(&token.value).unwrap());
    }

    #[test]
    fn test_delete_access_revokes_sessions() {
        let (store, _tmp) = create_test_store();
        store.upsert_access("u1", &AccessKey::generate()).unwrap();
        let token = store.create_token("u1").unwrap();

        assert!(store.delete_access("u1").unwrap());
        assert!(store.get_token(&token.value).unwrap().is_none());
        assert!(!store.delete_access("u1").unwrap());
    }

    #[test]
    fn test_provisioned_user_ids_sorted() {
        let (store, _tmp) = create_test_store();
        for user in ["zebra", "alpha", "mike"] {
            store.upsert_access(user, &AccessKey::generate()).unwrap();
        }
        assert_eq!(
            store.provisioned_user_ids().unwrap(),
            vec!["alpha", "mike", "zebra"]
        );
    }
}
