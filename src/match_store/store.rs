//! SQLite-backed store for matches and their message logs.

use super::schema::MATCH_VERSIONED_SCHEMAS;
use super::trait_def::{MatchInsert, MatchStore};
use crate::chat::{ConversationSummary, Message, MessageBody, MessageStore};
use crate::matching::{Match, MatchStatus, ScoreBreakdown};
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Everything the matching and chat services need from durable storage.
pub trait FullMatchStore: MatchStore + MessageStore {}
impl<T: MatchStore + MessageStore> FullMatchStore for T {}

#[derive(Clone)]
pub struct SqliteMatchStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

impl SqliteMatchStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open match database")?;

        migrate_if_needed(&mut write_conn, MATCH_VERSIONED_SCHEMAS, "match")?;

        write_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on match write connection")?;
        // Cascade deletes depend on this being on for the writing connection
        write_conn.pragma_update(None, "foreign_keys", "ON")?;

        let read_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open match database for reading")?;
        read_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on match read connection")?;

        let matches: usize =
            read_conn.query_row("SELECT COUNT(*) FROM user_match", [], |r| r.get(0))?;
        let messages: usize =
            read_conn.query_row("SELECT COUNT(*) FROM message", [], |r| r.get(0))?;
        info!("Match store ready: {} matches, {} messages", matches, messages);

        Ok(SqliteMatchStore {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }
}

const MATCH_COLUMNS: &str = "id, user_a, user_b, score, breakdown, status, created, updated";

struct RawMatch {
    id: String,
    user_a: String,
    user_b: String,
    score: u8,
    breakdown_json: String,
    status: String,
    created: i64,
    updated: i64,
}

fn row_to_raw_match(row: &Row) -> rusqlite::Result<RawMatch> {
    Ok(RawMatch {
        id: row.get(0)?,
        user_a: row.get(1)?,
        user_b: row.get(2)?,
        score: row.get(3)?,
        breakdown_json: row.get(4)?,
        status: row.get(5)?,
        created: row.get(6)?,
        updated: row.get(7)?,
    })
}

fn raw_to_match(raw: RawMatch) -> Result<Match> {
    let breakdown: ScoreBreakdown = serde_json::from_str(&raw.breakdown_json)
        .with_context(|| format!("Malformed breakdown JSON for match {}", raw.id))?;
    let status: MatchStatus = raw
        .status
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .with_context(|| format!("Malformed status for match {}", raw.id))?;
    Ok(Match {
        id: raw.id,
        user_a: raw.user_a,
        user_b: raw.user_b,
        score: raw.score,
        breakdown,
        status,
        created_at: raw.created,
        updated_at: raw.updated,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl MatchStore for SqliteMatchStore {
    fn insert_match(&self, m: &Match) -> Result<MatchInsert> {
        let breakdown_json = serde_json::to_string(&m.breakdown)?;
        let insert_result = {
            let conn = self.write_conn.lock().unwrap();
            conn.execute(
                "INSERT INTO user_match (id, user_a, user_b, score, breakdown, status, created, updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    m.id,
                    m.user_a,
                    m.user_b,
                    m.score,
                    breakdown_json,
                    m.status.to_string(),
                    m.created_at,
                    m.updated_at,
                ],
            )
        };

        match insert_result {
            Ok(_) => Ok(MatchInsert::Created),
            Err(err) if is_unique_violation(&err) => {
                let existing = self
                    .get_match_for_pair(&m.user_a, &m.user_b)?
                    .context("Unique violation but no existing match row found")?;
                Ok(MatchInsert::Conflict(existing))
            }
            Err(err) => Err(err).context("Failed to insert match"),
        }
    }

    fn get_match(&self, match_id: &str) -> Result<Option<Match>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM user_match WHERE id = ?1",
            MATCH_COLUMNS
        ))?;
        let raw = stmt
            .query_row(params![match_id], row_to_raw_match)
            .optional()?;
        raw.map(raw_to_match).transpose()
    }

    fn get_match_for_pair(&self, user_x: &str, user_y: &str) -> Result<Option<Match>> {
        let (user_a, user_b) = Match::canonical_pair(user_x, user_y);
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM user_match WHERE user_a = ?1 AND user_b = ?2",
            MATCH_COLUMNS
        ))?;
        let raw = stmt
            .query_row(params![user_a, user_b], row_to_raw_match)
            .optional()?;
        raw.map(raw_to_match).transpose()
    }

    fn related_user_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT CASE WHEN user_a = ?1 THEN user_b ELSE user_a END
             FROM user_match WHERE user_a = ?1 OR user_b = ?1",
        )?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn update_status_if_pending(
        &self,
        match_id: &str,
        new_status: MatchStatus,
    ) -> Result<Option<Match>> {
        let changed = {
            let conn = self.write_conn.lock().unwrap();
            conn.execute(
                "UPDATE user_match SET status = ?2, updated = ?3
                 WHERE id = ?1 AND status = 'pending'",
                params![match_id, new_status.to_string(), now_unix()],
            )?
        };
        if changed == 0 {
            return Ok(None);
        }
        self.get_match(match_id)
    }

    fn delete_match(&self, match_id: &str) -> Result<bool> {
        let conn = self.write_conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM user_match WHERE id = ?1", params![match_id])?;
        Ok(deleted > 0)
    }

    fn matches_for_user(&self, user_id: &str) -> Result<Vec<Match>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM user_match WHERE user_a = ?1 OR user_b = ?1 ORDER BY updated DESC",
            MATCH_COLUMNS
        ))?;
        let raws = stmt
            .query_map(params![user_id], row_to_raw_match)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(raw_to_match).collect()
    }
}

const MESSAGE_COLUMNS: &str = "id, match_id, sender_id, seq, body, created, read";

struct RawMessage {
    id: String,
    match_id: String,
    sender_id: String,
    seq: i64,
    body_json: String,
    created: i64,
    read: i64,
}

fn row_to_raw_message(row: &Row) -> rusqlite::Result<RawMessage> {
    Ok(RawMessage {
        id: row.get(0)?,
        match_id: row.get(1)?,
        sender_id: row.get(2)?,
        seq: row.get(3)?,
        body_json: row.get(4)?,
        created: row.get(5)?,
        read: row.get(6)?,
    })
}

fn raw_to_message(raw: RawMessage) -> Result<Message> {
    let body: MessageBody = serde_json::from_str(&raw.body_json)
        .with_context(|| format!("Malformed body JSON for message {}", raw.id))?;
    Ok(Message {
        id: raw.id,
        match_id: raw.match_id,
        sender_id: raw.sender_id,
        seq: raw.seq,
        body,
        created_at: raw.created,
        read: raw.read != 0,
    })
}

impl MessageStore for SqliteMatchStore {
    fn append_message(
        &self,
        match_id: &str,
        sender_id: &str,
        body: MessageBody,
    ) -> Result<Message> {
        let body_json = serde_json::to_string(&body)?;
        let id = uuid::Uuid::new_v4().to_string();

        let conn = self.write_conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        // The counter lives on the match row so seqs are never reused, even
        // after the newest message is deleted.
        let seq: i64 = tx
            .query_row(
                "SELECT next_seq FROM user_match WHERE id = ?1",
                params![match_id],
                |row| row.get(0),
            )
            .optional()?
            .with_context(|| format!("No match {} to append a message to", match_id))?;
        let last_created: i64 = tx.query_row(
            "SELECT COALESCE(MAX(created), 0) FROM message WHERE match_id = ?1",
            params![match_id],
            |row| row.get(0),
        )?;
        // Clamp so created_at never goes backwards within a match even if
        // the wall clock does; seq alone carries the total order.
        let created_at = now_unix().max(last_created);
        tx.execute(
            "UPDATE user_match SET next_seq = ?2 WHERE id = ?1",
            params![match_id, seq + 1],
        )?;
        tx.execute(
            "INSERT INTO message (id, match_id, sender_id, seq, body, created, read)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![id, match_id, sender_id, seq, body_json, created_at],
        )
        .with_context(|| format!("Failed to append message to match {}", match_id))?;
        tx.commit()?;

        Ok(Message {
            id,
            match_id: match_id.to_string(),
            sender_id: sender_id.to_string(),
            seq,
            body,
            created_at,
            read: false,
        })
    }

    fn get_message(&self, message_id: &str) -> Result<Option<Message>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM message WHERE id = ?1",
            MESSAGE_COLUMNS
        ))?;
        let raw = stmt
            .query_row(params![message_id], row_to_raw_message)
            .optional()?;
        raw.map(raw_to_message).transpose()
    }

    fn messages_for_match(&self, match_id: &str, limit: usize) -> Result<Vec<Message>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM message WHERE match_id = ?1 ORDER BY seq ASC LIMIT ?2",
            MESSAGE_COLUMNS
        ))?;
        let raws = stmt
            .query_map(params![match_id, limit], row_to_raw_message)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(raw_to_message).collect()
    }

    fn mark_read(&self, match_id: &str, reader_id: &str) -> Result<usize> {
        let conn = self.write_conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE message SET read = 1
             WHERE match_id = ?1 AND sender_id != ?2 AND read = 0",
            params![match_id, reader_id],
        )?;
        Ok(changed)
    }

    fn delete_message(&self, message_id: &str) -> Result<bool> {
        let conn = self.write_conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM message WHERE id = ?1", params![message_id])?;
        Ok(deleted > 0)
    }

    fn conversations_for_user(&self, user_id: &str) -> Result<Vec<ConversationSummary>> {
        let matches = self.matches_for_user(user_id)?;
        let conn = self.read_conn.lock().unwrap();
        let mut latest_stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM message WHERE match_id = ?1 ORDER BY seq DESC LIMIT 1",
            MESSAGE_COLUMNS
        ))?;
        let mut counts_stmt = conn.prepare_cached(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN read = 0 AND sender_id != ?2 THEN 1 ELSE 0 END), 0)
             FROM message WHERE match_id = ?1",
        )?;

        let mut summaries = Vec::with_capacity(matches.len());
        for m in matches {
            let latest = latest_stmt
                .query_row(params![m.id], row_to_raw_message)
                .optional()?
                .map(raw_to_message)
                .transpose()?;
            let (total, unread): (usize, usize) =
                counts_stmt.query_row(params![m.id, user_id], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?;
            let other_user_id = m.other_participant(user_id).to_string();
            summaries.push(ConversationSummary {
                match_id: m.id,
                other_user_id,
                status: m.status,
                latest_message: latest,
                total_messages: total,
                unread_count: unread,
            });
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteMatchStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("match.db");
        let store = SqliteMatchStore::new(&db_path).unwrap();
        (store, tmp)
    }

    fn make_match(user_x: &str, user_y: &str) -> Match {
        let (user_a, user_b) = Match::canonical_pair(user_x, user_y);
        Match {
            id: uuid::Uuid::new_v4().to_string(),
            user_a,
            user_b,
            score: 67,
            breakdown: ScoreBreakdown {
                shared_artists: 50.0,
                shared_genres: 50.0,
                audio_similarity: 95.0,
                taste_diversity: 100.0,
                discovery: 50.0,
            },
            status: MatchStatus::Pending,
            created_at: 1700000000,
            updated_at: 1700000000,
        }
    }

    #[test]
    fn test_match_crud() {
        let (store, _tmp) = create_test_store();
        let m = make_match("u1", "u2");

        assert!(matches!(store.insert_match(&m).unwrap(), MatchInsert::Created));

        let result = store.get_match(&m.id).unwrap().unwrap();
        assert_eq!(result, m);

        assert!(store.get_match("nonexistent").unwrap().is_none());
    }

    #[test]
    fn duplicate_pair_conflicts_with_existing_row() {
        let (store, _tmp) = create_test_store();
        let first = make_match("u1", "u2");
        store.insert_match(&first).unwrap();

        // Same pair, reversed argument order, fresh id
        let second = make_match("u2", "u1");
        match store.insert_match(&second).unwrap() {
            MatchInsert::Conflict(existing) => assert_eq!(existing.id, first.id),
            MatchInsert::Created => panic!("expected conflict"),
        }

        // Only one row persisted
        assert_eq!(store.matches_for_user("u1").unwrap().len(), 1);
    }

    #[test]
    fn pair_lookup_ignores_argument_order() {
        let (store, _tmp) = create_test_store();
        let m = make_match("u1", "u2");
        store.insert_match(&m).unwrap();

        let forward = store.get_match_for_pair("u1", "u2").unwrap().unwrap();
        let reversed = store.get_match_for_pair("u2", "u1").unwrap().unwrap();
        assert_eq!(forward.id, m.id);
        assert_eq!(reversed.id, m.id);
    }

    #[test]
    fn related_user_ids_covers_both_sides() {
        let (store, _tmp) = create_test_store();
        store.insert_match(&make_match("u1", "u2")).unwrap();
        store.insert_match(&make_match("u3", "u1")).unwrap();
        store.insert_match(&make_match("u4", "u5")).unwrap();

        let mut related = store.related_user_ids("u1").unwrap();
        related.sort();
        assert_eq!(related, vec!["u2".to_string(), "u3".to_string()]);
    }

    #[test]
    fn status_update_only_applies_to_pending() {
        let (store, _tmp) = create_test_store();
        let m = make_match("u1", "u2");
        store.insert_match(&m).unwrap();

        let updated = store
            .update_status_if_pending(&m.id, MatchStatus::Accepted)
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, MatchStatus::Accepted);
        assert!(updated.updated_at >= m.updated_at);

        // Already terminal: the conditional update matches no row
        let again = store
            .update_status_if_pending(&m.id, MatchStatus::Rejected)
            .unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn message_append_assigns_monotonic_seq() {
        let (store, _tmp) = create_test_store();
        let m = make_match("u1", "u2");
        store.insert_match(&m).unwrap();

        for i in 0..3 {
            let msg = store
                .append_message(
                    &m.id,
                    "u1",
                    MessageBody::Text {
                        content: format!("hello {}", i),
                    },
                )
                .unwrap();
            assert_eq!(msg.seq, i);
        }

        let messages = store.messages_for_match(&m.id, 100).unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.body.content()).collect();
        assert_eq!(contents, vec!["hello 0", "hello 1", "hello 2"]);
        assert!(messages.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[test]
    fn seq_is_never_reused_after_deleting_the_newest_message() {
        let (store, _tmp) = create_test_store();
        let m = make_match("u1", "u2");
        store.insert_match(&m).unwrap();

        let text = |content: &str| MessageBody::Text {
            content: content.to_string(),
        };
        store.append_message(&m.id, "u1", text("first")).unwrap();
        let newest = store.append_message(&m.id, "u2", text("second")).unwrap();
        assert_eq!(newest.seq, 1);

        store.delete_message(&newest.id).unwrap();
        let replacement = store.append_message(&m.id, "u1", text("third")).unwrap();
        assert_eq!(replacement.seq, 2);

        // The live log keeps strictly increasing seqs, with a gap where the
        // deleted message used to be.
        let seqs: Vec<i64> = store
            .messages_for_match(&m.id, 10)
            .unwrap()
            .iter()
            .map(|x| x.seq)
            .collect();
        assert_eq!(seqs, vec![0, 2]);
    }

    #[test]
    fn message_append_requires_existing_match() {
        let (store, _tmp) = create_test_store();
        let result = store.append_message(
            "no-such-match",
            "u1",
            MessageBody::Text {
                content: "hi".to_string(),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn deleting_a_match_cascades_to_messages() {
        let (store, _tmp) = create_test_store();
        let m = make_match("u1", "u2");
        store.insert_match(&m).unwrap();
        let msg = store
            .append_message(&m.id, "u1", MessageBody::Text { content: "hi".to_string() })
            .unwrap();

        assert!(store.delete_match(&m.id).unwrap());
        assert!(store.get_match(&m.id).unwrap().is_none());
        assert!(store.get_message(&msg.id).unwrap().is_none());
        assert!(store.messages_for_match(&m.id, 10).unwrap().is_empty());
    }

    #[test]
    fn mark_read_only_flips_the_other_sides_messages() {
        let (store, _tmp) = create_test_store();
        let m = make_match("u1", "u2");
        store.insert_match(&m).unwrap();
        store
            .append_message(&m.id, "u1", MessageBody::Text { content: "a".to_string() })
            .unwrap();
        store
            .append_message(&m.id, "u2", MessageBody::Text { content: "b".to_string() })
            .unwrap();

        // u2 reads: only u1's message flips
        assert_eq!(store.mark_read(&m.id, "u2").unwrap(), 1);
        let messages = store.messages_for_match(&m.id, 10).unwrap();
        assert!(messages.iter().find(|x| x.sender_id == "u1").unwrap().read);
        assert!(!messages.iter().find(|x| x.sender_id == "u2").unwrap().read);

        // Idempotent
        assert_eq!(store.mark_read(&m.id, "u2").unwrap(), 0);
    }

    #[test]
    fn conversations_projection_counts_and_latest() {
        let (store, _tmp) = create_test_store();
        let m1 = make_match("u1", "u2");
        let m2 = make_match("u1", "u3");
        store.insert_match(&m1).unwrap();
        store.insert_match(&m2).unwrap();

        store
            .append_message(&m1.id, "u2", MessageBody::Text { content: "one".to_string() })
            .unwrap();
        store
            .append_message(&m1.id, "u2", MessageBody::Text { content: "two".to_string() })
            .unwrap();

        let summaries = store.conversations_for_user("u1").unwrap();
        assert_eq!(summaries.len(), 2);

        let with_messages = summaries.iter().find(|s| s.match_id == m1.id).unwrap();
        assert_eq!(with_messages.other_user_id, "u2");
        assert_eq!(with_messages.total_messages, 2);
        assert_eq!(with_messages.unread_count, 2);
        assert_eq!(
            with_messages.latest_message.as_ref().unwrap().body.content(),
            "two"
        );

        let empty = summaries.iter().find(|s| s.match_id == m2.id).unwrap();
        assert_eq!(empty.total_messages, 0);
        assert!(empty.latest_message.is_none());
    }

    #[test]
    fn delete_message_by_id() {
        let (store, _tmp) = create_test_store();
        let m = make_match("u1", "u2");
        store.insert_match(&m).unwrap();
        let msg = store
            .append_message(&m.id, "u1", MessageBody::Text { content: "oops".to_string() })
            .unwrap();

        assert!(store.delete_message(&msg.id).unwrap());
        assert!(!store.delete_message(&msg.id).unwrap());
        assert!(store.messages_for_match(&m.id, 10).unwrap().is_empty());
    }

    #[test]
    fn song_share_body_round_trips() {
        let (store, _tmp) = create_test_store();
        let m = make_match("u1", "u2");
        store.insert_match(&m).unwrap();

        let body = MessageBody::SongShare {
            content: "this is us".to_string(),
            track_id: "track-42".to_string(),
        };
        let msg = store.append_message(&m.id, "u1", body.clone()).unwrap();

        let stored = store.get_message(&msg.id).unwrap().unwrap();
        assert_eq!(stored.body, body);
    }
}
