//! Duetto Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod auth;
pub mod chat;
pub mod config;
pub mod match_store;
pub mod matching;
pub mod realtime;
pub mod server;
pub mod sqlite_persistence;
pub mod taste;

// Re-export commonly used types for convenience
pub use auth::{SessionStore, SqliteAuthStore};
pub use chat::{ChatService, MessageStore};
pub use match_store::{FullMatchStore, MatchStore, SqliteMatchStore};
pub use matching::{MatchingError, MatchmakingService, ScoringStrategy};
pub use server::{run_server, RequestsLoggingLevel};
pub use taste::{SqliteTasteStore, TasteProfile, TasteProfileStore};
