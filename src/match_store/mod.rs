//! Durable storage for matches and chat messages.

mod schema;
mod store;
mod trait_def;

pub use store::{FullMatchStore, SqliteMatchStore};
pub use trait_def::{MatchInsert, MatchStore};
