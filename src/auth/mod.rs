//! Access provisioning and session tokens.

mod models;
mod schema;
mod store;

pub use models::{AccessKey, AuthToken, AuthTokenValue};
pub use store::{SessionStore, SqliteAuthStore};
