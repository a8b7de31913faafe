//! Chat between matched users: ordered message logs, read state and the
//! conversations projection.

mod models;
mod service;
mod store;

pub use models::{ConversationSummary, Message, MessageBody, MAX_MESSAGE_CHARS};
pub use service::ChatService;
pub use store::MessageStore;
