use axum::extract::FromRef;

use crate::auth::SessionStore;
use crate::chat::ChatService;
use crate::matching::MatchmakingService;
use crate::taste::TasteProfileStore;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedTasteStore = Arc<dyn TasteProfileStore>;
pub type GuardedSessionStore = Arc<dyn SessionStore>;
pub type GuardedMatchmaking = Arc<MatchmakingService>;
pub type GuardedChatService = Arc<ChatService>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub taste_store: GuardedTasteStore,
    pub sessions: GuardedSessionStore,
    pub matchmaking: GuardedMatchmaking,
    pub chat: GuardedChatService,
}

impl FromRef<ServerState> for GuardedTasteStore {
    fn from_ref(input: &ServerState) -> Self {
        input.taste_store.clone()
    }
}

impl FromRef<ServerState> for GuardedSessionStore {
    fn from_ref(input: &ServerState) -> Self {
        input.sessions.clone()
    }
}

impl FromRef<ServerState> for GuardedMatchmaking {
    fn from_ref(input: &ServerState) -> Self {
        input.matchmaking.clone()
    }
}

impl FromRef<ServerState> for GuardedChatService {
    fn from_ref(input: &ServerState) -> Self {
        input.chat.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
