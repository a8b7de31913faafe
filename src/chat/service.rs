//! Chat service: participant and lifecycle gating around the message store.

use super::models::{ConversationSummary, Message, MessageBody, MAX_MESSAGE_CHARS};
use crate::match_store::FullMatchStore;
use crate::matching::{Match, MatchStatus, MatchingError};
use crate::realtime::{MessageEvent, RealtimeNotifier};
use std::sync::Arc;
use tracing::debug;

pub struct ChatService {
    store: Arc<dyn FullMatchStore>,
    notifier: Arc<dyn RealtimeNotifier>,
}

impl ChatService {
    pub fn new(store: Arc<dyn FullMatchStore>, notifier: Arc<dyn RealtimeNotifier>) -> Self {
        ChatService { store, notifier }
    }

    fn load_match_for(&self, match_id: &str, user_id: &str) -> Result<Match, MatchingError> {
        let m = self
            .store
            .get_match(match_id)?
            .ok_or_else(|| MatchingError::NotFound(format!("match {}", match_id)))?;
        if !m.is_participant(user_id) {
            return Err(MatchingError::forbidden(user_id, format!("match {}", match_id)));
        }
        Ok(m)
    }

    /// Append a message. Only allowed on an accepted match, by one of its
    /// two participants, with non-empty bounded content. A copy of the
    /// stored message goes to the realtime channel for the other side.
    pub async fn send_message(
        &self,
        match_id: &str,
        sender_id: &str,
        body: MessageBody,
    ) -> Result<Message, MatchingError> {
        let m = self.load_match_for(match_id, sender_id)?;
        if m.status != MatchStatus::Accepted {
            return Err(MatchingError::MatchNotAccepted(match_id.to_string()));
        }

        let content = body.content();
        if content.trim().is_empty() {
            return Err(MatchingError::InvalidMessage("empty content".to_string()));
        }
        if content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(MatchingError::InvalidMessage(format!(
                "content exceeds {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        let message = self.store.append_message(match_id, sender_id, body)?;
        debug!(
            "Message {} appended to match {} at seq {}",
            message.id, match_id, message.seq
        );

        self.notifier
            .notify(MessageEvent {
                recipient_id: m.other_participant(sender_id).to_string(),
                message: message.clone(),
            })
            .await;

        Ok(message)
    }

    /// Chronological messages of a match, participant-only.
    pub fn get_messages(
        &self,
        match_id: &str,
        acting_user: &str,
        limit: usize,
    ) -> Result<Vec<Message>, MatchingError> {
        self.load_match_for(match_id, acting_user)?;
        Ok(self.store.messages_for_match(match_id, limit)?)
    }

    /// Marks everything the other participant sent as read.
    pub fn mark_read(&self, match_id: &str, acting_user: &str) -> Result<usize, MatchingError> {
        self.load_match_for(match_id, acting_user)?;
        Ok(self.store.mark_read(match_id, acting_user)?)
    }

    /// A message can only be deleted by its sender.
    pub fn delete_message(
        &self,
        message_id: &str,
        acting_user: &str,
    ) -> Result<(), MatchingError> {
        let message = self
            .store
            .get_message(message_id)?
            .ok_or_else(|| MatchingError::NotFound(format!("message {}", message_id)))?;
        if message.sender_id != acting_user {
            return Err(MatchingError::forbidden(
                acting_user,
                format!("message {}", message_id),
            ));
        }
        self.store.delete_message(message_id)?;
        Ok(())
    }

    pub fn conversations(&self, user_id: &str) -> Result<Vec<ConversationSummary>, MatchingError> {
        Ok(self.store.conversations_for_user(user_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_store::{MatchStore, SqliteMatchStore};
    use crate::matching::ScoreBreakdown;
    use crate::realtime::{ChannelNotifier, NoOpNotifier};
    use tempfile::TempDir;

    fn make_service() -> (ChatService, Arc<SqliteMatchStore>, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(SqliteMatchStore::new(tmp.path().join("match.db")).unwrap());
        let service = ChatService::new(store.clone(), Arc::new(NoOpNotifier));
        (service, store, tmp)
    }

    fn insert_match(store: &SqliteMatchStore, user_x: &str, user_y: &str) -> Match {
        let (user_a, user_b) = Match::canonical_pair(user_x, user_y);
        let m = Match {
            id: uuid::Uuid::new_v4().to_string(),
            user_a,
            user_b,
            score: 80,
            breakdown: ScoreBreakdown::default(),
            status: MatchStatus::Pending,
            created_at: 1700000000,
            updated_at: 1700000000,
        };
        store.insert_match(&m).unwrap();
        m
    }

    fn accept(store: &SqliteMatchStore, match_id: &str) -> Match {
        store
            .update_status_if_pending(match_id, MatchStatus::Accepted)
            .unwrap()
            .unwrap()
    }

    fn text(content: &str) -> MessageBody {
        MessageBody::Text {
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn messaging_is_gated_on_accepted_status() {
        let (service, store, _tmp) = make_service();
        let m = insert_match(&store, "u1", "u2");

        // Pending: locked for both participants
        for sender in ["u1", "u2"] {
            let result = service.send_message(&m.id, sender, text("hi")).await;
            assert!(matches!(result, Err(MatchingError::MatchNotAccepted(_))));
        }

        accept(&store, &m.id);
        let message = service.send_message(&m.id, "u1", text("hi")).await.unwrap();
        assert_eq!(message.seq, 0);

        // Rejected match elsewhere stays locked
        let rejected = insert_match(&store, "u1", "u3");
        store
            .update_status_if_pending(&rejected.id, MatchStatus::Rejected)
            .unwrap();
        let result = service.send_message(&rejected.id, "u1", text("hi")).await;
        assert!(matches!(result, Err(MatchingError::MatchNotAccepted(_))));
    }

    #[tokio::test]
    async fn non_participants_cannot_send_or_read() {
        let (service, store, _tmp) = make_service();
        let m = insert_match(&store, "u1", "u2");
        accept(&store, &m.id);

        let result = service.send_message(&m.id, "intruder", text("hi")).await;
        assert!(matches!(result, Err(MatchingError::Forbidden { .. })));

        let result = service.get_messages(&m.id, "intruder", 10);
        assert!(matches!(result, Err(MatchingError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn append_then_read_back_preserves_order() {
        let (service, store, _tmp) = make_service();
        let m = insert_match(&store, "u1", "u2");
        accept(&store, &m.id);

        service.send_message(&m.id, "u1", text("m1")).await.unwrap();
        service.send_message(&m.id, "u2", text("m2")).await.unwrap();
        service.send_message(&m.id, "u1", text("m3")).await.unwrap();

        let messages = service.get_messages(&m.id, "u2", 100).unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.body.content()).collect();
        assert_eq!(contents, vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn rejects_empty_and_oversized_content() {
        let (service, store, _tmp) = make_service();
        let m = insert_match(&store, "u1", "u2");
        accept(&store, &m.id);

        let result = service.send_message(&m.id, "u1", text("   ")).await;
        assert!(matches!(result, Err(MatchingError::InvalidMessage(_))));

        let oversized = "x".repeat(MAX_MESSAGE_CHARS + 1);
        let result = service.send_message(&m.id, "u1", text(&oversized)).await;
        assert!(matches!(result, Err(MatchingError::InvalidMessage(_))));
    }

    #[tokio::test]
    async fn delete_is_sender_only() {
        let (service, store, _tmp) = make_service();
        let m = insert_match(&store, "u1", "u2");
        accept(&store, &m.id);
        let message = service.send_message(&m.id, "u1", text("oops")).await.unwrap();

        let result = service.delete_message(&message.id, "u2");
        assert!(matches!(result, Err(MatchingError::Forbidden { .. })));

        service.delete_message(&message.id, "u1").unwrap();
        let result = service.delete_message(&message.id, "u1");
        assert!(matches!(result, Err(MatchingError::NotFound(_))));
    }

    #[tokio::test]
    async fn send_publishes_a_copy_to_the_realtime_channel() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(SqliteMatchStore::new(tmp.path().join("match.db")).unwrap());
        let notifier = Arc::new(ChannelNotifier::new(16));
        let mut rx = notifier.subscribe();
        let service = ChatService::new(store.clone(), notifier.clone());

        let m = insert_match(&store, "u1", "u2");
        accept(&store, &m.id);
        service.send_message(&m.id, "u1", text("ping")).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.recipient_id, "u2");
        assert_eq!(event.message.body.content(), "ping");
    }

    #[tokio::test]
    async fn unknown_match_is_not_found() {
        let (service, _store, _tmp) = make_service();
        let result = service.send_message("missing", "u1", text("hi")).await;
        assert!(matches!(result, Err(MatchingError::NotFound(_))));
    }
}
