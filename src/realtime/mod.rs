//! Realtime delivery seam: each stored chat message is handed to a notifier
//! so a transport layer (websocket, push) can forward it to the other
//! participant. Delivery is best-effort and never fails the append.

use crate::chat::Message;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

/// A copy of a stored message, addressed to the participant that should be
/// poked about it.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub recipient_id: String,
    pub message: Message,
}

#[async_trait]
pub trait RealtimeNotifier: Send + Sync {
    async fn notify(&self, event: MessageEvent);
}

/// In-process fan-out over a broadcast channel. Transport handlers subscribe
/// and filter by recipient; with nobody subscribed events are dropped.
pub struct ChannelNotifier {
    sender: broadcast::Sender<MessageEvent>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        ChannelNotifier { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MessageEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl RealtimeNotifier for ChannelNotifier {
    async fn notify(&self, event: MessageEvent) {
        if let Err(e) = self.sender.send(event) {
            debug!("No realtime subscribers for message event: {}", e);
        }
    }
}

/// Used in tests and when no transport is wired up.
pub struct NoOpNotifier;

#[async_trait]
impl RealtimeNotifier for NoOpNotifier {
    async fn notify(&self, _event: MessageEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MessageBody;

    fn make_event(recipient: &str) -> MessageEvent {
        MessageEvent {
            recipient_id: recipient.to_string(),
            message: Message {
                id: "m1".to_string(),
                match_id: "match1".to_string(),
                sender_id: "u1".to_string(),
                seq: 0,
                body: MessageBody::Text {
                    content: "hi".to_string(),
                },
                created_at: 1700000000,
                read: false,
            },
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let notifier = ChannelNotifier::new(16);
        let mut rx = notifier.subscribe();

        notifier.notify(make_event("u2")).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.recipient_id, "u2");
        assert_eq!(event.message.body.content(), "hi");
    }

    #[tokio::test]
    async fn publishing_without_subscribers_does_not_panic() {
        let notifier = ChannelNotifier::new(16);
        notifier.notify(make_event("u2")).await;
    }
}
