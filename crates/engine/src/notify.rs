//! Change-notification signal for real-time observers.
//!
//! After any committed mutation to a points account, order, or institute the
//! engine publishes the affected entity's id. Events carry no payload;
//! consumers re-fetch through the read API. Lagging or absent subscribers
//! never block a commit.

use tokio::sync::broadcast;

use stride_core::ChangedEntity;

/// Default buffered event capacity per subscriber.
const CHANNEL_CAPACITY: usize = 256;

/// Fan-out publisher of committed-change events.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangedEntity>,
}

impl ChangeNotifier {
    /// Create a notifier with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    /// Create a notifier with an explicit per-subscriber buffer.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to committed-change events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangedEntity> {
        self.tx.subscribe()
    }

    /// Publish an event. A send with no live subscribers is not an error.
    pub fn publish(&self, event: ChangedEntity) {
        let _ = self.tx.send(event);
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_core::{InstituteId, UserId};

    #[tokio::test]
    async fn test_publish_and_receive() {
        let notifier = ChangeNotifier::new();
        let mut rx = notifier.subscribe();

        notifier.publish(ChangedEntity::Account(UserId::new(1)));
        notifier.publish(ChangedEntity::Institute(InstituteId::new(2)));

        assert_eq!(
            rx.recv().await.expect("event"),
            ChangedEntity::Account(UserId::new(1))
        );
        assert_eq!(
            rx.recv().await.expect("event"),
            ChangedEntity::Institute(InstituteId::new(2))
        );
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let notifier = ChangeNotifier::new();
        notifier.publish(ChangedEntity::Account(UserId::new(1)));
    }
}
