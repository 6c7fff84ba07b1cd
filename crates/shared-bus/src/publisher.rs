//! # Event Publisher
//!
//! Routes each published event to the inboxes of its addressees.

use crate::events::{EventFilter, ReplicationEvent};
use crate::subscriber::{Delivery, Inbox, Subscription};
use crate::INBOX_CAPACITY;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Sending side of the replication bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event.
    ///
    /// # Returns
    ///
    /// How many subscriptions the event was delivered to. Zero means none
    /// of its addressees is listening.
    async fn publish(&self, event: ReplicationEvent) -> usize;
}

/// Bus for nodes sharing one process (tests, single-host clusters).
///
/// Networked deployments put an RPC transport behind the same events.
pub struct InMemoryEventBus {
    inboxes: Mutex<Vec<Inbox>>,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inboxes: Mutex::new(Vec::new()),
        }
    }

    /// Open an inbox for events matching `filter`.
    ///
    /// Only events published after this call are delivered.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(topics = ?filter.topics, recipient = ?filter.recipient, "New subscription");
        let (inbox, subscription) = Inbox::open(filter, INBOX_CAPACITY);
        self.inboxes.lock().push(inbox);
        subscription
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: ReplicationEvent) -> usize {
        let mut inboxes = self.inboxes.lock();
        inboxes.retain(|inbox| !inbox.is_closed());

        let delivered = inboxes
            .iter()
            .filter(|inbox| inbox.offer(&event) == Delivery::Delivered)
            .count();
        drop(inboxes);

        if delivered == 0 {
            warn!(
                topic = ?event.topic(),
                request_id = ?event.request_id(),
                "Event not delivered, no addressee listening"
            );
        } else {
            debug!(
                topic = ?event.topic(),
                request_id = ?event.request_id(),
                delivered,
                "Event published"
            );
        }
        delivered
    }
}
