//! # Inboxes
//!
//! Every subscription owns a bounded inbox. The bus matches an event against
//! each inbox's filter at publish time, so a node's inbox only ever holds
//! traffic addressed to it and `recv` never has to skip anything.

use crate::events::{EventFilter, ReplicationEvent};
use shared_types::NodeId;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was dropped.
    #[error("Event bus closed")]
    Closed,
}

/// What happened when an event was offered to one inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// The event is not for this inbox.
    NotAddressed,
    /// The subscriber fell behind; the event was dropped for it.
    Full,
    /// The subscription was dropped.
    Gone,
}

/// Bus-side half of a subscription.
pub(crate) struct Inbox {
    filter: EventFilter,
    sender: mpsc::Sender<ReplicationEvent>,
}

impl Inbox {
    /// Open an inbox holding up to `capacity` undelivered events.
    pub fn open(filter: EventFilter, capacity: usize) -> (Self, Subscription) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let subscription = Subscription {
            recipient: filter.recipient,
            receiver,
        };
        (Self { filter, sender }, subscription)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn offer(&self, event: &ReplicationEvent) -> Delivery {
        if !self.filter.matches(event) {
            return Delivery::NotAddressed;
        }
        match self.sender.try_send(event.clone()) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    recipient = ?self.filter.recipient,
                    request_id = ?event.request_id(),
                    "Inbox full, event dropped"
                );
                Delivery::Full
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Gone,
        }
    }
}

/// A node's handle for receiving its events.
///
/// Dropping it closes the inbox; the bus forgets it on the next publish.
pub struct Subscription {
    recipient: Option<NodeId>,
    receiver: mpsc::Receiver<ReplicationEvent>,
}

impl Subscription {
    /// Node this subscription receives for, `None` when it sees all traffic.
    #[must_use]
    pub fn recipient(&self) -> Option<NodeId> {
        self.recipient
    }

    /// Wait for the next event. `None` once the bus is gone and the inbox
    /// is drained.
    pub async fn recv(&mut self) -> Option<ReplicationEvent> {
        self.receiver.recv().await
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Result<Option<ReplicationEvent>, SubscriptionError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(SubscriptionError::Closed),
        }
    }
}
