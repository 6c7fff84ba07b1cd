//! # Replication Events
//!
//! Defines all event types that flow through the shared bus between the
//! primary, its replicas and the leader-election service.

use serde::{Deserialize, Serialize};
use shared_types::{AckPhase, NodeId, PrimaryDecision, RequestId};

/// All events that can be published to the replication bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReplicationEvent {
    // =========================================================================
    // PRIMARY → REPLICAS
    // =========================================================================
    /// A request the primary executed successfully, to be applied by replicas.
    /// `packed` is the packed `RequestEnvelope` including primary-computed data.
    RequestBroadcast {
        request_id: RequestId,
        from: NodeId,
        to: Vec<NodeId>,
        request_type: u32,
        packed: Vec<u8>,
    },

    /// The primary's outcome for a broadcast request.
    Decision {
        request_id: RequestId,
        from: NodeId,
        to: Vec<NodeId>,
        decision: PrimaryDecision,
    },

    // =========================================================================
    // REPLICA → PRIMARY
    // =========================================================================
    /// Acknowledgement of one protocol phase.
    Ack {
        request_id: RequestId,
        from: NodeId,
        to: NodeId,
        phase: AckPhase,
        success: bool,
    },

    // =========================================================================
    // ELECTION SERVICE
    // =========================================================================
    /// A leader-election cycle completed; every node must drop in-flight
    /// coordination state.
    ElectingFinished { leader: NodeId },
}

impl ReplicationEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::RequestBroadcast { .. } => EventTopic::Requests,
            Self::Decision { .. } => EventTopic::Decisions,
            Self::Ack { .. } => EventTopic::Acks,
            Self::ElectingFinished { .. } => EventTopic::Election,
        }
    }

    /// Whether `node` is an addressee of this event.
    ///
    /// Election notifications are addressed to every node.
    #[must_use]
    pub fn is_addressed_to(&self, node: NodeId) -> bool {
        match self {
            Self::RequestBroadcast { to, .. } | Self::Decision { to, .. } => to.contains(&node),
            Self::Ack { to, .. } => *to == node,
            Self::ElectingFinished { .. } => true,
        }
    }

    /// Request the event belongs to, if any.
    #[must_use]
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::RequestBroadcast { request_id, .. }
            | Self::Decision { request_id, .. }
            | Self::Ack { request_id, .. } => Some(*request_id),
            Self::ElectingFinished { .. } => None,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Request broadcasts from a primary.
    Requests,
    /// Commit/abort decisions from a primary.
    Decisions,
    /// Acknowledgements from replicas.
    Acks,
    /// Leader-election notifications.
    Election,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Only events addressed to this node. `None` means any recipient.
    pub recipient: Option<NodeId>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            recipient: None,
        }
    }

    /// Restrict the filter to events addressed to `node`.
    #[must_use]
    pub fn addressed_to(mut self, node: NodeId) -> Self {
        self.recipient = Some(node);
        self
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &ReplicationEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let recipient_match = self
            .recipient
            .map_or(true, |node| event.is_addressed_to(node));

        topic_match && recipient_match
    }
}
