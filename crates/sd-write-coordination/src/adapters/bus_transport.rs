//! Replication Transport Adapter
//!
//! Implements `ReplicationTransport` on the shared event bus.

use crate::error::TransportError;
use crate::ports::outbound::{BroadcastHandle, ReplicationTransport};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_bus::{EventPublisher, InMemoryEventBus, ReplicationEvent};
use shared_types::{AckPhase, NodeId, PrimaryDecision, RequestEnvelope, RequestId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Event bus adapter for primary/replica messaging.
///
/// As primary it addresses the configured replica set; as replica it acks
/// to the node it currently follows.
pub struct BusReplicationTransport {
    node_id: NodeId,
    event_bus: Arc<InMemoryEventBus>,
    replicas: RwLock<Vec<NodeId>>,
    leader: RwLock<Option<NodeId>>,
}

impl BusReplicationTransport {
    pub fn new(node_id: NodeId, event_bus: Arc<InMemoryEventBus>) -> Self {
        Self {
            node_id,
            event_bus,
            replicas: RwLock::new(Vec::new()),
            leader: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn with_replicas(self, replicas: Vec<NodeId>) -> Self {
        *self.replicas.write() = replicas;
        self
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn set_replicas(&self, replicas: Vec<NodeId>) {
        *self.replicas.write() = replicas;
    }

    pub fn replicas(&self) -> Vec<NodeId> {
        self.replicas.read().clone()
    }

    /// Ack to `leader` from now on.
    pub fn follow_leader(&self, leader: NodeId) {
        let mut current = self.leader.write();
        if *current != Some(leader) {
            debug!("[sd-wc] {} now follows {}", self.node_id, leader);
            *current = Some(leader);
        }
    }

    pub fn leader(&self) -> Option<NodeId> {
        *self.leader.read()
    }
}

#[async_trait]
impl ReplicationTransport for BusReplicationTransport {
    fn replica_count(&self) -> usize {
        self.replicas.read().len()
    }

    async fn broadcast(
        &self,
        envelope: &RequestEnvelope,
        packed: Vec<u8>,
    ) -> Result<BroadcastHandle, TransportError> {
        let replicas = self.replicas();
        info!(
            "[sd-wc] 📤 Broadcasting {} {} to {} replicas",
            envelope.request_type,
            envelope.request_id,
            replicas.len()
        );

        let event = ReplicationEvent::RequestBroadcast {
            request_id: envelope.request_id,
            from: self.node_id,
            to: replicas.clone(),
            request_type: envelope.request_type.code(),
            packed,
        };
        let receivers = self.event_bus.publish(event).await;

        if receivers == 0 && !replicas.is_empty() {
            warn!("[sd-wc] ⚠️ No subscribers for broadcast {}", envelope.request_id);
            return Err(TransportError::NoReceivers {
                request_id: envelope.request_id,
            });
        }

        Ok(BroadcastHandle {
            request_id: envelope.request_id,
            replicas,
        })
    }

    async fn send_decision(
        &self,
        handle: &BroadcastHandle,
        decision: PrimaryDecision,
    ) -> Result<(), TransportError> {
        debug!(request_id = %handle.request_id, ?decision, "[sd-wc] 📤 Sending decision");
        let event = ReplicationEvent::Decision {
            request_id: handle.request_id,
            from: self.node_id,
            to: handle.replicas.clone(),
            decision,
        };
        let receivers = self.event_bus.publish(event).await;
        if receivers == 0 && !handle.replicas.is_empty() {
            return Err(TransportError::NoReceivers {
                request_id: handle.request_id,
            });
        }
        Ok(())
    }

    async fn send_ack(
        &self,
        request_id: RequestId,
        phase: AckPhase,
        success: bool,
    ) -> Result<(), TransportError> {
        let Some(leader) = self.leader() else {
            return Err(TransportError::Unreachable { node: self.node_id });
        };
        debug!(%request_id, %phase, success, "[sd-wc] 📤 Ack to {}", leader);
        let event = ReplicationEvent::Ack {
            request_id,
            from: self.node_id,
            to: leader,
            phase,
            success,
        };
        if self.event_bus.publish(event).await == 0 {
            return Err(TransportError::Unreachable { node: leader });
        }
        Ok(())
    }
}
