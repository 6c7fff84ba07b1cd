//! Scripted transport for tests.

use crate::error::TransportError;
use crate::ports::inbound::TransportEvent;
use crate::ports::outbound::{BroadcastHandle, LocalRollback, ReplicationTransport};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{AckPhase, NodeId, PrimaryDecision, RequestEnvelope, RequestId};
use tokio::sync::mpsc;

/// How the simulated replicas answer one phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplicaReply {
    /// Every replica acks success.
    Succeed,
    /// The first replica acks failure, the rest succeed.
    Fail,
    /// Nobody answers.
    Silent,
}

/// Replies per phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AckPolicy {
    pub process: ReplicaReply,
    pub log: ReplicaReply,
    pub abort: ReplicaReply,
}

impl Default for AckPolicy {
    fn default() -> Self {
        Self {
            process: ReplicaReply::Succeed,
            log: ReplicaReply::Succeed,
            abort: ReplicaReply::Succeed,
        }
    }
}

/// Transport whose replicas answer from an `AckPolicy`.
///
/// Replies are pushed into the channel returned by `new`; feed it to
/// `RequestCoordinator::spawn_event_pump`. Everything sent is recorded.
pub struct MockReplicationTransport {
    replicas: Vec<NodeId>,
    policy: RwLock<AckPolicy>,
    events: mpsc::UnboundedSender<TransportEvent>,
    broadcasts: RwLock<Vec<RequestEnvelope>>,
    decisions: RwLock<Vec<(RequestId, PrimaryDecision)>>,
    acks: RwLock<Vec<(RequestId, AckPhase, bool)>>,
}

impl MockReplicationTransport {
    /// Transport with replicas `node-2 ..= node-(replica_count + 1)`.
    pub fn new(replica_count: usize) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let replicas = (2u32..).take(replica_count).map(NodeId).collect();
        let transport = Self {
            replicas,
            policy: RwLock::new(AckPolicy::default()),
            events,
            broadcasts: RwLock::new(Vec::new()),
            decisions: RwLock::new(Vec::new()),
            acks: RwLock::new(Vec::new()),
        };
        (transport, rx)
    }

    pub fn set_policy(&self, policy: AckPolicy) {
        *self.policy.write() = policy;
    }

    pub fn broadcasts(&self) -> Vec<RequestEnvelope> {
        self.broadcasts.read().clone()
    }

    pub fn decisions(&self) -> Vec<(RequestId, PrimaryDecision)> {
        self.decisions.read().clone()
    }

    /// Acks sent by this node (replica role).
    pub fn acks(&self) -> Vec<(RequestId, AckPhase, bool)> {
        self.acks.read().clone()
    }

    /// Push an arbitrary event, as if it came off the wire.
    pub fn inject(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    fn reply(&self, request_id: RequestId, phase: AckPhase, reply: ReplicaReply) {
        if reply == ReplicaReply::Silent {
            return;
        }
        for (i, from) in self.replicas.iter().enumerate() {
            let success = !(reply == ReplicaReply::Fail && i == 0);
            self.inject(TransportEvent::Ack {
                request_id,
                from: *from,
                phase,
                success,
            });
        }
    }
}

#[async_trait]
impl ReplicationTransport for MockReplicationTransport {
    fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    async fn broadcast(
        &self,
        envelope: &RequestEnvelope,
        _packed: Vec<u8>,
    ) -> Result<BroadcastHandle, TransportError> {
        self.broadcasts.write().push(envelope.clone());
        let policy = *self.policy.read();
        self.reply(envelope.request_id, AckPhase::Process, policy.process);
        Ok(BroadcastHandle {
            request_id: envelope.request_id,
            replicas: self.replicas.clone(),
        })
    }

    async fn send_decision(
        &self,
        handle: &BroadcastHandle,
        decision: PrimaryDecision,
    ) -> Result<(), TransportError> {
        self.decisions.write().push((handle.request_id, decision));
        let policy = *self.policy.read();
        match decision {
            PrimaryDecision::Commit { log: true } => {
                self.reply(handle.request_id, AckPhase::Log, policy.log)
            }
            PrimaryDecision::Commit { log: false } => {}
            PrimaryDecision::Abort => self.reply(handle.request_id, AckPhase::Abort, policy.abort),
        }
        Ok(())
    }

    async fn send_ack(
        &self,
        request_id: RequestId,
        phase: AckPhase,
        success: bool,
    ) -> Result<(), TransportError> {
        self.acks.write().push((request_id, phase, success));
        Ok(())
    }
}

/// Rollback handler that records what it was asked to undo.
#[derive(Default)]
pub struct RecordingRollback {
    rolled_back: RwLock<Vec<RequestId>>,
}

impl RecordingRollback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rolled_back(&self) -> Vec<RequestId> {
        self.rolled_back.read().clone()
    }
}

#[async_trait]
impl LocalRollback for RecordingRollback {
    async fn rollback(&self, envelope: &RequestEnvelope) {
        self.rolled_back.write().push(envelope.request_id);
    }
}
