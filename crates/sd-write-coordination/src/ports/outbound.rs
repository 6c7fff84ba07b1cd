//! Driven Ports (SPI - Outbound Dependencies)

use crate::error::{LogResult, TransportError};
use async_trait::async_trait;
use shared_types::{AckPhase, LogId, NodeId, PrimaryDecision, RequestEnvelope, RequestId};

/// Write-ahead request log.
///
/// Appends are durable when `append` returns.
pub trait RequestLog: Send + Sync {
    /// Open (or create) the log. Called once by `init`.
    fn open(&self) -> LogResult<()>;

    /// Append an envelope under its `inc_id`, which must follow the last
    /// logged id.
    fn append(&self, envelope: &RequestEnvelope) -> LogResult<LogId>;

    /// Every entry with id `>= from`, in id order.
    fn read_from(&self, from: LogId) -> LogResult<Vec<RequestEnvelope>>;

    /// Id of the last appended entry.
    fn last_log_id(&self) -> Option<LogId>;
}

/// Returned by a broadcast; identifies who must acknowledge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BroadcastHandle {
    pub request_id: RequestId,
    pub replicas: Vec<NodeId>,
}

impl BroadcastHandle {
    #[must_use]
    pub fn expected_acks(&self) -> usize {
        self.replicas.len()
    }
}

/// Messaging between the primary and its replicas.
///
/// Replies come back as `TransportEvent`s through
/// `RequestCoordinator::handle_transport_event`.
#[async_trait]
pub trait ReplicationTransport: Send + Sync {
    /// Replicas that will receive the next broadcast.
    fn replica_count(&self) -> usize;

    /// Primary: send the packed envelope to every replica.
    async fn broadcast(
        &self,
        envelope: &RequestEnvelope,
        packed: Vec<u8>,
    ) -> Result<BroadcastHandle, TransportError>;

    /// Primary: announce commit or abort.
    async fn send_decision(
        &self,
        handle: &BroadcastHandle,
        decision: PrimaryDecision,
    ) -> Result<(), TransportError>;

    /// Replica: acknowledge a phase to the primary.
    async fn send_ack(
        &self,
        request_id: RequestId,
        phase: AckPhase,
        success: bool,
    ) -> Result<(), TransportError>;
}

/// Discards the local effects of an aborted request.
#[async_trait]
pub trait LocalRollback: Send + Sync {
    async fn rollback(&self, envelope: &RequestEnvelope);
}

/// Executes a request on a replica.
#[async_trait]
pub trait ReplicaRequestHandler: Send + Sync {
    /// Apply the envelope locally; `true` on success.
    async fn execute(&self, envelope: &RequestEnvelope) -> bool;
}
