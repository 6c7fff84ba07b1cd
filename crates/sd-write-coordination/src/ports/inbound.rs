//! Driving Ports (API - Inbound)
//!
//! What request handlers, the transport and the election service call.

use crate::domain::{ChainStatus, HookRole};
use crate::error::CoordinatorResult;
use async_trait::async_trait;
use shared_types::{AckPhase, NodeId, PrimaryDecision, RequestEnvelope, RequestId, RequestType};

/// A callback delivered to the coordinator.
///
/// Every variant except the election notice names the request it belongs
/// to; callbacks for any other request are ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// Replica acknowledgement (delivered to the primary).
    Ack {
        request_id: RequestId,
        from: NodeId,
        phase: AckPhase,
        success: bool,
    },
    /// Primary decision (delivered to a replica).
    Decision {
        request_id: RequestId,
        decision: PrimaryDecision,
    },
    /// Leader election finished; every hook is force-exited.
    ElectingFinished,
}

impl TransportEvent {
    #[must_use]
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            TransportEvent::Ack { request_id, .. } | TransportEvent::Decision { request_id, .. } => {
                Some(*request_id)
            }
            TransportEvent::ElectingFinished => None,
        }
    }
}

/// How the most recent local execution ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalOutcome {
    pub request_id: RequestId,
    pub success: bool,
}

/// Write coordination API
///
/// One request may be hooked at a time. Operations that need a hooked
/// request fail with `NotHooked` otherwise; operations that would hook fail
/// with `ReentrantHook` when something already is.
#[async_trait]
pub trait WriteCoordinationApi: Send + Sync {
    /// Whether `init` ran and `shutdown` has not.
    fn is_valid(&self) -> bool;

    // =========================================================================
    // HOOKING
    // =========================================================================

    /// Build the envelope for a new local request and hook it as primary.
    ///
    /// Hooks through `hook_current_req`, or takes over a raw hook made
    /// earlier by it. Assigns `inc_id = last logged id + 1`.
    fn prepare(&self, request_type: RequestType, body: Vec<u8>)
        -> CoordinatorResult<RequestEnvelope>;

    /// Hook a raw request as primary without building an envelope. A later
    /// `prepare` attaches the envelope to this hook.
    fn hook_current_req(&self, raw: Vec<u8>) -> CoordinatorResult<RequestId>;

    /// Hook a request broadcast by the primary.
    fn on_request_from_primary(&self, type_code: u32, packed: &[u8])
        -> CoordinatorResult<RequestEnvelope>;

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    fn is_hooked(&self) -> bool;

    fn hook_type(&self) -> HookRole;

    /// Request data as hooked: the raw caller request on a primary, the
    /// packed envelope on a replica. Empty when unhooked.
    fn addition_data(&self) -> Vec<u8>;

    /// Envelope of the hooked request, if one was built or received.
    fn current_envelope(&self) -> Option<RequestEnvelope>;

    // =========================================================================
    // CHAINS
    // =========================================================================

    /// Move the hooked request's chain status. Succeeds without effect when
    /// nothing is hooked.
    fn set_chain_status(&self, status: ChainStatus) -> CoordinatorResult<bool>;

    /// Chain status of the hooked request (`NoChain` when unhooked).
    fn chain_status(&self) -> ChainStatus;

    /// Snapshot left by the previous chain step.
    fn read_prev_chain_data(&self) -> CoordinatorResult<RequestEnvelope>;

    // =========================================================================
    // LOCAL EXECUTION
    // =========================================================================

    fn process_local_begin(&self) -> CoordinatorResult<()>;

    /// Report the end of local execution and drive the protocol to a
    /// definite outcome.
    async fn process_local_finished(&self, success: bool) -> CoordinatorResult<()>;

    /// Same as `process_local_finished`, replacing the envelope with the
    /// executor's updated copy first.
    async fn process_local_finished_with(
        &self,
        success: bool,
        updated: RequestEnvelope,
    ) -> CoordinatorResult<()>;

    /// Finish a request that never reached `prepare`. Always unhooked
    /// afterward.
    async fn process_finished_before_prepare(&self, success: bool) -> bool;

    // =========================================================================
    // LOG AND CALLBACK WAITS
    // =========================================================================

    async fn write_local_log(&self) -> CoordinatorResult<bool>;

    async fn wait_replicas_process_callback(&self) -> CoordinatorResult<()>;

    async fn wait_replicas_log_callback(&self) -> CoordinatorResult<()>;

    async fn wait_primary_callback(&self) -> CoordinatorResult<PrimaryDecision>;

    // =========================================================================
    // ABORT
    // =========================================================================

    /// Primary: tell replicas to abort the hooked request.
    async fn abort_request(&self) -> CoordinatorResult<()>;

    /// Replica: roll back, acknowledge the abort and clear.
    async fn abort_request_callback(&self) -> CoordinatorResult<()>;

    async fn wait_replicas_abort_callback(&self) -> CoordinatorResult<()>;

    // =========================================================================
    // CLEARING
    // =========================================================================

    /// Reset the hook. Without `force`, refuses while a protocol phase is in
    /// flight.
    fn clear_hook(&self, force: bool) -> CoordinatorResult<()>;

    /// Force-exit every hook after a leader election.
    fn on_electing_finished(&self);
}
