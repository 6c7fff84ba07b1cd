//! Coordinator state: the single hook slot and its armed callback wait.

use crate::domain::{ChainStatus, HookRole, ProtocolPhase, WaitKind};
use crate::ports::inbound::LocalOutcome;
use crate::ports::outbound::BroadcastHandle;
use shared_types::{NodeId, PrimaryDecision, RequestEnvelope, RequestId};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;

/// How an armed wait resolved.
#[derive(Debug)]
pub(crate) enum WaitOutcome {
    /// Every expected replica acked success.
    Acked,
    /// A replica acked failure.
    Failed { from: NodeId },
    /// The primary's decision arrived.
    Decision(PrimaryDecision),
}

/// One outstanding callback wait.
///
/// Armed before the message that triggers the callbacks is sent, so an
/// early reply is never lost. Dropping it wakes the waiter with a closed
/// channel.
pub(crate) struct ArmedWait {
    pub kind: WaitKind,
    expected: usize,
    acked: BTreeSet<NodeId>,
    sender: Option<oneshot::Sender<WaitOutcome>>,
    pub receiver: Option<oneshot::Receiver<WaitOutcome>>,
}

impl ArmedWait {
    pub fn new(kind: WaitKind, expected: usize) -> Self {
        let (sender, receiver) = oneshot::channel();
        let mut wait = Self {
            kind,
            expected,
            acked: BTreeSet::new(),
            sender: Some(sender),
            receiver: Some(receiver),
        };
        if kind != WaitKind::Primary && expected == 0 {
            wait.resolve(WaitOutcome::Acked);
        }
        wait
    }

    pub fn resolve(&mut self, outcome: WaitOutcome) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(outcome);
        }
    }

    /// Count a replica ack. Duplicates from the same replica count once.
    pub fn record_ack(&mut self, from: NodeId, success: bool) {
        if self.sender.is_none() {
            return;
        }
        if !success {
            self.resolve(WaitOutcome::Failed { from });
            return;
        }
        self.acked.insert(from);
        if self.acked.len() >= self.expected {
            self.resolve(WaitOutcome::Acked);
        }
    }

    /// Adjust the expected count once the broadcast reports its replica set.
    pub fn set_expected(&mut self, expected: usize) {
        self.expected = expected;
        if self.sender.is_some() && self.acked.len() >= expected {
            self.resolve(WaitOutcome::Acked);
        }
    }
}

/// The hooked request.
pub(crate) struct ActiveRequest {
    pub request_id: RequestId,
    pub role: HookRole,
    /// Request as it reached this node: the caller's raw request on a
    /// primary, the packed envelope on a replica.
    pub raw: Vec<u8>,
    pub envelope: Option<RequestEnvelope>,
    pub phase: ProtocolPhase,
    pub chain_status: ChainStatus,
    pub chain_snapshot: Option<RequestEnvelope>,
    pub broadcast: Option<BroadcastHandle>,
    /// Decision that arrived before the replica started waiting for it.
    pub pending_decision: Option<PrimaryDecision>,
    pub wait: Option<ArmedWait>,
}

impl ActiveRequest {
    pub fn new(request_id: RequestId, role: HookRole, phase: ProtocolPhase) -> Self {
        Self {
            request_id,
            role,
            raw: Vec::new(),
            envelope: None,
            phase,
            chain_status: ChainStatus::NoChain,
            chain_snapshot: None,
            broadcast: None,
            pending_decision: None,
            wait: None,
        }
    }

    #[must_use]
    pub fn with_envelope(mut self, envelope: RequestEnvelope) -> Self {
        self.envelope = Some(envelope);
        self
    }

    #[must_use]
    pub fn with_raw(mut self, raw: Vec<u8>) -> Self {
        self.raw = raw;
        self
    }

    pub fn addition_data(&self) -> Vec<u8> {
        self.raw.clone()
    }
}

#[derive(Default)]
pub(crate) struct CoordinatorState {
    pub initialized: bool,
    pub active: Option<ActiveRequest>,
    pub last_outcome: Option<LocalOutcome>,
}

impl CoordinatorState {
    /// The hooked request if it is `request_id`.
    pub fn active_for(&mut self, request_id: RequestId) -> Option<&mut ActiveRequest> {
        self.active
            .as_mut()
            .filter(|active| active.request_id == request_id)
    }
}

/// Counters since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub prepared: u64,
    pub committed: u64,
    pub aborted: u64,
    pub log_appends: u64,
    pub stale_callbacks: u64,
    pub election_resets: u64,
}

#[derive(Default)]
pub(crate) struct Counters {
    pub prepared: AtomicU64,
    pub committed: AtomicU64,
    pub aborted: AtomicU64,
    pub log_appends: AtomicU64,
    pub stale_callbacks: AtomicU64,
    pub election_resets: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CoordinatorStats {
        CoordinatorStats {
            prepared: self.prepared.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            log_appends: self.log_appends.load(Ordering::Relaxed),
            stale_callbacks: self.stale_callbacks.load(Ordering::Relaxed),
            election_resets: self.election_resets.load(Ordering::Relaxed),
        }
    }
}
