//! # Protocol Phases
//!
//! Where the hooked request stands in the replication protocol.
//!
//! ```text
//! PRIMARY                                     REPLICA
//! ───────                                     ───────
//! Hooked ──prepare──► Prepared                Prepared (from broadcast)
//!        │                │                       │
//!        │          LocalExecuting            LocalExecuting
//!        │           │         │                  │
//!        │   ChainStepDone  LocalSucceeded   AwaitingPrimary
//!        │     (hooked)        │                  │
//!        │         AwaitingReplicasProcess   Committing ──► LogWritten
//!        │                     │                  │
//!        │               Committing ─► LogWritten Committed
//!        │                     │
//!        │             AwaitingReplicasLog
//!        │                     │
//!        └───────────────► Committed
//!
//! any failure ──► Aborting ──► Failed
//! ```

use serde::{Deserialize, Serialize};
use shared_types::AckPhase;
use std::fmt;

/// Phase of the hooked request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolPhase {
    /// Raw request hooked, no envelope built yet.
    Hooked,
    /// Envelope built (primary) or received (replica).
    Prepared,
    /// Local execution started.
    LocalExecuting,
    /// An intermediate chain step finished; the request stays hooked.
    ChainStepDone,
    /// Local execution succeeded, nothing replicated yet.
    LocalSucceeded,
    /// Broadcast sent, waiting for every replica's execution ack.
    AwaitingReplicasProcess,
    /// Replicas executed (primary) or commit received (replica).
    Committing,
    /// The request is durable in the local log.
    LogWritten,
    /// Commit sent, waiting for every replica's log ack.
    AwaitingReplicasLog,
    /// Execution ack sent, waiting for the primary's decision.
    AwaitingPrimary,
    /// Abort in progress.
    Aborting,
    /// Protocol finished successfully.
    Committed,
    /// Protocol finished with a failure.
    Failed,
}

impl ProtocolPhase {
    /// Phases that a non-forced clear must not interrupt.
    #[must_use]
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            ProtocolPhase::LocalExecuting
                | ProtocolPhase::LocalSucceeded
                | ProtocolPhase::AwaitingReplicasProcess
                | ProtocolPhase::Committing
                | ProtocolPhase::LogWritten
                | ProtocolPhase::AwaitingReplicasLog
                | ProtocolPhase::AwaitingPrimary
                | ProtocolPhase::Aborting
        )
    }

    /// Phases from which local execution may start.
    #[must_use]
    pub fn can_begin_local(self) -> bool {
        matches!(
            self,
            ProtocolPhase::Prepared | ProtocolPhase::ChainStepDone
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolPhase::Hooked => "hooked",
            ProtocolPhase::Prepared => "prepared",
            ProtocolPhase::LocalExecuting => "local_executing",
            ProtocolPhase::ChainStepDone => "chain_step_done",
            ProtocolPhase::LocalSucceeded => "local_succeeded",
            ProtocolPhase::AwaitingReplicasProcess => "awaiting_replicas_process",
            ProtocolPhase::Committing => "committing",
            ProtocolPhase::LogWritten => "log_written",
            ProtocolPhase::AwaitingReplicasLog => "awaiting_replicas_log",
            ProtocolPhase::AwaitingPrimary => "awaiting_primary",
            ProtocolPhase::Aborting => "aborting",
            ProtocolPhase::Committed => "committed",
            ProtocolPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for ProtocolPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an armed wait is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaitKind {
    /// Every replica's execution ack.
    ReplicasProcess,
    /// Every replica's log ack.
    ReplicasLog,
    /// Every replica's abort ack.
    ReplicasAbort,
    /// The primary's commit/abort decision.
    Primary,
}

impl WaitKind {
    /// Ack phase that completes this wait, if it waits on replica acks.
    #[must_use]
    pub fn ack_phase(self) -> Option<AckPhase> {
        match self {
            WaitKind::ReplicasProcess => Some(AckPhase::Process),
            WaitKind::ReplicasLog => Some(AckPhase::Log),
            WaitKind::ReplicasAbort => Some(AckPhase::Abort),
            WaitKind::Primary => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WaitKind::ReplicasProcess => "replicas_process",
            WaitKind::ReplicasLog => "replicas_log",
            WaitKind::ReplicasAbort => "replicas_abort",
            WaitKind::Primary => "primary",
        }
    }
}

impl fmt::Display for WaitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
