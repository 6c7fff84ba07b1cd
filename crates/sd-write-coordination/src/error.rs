//! Error types for write coordination

use crate::config::ConfigError;
use crate::domain::{ChainStatus, ProtocolPhase, WaitKind};
use shared_types::{EnvelopeError, LogId, NodeId, RequestId};
use std::path::PathBuf;
use thiserror::Error;

/// Write coordination errors
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Coordinator has not been initialized, or was shut down
    #[error("Write coordination context is not initialized")]
    InvalidContext,

    /// A request is already hooked on this node
    #[error("Request {active} is already hooked")]
    ReentrantHook { active: RequestId },

    /// Operation needs a hooked request
    #[error("No request is hooked")]
    NotHooked,

    /// Chain status would move backward or leave an absorbing state
    #[error("Invalid chain transition: cannot go from {from} to {to}")]
    ChainOrderViolation { from: ChainStatus, to: ChainStatus },

    /// Request type code is not part of the known set
    #[error("Unknown request type code: {code}")]
    UnknownRequestType { code: u32 },

    /// Packed envelope does not carry the announced request type
    #[error("Request type mismatch: announced {announced}, envelope carries {carried}")]
    RequestTypeMismatch { announced: u32, carried: u32 },

    /// Chain snapshot requested outside a continuation step, or never saved
    #[error("No previous chain data available")]
    NoPrevChainData,

    /// Operation not valid in the current protocol phase
    #[error("{operation} is not valid in phase {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: ProtocolPhase,
    },

    /// Local execution reported failure
    #[error("Local execution failed")]
    LocalExecutionFailure,

    /// A replica reported failure, or a wait timed out
    #[error("Replication failed while waiting for {phase}: {reason}")]
    ReplicationFailed { phase: WaitKind, reason: String },

    /// No callback arrived in time
    #[error("Timed out after {timeout_ms}ms waiting for {phase}")]
    ReplicationTimeout { phase: WaitKind, timeout_ms: u64 },

    /// The hooked request was reset (election, forced clear) while waiting
    #[error("Request {request_id} is no longer hooked")]
    StaleHook { request_id: RequestId },

    /// The primary decided to abort the request
    #[error("Request {request_id} was aborted by the primary")]
    Aborted { request_id: RequestId },

    /// Every log append attempt failed
    #[error("Request log write failed after {attempts} attempts: {reason}")]
    LogWriteFailed { attempts: u32, reason: String },

    /// Request log error
    #[error("Request log error: {0}")]
    Log(#[from] LogError),

    /// Envelope encoding error
    #[error("Envelope error: {0}")]
    Envelope(EnvelopeError),

    /// Transport could not deliver a message
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl From<EnvelopeError> for CoordinatorError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::UnknownRequestType { code } => {
                CoordinatorError::UnknownRequestType { code }
            }
            other => CoordinatorError::Envelope(other),
        }
    }
}

impl CoordinatorError {
    /// Collapse a timeout into the failure callers see from the
    /// high-level operations.
    #[must_use]
    pub fn into_replication_failure(self) -> Self {
        match self {
            CoordinatorError::ReplicationTimeout { phase, timeout_ms } => {
                CoordinatorError::ReplicationFailed {
                    phase,
                    reason: format!("no callback within {timeout_ms}ms"),
                }
            }
            other => other,
        }
    }
}

/// Request log errors
#[derive(Debug, Error)]
pub enum LogError {
    /// Log was used before `open`
    #[error("Request log is not open")]
    NotOpen,

    /// Appended id does not follow the last logged id
    #[error("Out-of-order append: last {last:?}, got {got}")]
    OutOfOrder { last: Option<LogId>, got: LogId },

    /// Another process holds the log directory
    #[error("Request log at {path} is locked by another process")]
    Locked { path: PathBuf },

    /// Stored frame failed its checksum
    #[error("Corrupt log frame at offset {offset}")]
    Corrupt { offset: u64 },

    /// Underlying I/O failure
    #[error("Request log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored envelope could not be encoded or decoded
    #[error("Request log envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Failure injected by a test adapter
    #[error("Injected append failure")]
    Injected,
}

/// Transport-level failures reported by a `ReplicationTransport`
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// No replica received the message
    #[error("No receivers for {request_id}")]
    NoReceivers { request_id: RequestId },

    /// Addressed node is not reachable
    #[error("Node {node} is unreachable")]
    Unreachable { node: NodeId },

    /// Message could not be encoded
    #[error("Encode failed: {0}")]
    Encode(String),
}

impl From<TransportError> for CoordinatorError {
    fn from(err: TransportError) -> Self {
        CoordinatorError::Transport {
            reason: err.to_string(),
        }
    }
}

/// Result type for coordination operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Result type for request log operations
pub type LogResult<T> = Result<T, LogError>;
