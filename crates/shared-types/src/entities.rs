//! # Core Domain Entities
//!
//! Identifiers shared by every node taking part in write coordination.
//!
//! ## Clusters
//!
//! - **Requests**: `RequestId`, `LogId`
//! - **Cluster**: `NodeId`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Unix timestamp in milliseconds.
pub type Timestamp = u64;

/// Current wall clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =============================================================================
// CLUSTER A: REQUESTS
// =============================================================================

/// Correlation identifier of one in-flight mutating request.
///
/// Generated by the primary when the request is hooked and carried by every
/// broadcast, decision and acknowledgement that belongs to it. A callback
/// whose id differs from the currently hooked request is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Generate a fresh random request id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequence number of an entry in the write-ahead request log.
///
/// Ids start at 1 and grow by one for every logged request. The primary
/// assigns the id before replication so replicas log under the same number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct LogId(pub u64);

impl LogId {
    /// The id of the very first log entry.
    pub const FIRST: LogId = LogId(1);

    /// The id that follows this one.
    #[must_use]
    pub fn next(self) -> LogId {
        LogId(self.0 + 1)
    }

    /// Id to assign after `last`, or [`LogId::FIRST`] for an empty log.
    #[must_use]
    pub fn after(last: Option<LogId>) -> LogId {
        last.map_or(LogId::FIRST, LogId::next)
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// CLUSTER B: CLUSTER MEMBERSHIP
// =============================================================================

/// Identifier of a node in the search cluster.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}
