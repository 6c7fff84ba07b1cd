//! # Coordination Protocol Vocabulary
//!
//! Small value types exchanged between a primary and its replicas.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol phase an acknowledgement answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckPhase {
    /// The replica finished executing the request locally.
    Process,
    /// The replica appended the request to its own log.
    Log,
    /// The replica discarded the request after an abort.
    Abort,
}

impl AckPhase {
    /// Short name used in logs and metric labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AckPhase::Process => "process",
            AckPhase::Log => "log",
            AckPhase::Abort => "abort",
        }
    }
}

impl fmt::Display for AckPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome the primary announces to replicas once their execution acks are in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimaryDecision {
    /// Keep the local effects. With `log`, also append the request to the
    /// replica's log and acknowledge with [`AckPhase::Log`].
    Commit { log: bool },
    /// Discard the local effects and acknowledge with [`AckPhase::Abort`].
    Abort,
}

impl PrimaryDecision {
    /// True for [`PrimaryDecision::Abort`].
    #[must_use]
    pub fn is_abort(self) -> bool {
        matches!(self, PrimaryDecision::Abort)
    }
}
