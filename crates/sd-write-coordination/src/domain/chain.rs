//! Chain status for multi-step requests.
//!
//! A logical operation that is broken into several sub-requests (a bulk
//! reindex over N batches, a rebuild followed by a config switch) keeps the
//! coordinator hooked across its steps and walks forward through
//! `ChainBegin → ChainMiddle* → ChainEnd`.
//!
//! ```text
//! NoChain < ChainBegin < ChainMiddle < ChainEnd      (forward only)
//!
//! ChainStop, Unknown                                 (absorbing)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of the hooked request inside a chained operation.
///
/// The derived `Ord` follows declaration order and is the single definition
/// of chain ordering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum ChainStatus {
    /// Not part of a multi-step operation.
    #[default]
    NoChain,
    /// First step.
    ChainBegin,
    /// Any intermediate step.
    ChainMiddle,
    /// Last step; completing it replicates the accumulated result.
    ChainEnd,
    /// Chain terminated early from outside.
    ChainStop,
    /// Status could not be determined.
    Unknown,
}

impl ChainStatus {
    /// Absorbing states accept no further change.
    #[must_use]
    pub fn is_terminal_stop(self) -> bool {
        matches!(self, ChainStatus::ChainStop | ChainStatus::Unknown)
    }

    /// Steps that finish without replicating; the request stays hooked for
    /// the next step.
    #[must_use]
    pub fn is_intermediate(self) -> bool {
        matches!(self, ChainStatus::ChainBegin | ChainStatus::ChainMiddle)
    }

    /// Steps that may read the snapshot left by the previous step.
    #[must_use]
    pub fn has_previous_step(self) -> bool {
        matches!(
            self,
            ChainStatus::ChainMiddle | ChainStatus::ChainEnd | ChainStatus::ChainStop
        )
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChainStatus::NoChain => "no_chain",
            ChainStatus::ChainBegin => "chain_begin",
            ChainStatus::ChainMiddle => "chain_middle",
            ChainStatus::ChainEnd => "chain_end",
            ChainStatus::ChainStop => "chain_stop",
            ChainStatus::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Rejected chain transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainOrderViolation {
    pub from: ChainStatus,
    pub to: ChainStatus,
}

/// Validate a chain status transition.
///
/// Re-setting the current status is always accepted so a caller may retry.
pub fn validate_chain_transition(
    current: ChainStatus,
    next: ChainStatus,
) -> Result<(), ChainOrderViolation> {
    let violation = ChainOrderViolation {
        from: current,
        to: next,
    };
    if current == next {
        return Ok(());
    }
    if current.is_terminal_stop() || next < current {
        return Err(violation);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ChainStatus; 6] = [
        ChainStatus::NoChain,
        ChainStatus::ChainBegin,
        ChainStatus::ChainMiddle,
        ChainStatus::ChainEnd,
        ChainStatus::ChainStop,
        ChainStatus::Unknown,
    ];

    #[test]
    fn test_forward_transitions_accepted() {
        assert!(validate_chain_transition(ChainStatus::NoChain, ChainStatus::ChainBegin).is_ok());
        assert!(
            validate_chain_transition(ChainStatus::ChainBegin, ChainStatus::ChainMiddle).is_ok()
        );
        assert!(
            validate_chain_transition(ChainStatus::ChainMiddle, ChainStatus::ChainMiddle).is_ok()
        );
        assert!(validate_chain_transition(ChainStatus::ChainMiddle, ChainStatus::ChainEnd).is_ok());
        assert!(validate_chain_transition(ChainStatus::ChainEnd, ChainStatus::ChainStop).is_ok());
        // Skipping the middle is fine; only going back is not.
        assert!(validate_chain_transition(ChainStatus::ChainBegin, ChainStatus::ChainEnd).is_ok());
    }

    #[test]
    fn test_backward_transitions_rejected() {
        let err = validate_chain_transition(ChainStatus::ChainEnd, ChainStatus::ChainBegin)
            .unwrap_err();
        assert_eq!(err.from, ChainStatus::ChainEnd);
        assert_eq!(err.to, ChainStatus::ChainBegin);

        assert!(validate_chain_transition(ChainStatus::ChainMiddle, ChainStatus::NoChain).is_err());
    }

    #[test]
    fn test_stop_and_unknown_are_absorbing() {
        for next in ALL {
            let from_stop = validate_chain_transition(ChainStatus::ChainStop, next);
            assert_eq!(from_stop.is_ok(), next == ChainStatus::ChainStop, "{next}");

            let from_unknown = validate_chain_transition(ChainStatus::Unknown, next);
            assert_eq!(from_unknown.is_ok(), next == ChainStatus::Unknown, "{next}");
        }
    }

    #[test]
    fn test_every_accepted_transition_is_non_decreasing() {
        for from in ALL {
            for to in ALL {
                if validate_chain_transition(from, to).is_ok() {
                    assert!(to >= from, "{from} -> {to}");
                }
            }
        }
    }
}
