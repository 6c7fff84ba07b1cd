//! # Shared Types Crate
//!
//! Types shared by every node taking part in write coordination: request and
//! log identifiers, the closed set of request types, and the
//! [`RequestEnvelope`] that is replicated from the primary to its replicas.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the envelope layout is defined once here and
//!   used by the coordinator, the replication bus and the request log.
//! - **Primary Authority**: fields computed by the primary travel inside the
//!   packed envelope; replicas never recompute them.

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod protocol;

pub use entities::*;
pub use envelope::{RequestEnvelope, RequestType};
pub use errors::*;
pub use protocol::{AckPhase, PrimaryDecision};
