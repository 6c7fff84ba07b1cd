//! # sd-write-coordination
//!
//! Write coordination for a replicated search cluster: every mutating
//! request is hooked on the node that received it, executed locally, then
//! replicated to every replica before it is considered committed.
//!
//! ## Overview
//!
//! This crate provides:
//! - **Single hook slot**: one mutating request in flight per node
//! - **Primary/replica protocol**: broadcast, execution acks, commit or abort
//! - **Request log**: write-ahead log of committed mutations, assigned
//!   sequence numbers chosen by the primary
//! - **Chains**: multi-step operations that replicate once, at the end
//! - **Stale callback protection**: callbacks are matched by request id
//!
//! ## Architecture
//!
//! ```text
//!  request handler ──WriteScope──→ RequestCoordinator ──RequestLog──→ reqlog.dat
//!                                       │      ↑
//!                        ReplicationTransport  TransportEvent
//!                                       ↓      │
//!                                  shared-bus (RequestBroadcast / Decision / Ack)
//!                                       │
//!                         BusEventListener on every replica
//! ```
//!
//! ## Election
//!
//! A finished leader election force-exits whatever is hooked. Waits in
//! progress end with `StaleHook`, and callbacks for the old request are
//! ignored afterward.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sd_write_coordination::{
//!     CoordinatorConfig, FileRequestLog, RequestCoordinator, WriteScope,
//! };
//!
//! let coordinator = Arc::new(RequestCoordinator::new(
//!     CoordinatorConfig::from_env(),
//!     Arc::new(FileRequestLog::new("./data/reqlog")),
//!     transport,
//! ));
//! coordinator.init()?;
//!
//! let mut scope = WriteScope::begin(&coordinator)?;
//! let envelope = scope.prepare(RequestType::DocumentInsert, body).await?;
//! if index.apply(&envelope) {
//!     scope.set_success();
//! }
//! scope.finish().await?;
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod guard;
pub mod metrics;
pub mod ports;
pub mod service;
mod state;

pub use adapters::{
    AckPolicy, BusEventListener, BusReplicationTransport, FileRequestLog, InMemoryRequestLog,
    MockReplicationTransport, RecordingRollback, ReplicaReply,
};
pub use config::{ConfigError, CoordinatorConfig};
pub use domain::{validate_chain_transition, ChainStatus, HookRole, ProtocolPhase, WaitKind};
pub use error::{CoordinatorError, CoordinatorResult, LogError, LogResult, TransportError};
pub use guard::WriteScope;
pub use ports::inbound::{LocalOutcome, TransportEvent, WriteCoordinationApi};
pub use ports::outbound::{
    BroadcastHandle, LocalRollback, ReplicaRequestHandler, ReplicationTransport, RequestLog,
};
pub use service::RequestCoordinator;
pub use state::CoordinatorStats;
