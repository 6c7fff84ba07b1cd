//! Ports layer - hexagonal architecture interfaces

pub mod inbound;
pub mod outbound;

pub use inbound::{LocalOutcome, TransportEvent, WriteCoordinationApi};
pub use outbound::{
    BroadcastHandle, LocalRollback, ReplicaRequestHandler, ReplicationTransport, RequestLog,
};
