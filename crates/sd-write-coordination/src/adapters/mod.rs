//! Adapters layer - concrete implementations of the outbound ports

pub mod bus_listener;
pub mod bus_transport;
pub mod file_log;
pub mod memory_log;
pub mod mock;

pub use bus_listener::BusEventListener;
pub use bus_transport::BusReplicationTransport;
pub use file_log::FileRequestLog;
pub use memory_log::InMemoryRequestLog;
pub use mock::{AckPolicy, MockReplicationTransport, RecordingRollback, ReplicaReply};
