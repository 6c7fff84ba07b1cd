//! Domain layer: chain ordering, hook roles, protocol phases and the backup
//! table.

pub mod chain;
pub(crate) mod backup;
pub mod phase;
pub mod role;

pub use chain::{validate_chain_transition, ChainOrderViolation, ChainStatus};
pub use phase::{ProtocolPhase, WaitKind};
pub use role::HookRole;
