//! # Integration Tests
//!
//! Multi-node scenarios over the replication bus.
//!
//! ## Test Categories
//!
//! - `flows`: nominal commit, local failure, replica failure, chained writes
//! - `election`: leader change while a request is in flight
//! - `durability`: file-backed request logs across restarts

pub mod durability;
pub mod election;
pub mod flows;
