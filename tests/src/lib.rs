//! # Search Cluster Test Suite
//!
//! Unified test crate for write coordination.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── cluster.rs        # In-process nodes wired over the replication bus
//! └── integration/      # Multi-node protocol scenarios
//!     ├── flows.rs      # Commit, local failure, replica abort, chains
//!     ├── election.rs   # Leader change mid-request, stale callbacks
//!     └── durability.rs # File-backed request log across restarts
//!
//! tests/benches/
//! └── coordination_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p sd-tests
//!
//! # By category
//! cargo test -p sd-tests integration::flows
//! cargo test -p sd-tests integration::election
//!
//! # Benchmarks
//! cargo bench -p sd-tests
//! ```

#![allow(dead_code)]

pub mod cluster;
pub mod integration;
