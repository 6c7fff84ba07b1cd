//! # Shared Bus - Replication Event Bus
//!
//! Carries the coordination traffic between a primary, its replicas and the
//! leader-election service.
//!
//! ## Message Flow
//!
//! ```text
//! ┌──────────────┐  RequestBroadcast / Decision   ┌──────────────┐
//! │   Primary    │ ─────────────────────────────→ │   Replica    │
//! │              │ ←───────────────────────────── │              │
//! └──────────────┘              Ack               └──────────────┘
//!         ↑                                              ↑
//!         └────────────── ElectingFinished ──────────────┘
//!                        (election service)
//! ```
//!
//! Every event except `ElectingFinished` names its recipients, so a node
//! subscribes with [`EventFilter::addressed_to`] and only sees its own traffic.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventTopic, ReplicationEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{Subscription, SubscriptionError};

/// Undelivered events a subscription holds before new ones are dropped.
pub const INBOX_CAPACITY: usize = 1000;
