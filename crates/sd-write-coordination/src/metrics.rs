//! # Write Coordination Metrics
//!
//! Prometheus metrics for the replication protocol.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! sd-write-coordination = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `write_coordination_requests_prepared_total` - Requests hooked as primary (by type)
//! - `write_coordination_requests_committed_total` - Requests committed (by role)
//! - `write_coordination_requests_aborted_total` - Requests aborted (by reason)
//! - `write_coordination_log_appends_total` - Log append attempts (by result)
//! - `write_coordination_stale_callbacks_total` - Callbacks for a request no longer hooked
//! - `write_coordination_election_resets_total` - Hooks force-exited by leader election
//! - `write_coordination_callback_wait_seconds` - Time spent in callback waits (by phase)

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Requests hooked as primary, labeled by request type
    pub static ref REQUESTS_PREPARED: IntCounterVec = register_int_counter_vec!(
        "write_coordination_requests_prepared_total",
        "Total number of requests prepared as primary",
        &["request_type"]
    )
    .expect("Failed to create REQUESTS_PREPARED metric");

    /// Requests committed, labeled by role
    pub static ref REQUESTS_COMMITTED: IntCounterVec = register_int_counter_vec!(
        "write_coordination_requests_committed_total",
        "Total number of requests committed",
        &["role"]
    )
    .expect("Failed to create REQUESTS_COMMITTED metric");

    /// Requests aborted, labeled by reason
    pub static ref REQUESTS_ABORTED: IntCounterVec = register_int_counter_vec!(
        "write_coordination_requests_aborted_total",
        "Total number of requests aborted",
        &["reason"]
    )
    .expect("Failed to create REQUESTS_ABORTED metric");

    /// Log append attempts, labeled by result
    pub static ref LOG_APPENDS: IntCounterVec = register_int_counter_vec!(
        "write_coordination_log_appends_total",
        "Total number of request log append attempts",
        &["result"]
    )
    .expect("Failed to create LOG_APPENDS metric");

    /// Callbacks ignored because their request is no longer hooked
    pub static ref STALE_CALLBACKS: IntCounter = register_int_counter!(
        "write_coordination_stale_callbacks_total",
        "Total number of stale callbacks ignored"
    )
    .expect("Failed to create STALE_CALLBACKS metric");

    /// Hooks force-exited by a finished leader election
    pub static ref ELECTION_RESETS: IntCounter = register_int_counter!(
        "write_coordination_election_resets_total",
        "Total number of hooks reset by leader election"
    )
    .expect("Failed to create ELECTION_RESETS metric");

    /// Callback wait duration, labeled by phase
    pub static ref CALLBACK_WAIT_SECONDS: HistogramVec = register_histogram_vec!(
        "write_coordination_callback_wait_seconds",
        "Time spent waiting for replication callbacks",
        &["phase"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]
    )
    .expect("Failed to create CALLBACK_WAIT_SECONDS metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record a request hooked as primary
#[cfg(feature = "metrics")]
pub fn record_request_prepared(request_type: &str) {
    REQUESTS_PREPARED.with_label_values(&[request_type]).inc();
}

/// Record a committed request
#[cfg(feature = "metrics")]
pub fn record_request_committed(role: &str) {
    REQUESTS_COMMITTED.with_label_values(&[role]).inc();
}

/// Record an aborted request
#[cfg(feature = "metrics")]
pub fn record_request_aborted(reason: &str) {
    REQUESTS_ABORTED.with_label_values(&[reason]).inc();
}

/// Record one log append attempt
#[cfg(feature = "metrics")]
pub fn record_log_append(success: bool) {
    let result = if success { "ok" } else { "error" };
    LOG_APPENDS.with_label_values(&[result]).inc();
}

/// Record a stale callback
#[cfg(feature = "metrics")]
pub fn record_stale_callback() {
    STALE_CALLBACKS.inc();
}

/// Record an election reset
#[cfg(feature = "metrics")]
pub fn record_election_reset() {
    ELECTION_RESETS.inc();
}

/// Record how long a callback wait took
#[cfg(feature = "metrics")]
pub fn observe_callback_wait(phase: &str, seconds: f64) {
    CALLBACK_WAIT_SECONDS
        .with_label_values(&[phase])
        .observe(seconds);
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_request_prepared(_request_type: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_request_committed(_role: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_request_aborted(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_log_append(_success: bool) {}

#[cfg(not(feature = "metrics"))]
pub fn record_stale_callback() {}

#[cfg(not(feature = "metrics"))]
pub fn record_election_reset() {}

#[cfg(not(feature = "metrics"))]
pub fn observe_callback_wait(_phase: &str, _seconds: f64) {}
