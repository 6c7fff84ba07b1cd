//! # Search Cluster Telemetry
//!
//! Logging bootstrap shared by every node binary and by integration tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sd_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     init_telemetry(&TelemetryConfig::from_env()).expect("Failed to init telemetry");
//!     // Application code; `tracing` macros now reach the console.
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SD_SERVICE_NAME` | `search-cluster` | Service name in logs |
//! | `SD_NODE_ID` | `0` | Node identifier |
//! | `SD_LOG_LEVEL` | `info` | Log level filter |
//! | `SD_JSON_LOGS` | `false` (`true` in containers) | JSON output |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging for a node.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    init_logging(config)
}

/// Initialize logging for tests, ignoring a subscriber that is already set.
pub fn init_test_logging() {
    let config = TelemetryConfig {
        log_level: "debug".to_string(),
        ..TelemetryConfig::default()
    };
    let _ = init_logging(&config);
}

/// Convenience macro for creating a span around one coordinated request.
///
/// # Example
///
/// ```rust,ignore
/// let _span = request_span!("process_local_finished", request_id = %id, role = "primary");
/// ```
#[macro_export]
macro_rules! request_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}
