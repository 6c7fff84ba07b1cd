//! Coordinator configuration.

use shared_types::NodeId;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Invalid coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("callback_timeout must be greater than zero")]
    ZeroCallbackTimeout,

    #[error("log_write_attempts must be at least 1")]
    NoLogWriteAttempts,
}

/// Write coordination configuration
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// This node's id
    pub node_id: NodeId,
    /// Upper bound on every callback wait
    pub callback_timeout: Duration,
    /// Local log append attempts before the request is aborted
    pub log_write_attempts: u32,
    /// Pause between log append attempts
    pub log_retry_backoff: Duration,
    /// Directory of the file-backed request log
    pub log_dir: PathBuf,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            node_id: NodeId(1),
            callback_timeout: Duration::from_secs(30),
            log_write_attempts: 3,
            log_retry_backoff: Duration::from_millis(50),
            log_dir: PathBuf::from("./data/reqlog"),
        }
    }
}

impl CoordinatorConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SD_NODE_ID`: Node id (default: 1)
    /// - `SD_CALLBACK_TIMEOUT_MS`: Callback wait bound (default: 30000)
    /// - `SD_LOG_WRITE_ATTEMPTS`: Log append attempts (default: 3)
    /// - `SD_LOG_RETRY_BACKOFF_MS`: Pause between attempts (default: 50)
    /// - `SD_LOG_DIR`: Request log directory (default: ./data/reqlog)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            node_id: env::var("SD_NODE_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(NodeId)
                .unwrap_or(defaults.node_id),

            callback_timeout: env::var("SD_CALLBACK_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.callback_timeout),

            log_write_attempts: env::var("SD_LOG_WRITE_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.log_write_attempts),

            log_retry_backoff: env::var("SD_LOG_RETRY_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.log_retry_backoff),

            log_dir: env::var("SD_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
        }
    }

    /// Configuration for a given node with default timings.
    pub fn for_node(node_id: NodeId) -> Self {
        Self {
            node_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_log_retries(mut self, attempts: u32, backoff: Duration) -> Self {
        self.log_write_attempts = attempts;
        self.log_retry_backoff = backoff;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.callback_timeout.is_zero() {
            return Err(ConfigError::ZeroCallbackTimeout);
        }
        if self.log_write_attempts == 0 {
            return Err(ConfigError::NoLogWriteAttempts);
        }
        Ok(())
    }

    pub(crate) fn callback_timeout_ms(&self) -> u64 {
        u64::try_from(self.callback_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}
