//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for node logging.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Node identifier within the cluster
    pub node_id: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive such as `sd_write_coordination=debug,info`
    pub log_level: String,

    /// Whether to enable console output (for development)
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "search-cluster".to_string(),
            node_id: "0".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SD_SERVICE_NAME`: Service name (default: search-cluster)
    /// - `SD_NODE_ID`: Node ID (default: 0)
    /// - `SD_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `SD_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `SD_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("SD_SERVICE_NAME")
                .unwrap_or_else(|_| "search-cluster".to_string()),

            node_id: env::var("SD_NODE_ID").unwrap_or_else(|_| "0".to_string()),

            log_level: env::var("SD_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("SD_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: env::var("SD_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),
        }
    }

    /// Create configuration for a specific node.
    pub fn for_node(node_id: u32) -> Self {
        let mut config = Self::from_env();
        config.node_id = node_id.to_string();
        config
    }

    /// Get the full service name including the node.
    pub fn full_service_name(&self) -> String {
        if self.node_id == "0" {
            self.service_name.clone()
        } else {
            format!("{}-node-{}", self.service_name, self.node_id)
        }
    }
}
