//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from a TOML file.
//! Every field has a default so a config file may set only what it needs.

use serde::{Deserialize, Serialize};

use crate::buffer::pool::{DEFAULT_BUFFER_SIZE, DEFAULT_MAX_IDLE};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// The two upstream targets.
    pub targets: TargetsConfig,

    /// Read-ahead buffer settings.
    pub buffers: BufferConfig,

    /// Transport timeouts.
    pub timeouts: TimeoutConfig,

    /// Inbound request body fan-out.
    pub request_body: RequestBodyConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080" or ":8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream targets every request is raced against.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TargetsConfig {
    /// Target A, an absolute http(s) URL.
    pub a: String,

    /// Target B, an absolute http(s) URL.
    pub b: String,
}

/// Read-ahead buffer pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Capacity of one read-ahead buffer in bytes.
    pub size: usize,

    /// Idle buffers kept for reuse.
    pub max_idle: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_BUFFER_SIZE,
            max_idle: DEFAULT_MAX_IDLE,
        }
    }
}

/// Timeouts enforced by the outbound transport.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds. Unset means none.
    pub connect_secs: Option<u64>,
}

/// Request body fan-out configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestBodyConfig {
    /// Chunks queued per target before the inbound read waits.
    pub channel_capacity: usize,
}

impl Default for RequestBodyConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 16,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
