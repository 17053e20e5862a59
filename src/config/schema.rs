//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard
//! utilities. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Logging settings.
    pub logging: LoggingConfig,

    /// Metrics exporter settings.
    pub metrics: MetricsConfig,

    /// TTL-LRU cache settings.
    pub cache: CacheConfig,

    /// Backoff schedule used when polling external resources.
    pub backoff: BackoffConfig,

    /// Per-service operation limiters, keyed by service name.
    pub services: Vec<ServiceConfig>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    pub enabled: bool,

    /// Exporter bind address.
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// TTL-LRU cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache name, used as a metrics label.
    pub name: String,

    /// Maximum number of entries.
    pub capacity: usize,

    /// Entry time-to-live in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            capacity: 128,
            ttl_secs: 300,
        }
    }
}

/// Exponential backoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// First delay in milliseconds.
    pub initial_ms: u64,

    /// Multiplier applied after every step (must be >= 1.0).
    pub factor: f64,

    /// Maximum number of condition invocations.
    pub steps: u32,

    /// Jitter fraction in [0, 1).
    pub jitter: f64,

    /// Upper bound for a single delay in milliseconds.
    pub max_delay_ms: Option<u64>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: 1000,
            factor: 1.5,
            steps: 10,
            jitter: 0.1,
            max_delay_ms: None,
        }
    }
}

/// Limiter set for one remote service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Service identifier (e.g. "ec2").
    pub name: String,

    /// Provider error codes that indicate server-side throttling.
    #[serde(default = "default_throttle_codes")]
    pub throttle_codes: Vec<String>,

    /// Ordered rules; the first matching rule wins.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// A single operation limiter rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    /// Patterns anchored at the start of the operation name.
    pub operations: Vec<String>,

    /// Tokens added per second.
    pub refill_rate: f64,

    /// Bucket capacity.
    pub burst: u32,
}

pub fn default_throttle_codes() -> Vec<String> {
    vec![
        "Throttling".to_string(),
        "ThrottlingException".to_string(),
        "RequestLimitExceeded".to_string(),
    ]
}
