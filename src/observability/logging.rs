//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for binaries
//! - Resolve the filter from `RUST_LOG`, falling back to configuration
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured level so operators can override it

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::LoggingConfig;

/// Build the filter directive for a configured level.
pub fn default_directive(config: &LoggingConfig) -> String {
    if config.level.contains('=') {
        config.level.clone()
    } else {
        format!("cloud_api_guard={level},api_guard={level}", level = config.level)
    }
}

/// Install the global subscriber. Safe to call more than once.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_expands_to_crate_targets() {
        let config = LoggingConfig {
            level: "debug".to_string(),
        };
        assert_eq!(
            default_directive(&config),
            "cloud_api_guard=debug,api_guard=debug"
        );
    }

    #[test]
    fn test_full_directive_passes_through() {
        let config = LoggingConfig {
            level: "cloud_api_guard::throttle=trace".to_string(),
        };
        assert_eq!(default_directive(&config), config.level);
    }
}
