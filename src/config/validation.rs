//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacity > 0, factor >= 1, jitter in [0, 1))
//! - Check that limiter patterns compile and service names are unique
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GuardConfig;
use crate::throttle::limiter::compile_patterns;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("cache.capacity must be greater than zero")]
    ZeroCapacity,

    #[error("cache.ttl_secs must be greater than zero")]
    ZeroTtl,

    #[error("backoff.factor must be >= 1.0, got {0}")]
    InvalidFactor(f64),

    #[error("backoff.jitter must be in [0, 1), got {0}")]
    InvalidJitter(f64),

    #[error("backoff.steps must be greater than zero")]
    ZeroSteps,

    #[error("metrics.address is not a socket address: {0}")]
    InvalidMetricsAddress(String),

    #[error("service name {0:?} is declared more than once")]
    DuplicateService(String),

    #[error("service {service:?} rule {index}: {reason}")]
    InvalidRule {
        service: String,
        index: usize,
        reason: String,
    },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.cache.capacity == 0 {
        errors.push(ValidationError::ZeroCapacity);
    }
    if config.cache.ttl_secs == 0 {
        errors.push(ValidationError::ZeroTtl);
    }

    let backoff = &config.backoff;
    if backoff.factor.is_nan() || backoff.factor < 1.0 {
        errors.push(ValidationError::InvalidFactor(backoff.factor));
    }
    if !(0.0..1.0).contains(&backoff.jitter) {
        errors.push(ValidationError::InvalidJitter(backoff.jitter));
    }
    if backoff.steps == 0 {
        errors.push(ValidationError::ZeroSteps);
    }

    if config.metrics.enabled && config.metrics.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.metrics.address.clone(),
        ));
    }

    let mut seen = HashSet::new();
    for service in &config.services {
        if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }

        for (index, rule) in service.rules.iter().enumerate() {
            let invalid = |reason: String| ValidationError::InvalidRule {
                service: service.name.clone(),
                index,
                reason,
            };

            if rule.operations.is_empty() {
                errors.push(invalid("no operation patterns".to_string()));
            } else if let Err(e) = compile_patterns(&rule.operations) {
                errors.push(invalid(e.to_string()));
            }
            if !(rule.refill_rate.is_finite() && rule.refill_rate > 0.0) {
                errors.push(invalid(format!("refill_rate must be positive, got {}", rule.refill_rate)));
            }
            if rule.burst == 0 {
                errors.push(invalid("burst must be greater than zero".to_string()));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
