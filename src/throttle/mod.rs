//! Outbound API throttling.
//!
//! # Data Flow
//! ```text
//! Outgoing call (operation name, e.g. "DescribeInstances"):
//!     → limiter.rs (first rule whose pattern matches the name)
//!     → bucket.rs (wait for a token, raced against cancellation)
//!     → call the provider
//!     → limiter.rs review_response (provider said "throttled"? refill bucket)
//!
//! layer.rs wraps the same flow around any tower Service.
//! ```
//!
//! # Design Decisions
//! - Rules are ordered; the first match wins, so specific patterns go first
//! - Patterns are anchored at the start of the operation name
//! - Buckets are created on first use through `OnceLock`, never twice
//! - A provider throttle signal refills the bucket instead of compounding waits

pub mod bucket;
pub mod layer;
pub mod limiter;

use thiserror::Error;

pub use bucket::TokenBucket;
pub use layer::{classify_error, Operation, ThrottleLayer, ThrottleService};
pub use limiter::{OperationLimiter, ServiceLimiter, ServiceLimiters};

/// Errors produced by the throttling subsystem.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThrottleError {
    /// The caller gave up while waiting for a token.
    #[error("request for {operation} cancelled while waiting for rate limiter")]
    Cancelled { operation: String },

    #[error("invalid operation pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("limiter rule has no operation patterns")]
    EmptyRule,

    #[error("invalid limiter rate: refill_rate={refill_rate}, burst={burst}")]
    InvalidRate { refill_rate: f64, burst: u32 },
}
