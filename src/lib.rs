//! Cloud API guard utilities.
//!
//! In-process control-flow helpers for clients of throttled, eventually
//! consistent cloud APIs:
//!
//! - [`cache::TtlLruCache`]: bounded LRU cache with sliding per-entry TTL
//! - [`wait`]: jittered exponential backoff polling with retryable error codes
//! - [`throttle`]: per-operation token buckets matched against API call names

pub mod cache;
pub mod config;
pub mod observability;
pub mod provider;
pub mod throttle;
pub mod wait;

pub use cache::TtlLruCache;
pub use config::GuardConfig;
pub use provider::{ApiError, ErrorCode};
pub use throttle::{ServiceLimiter, ServiceLimiters, ThrottleLayer};
pub use wait::{wait_for, wait_for_with_retryable, Backoff, WaitError};
