//! Polling subsystem.
//!
//! # Data Flow
//! ```text
//! caller (e.g. "wait until deleted")
//!     → poll.rs (invoke condition, classify errors)
//!     → backoff.rs (next jittered delay)
//!     → sleep, raced against the caller's cancellation token
//! ```
//!
//! # Design Decisions
//! - Retryable provider errors are retried silently; anything else aborts at once
//! - On exhaustion the last retryable error is surfaced instead of a bare timeout
//! - Jittered delays keep many concurrent pollers from retrying in lockstep

pub mod backoff;
pub mod poll;

pub use backoff::Backoff;
pub use poll::{wait_for, wait_for_with_retryable, WaitError};
