//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! cache / wait / throttle produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and gauges via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Library code only emits events; the binary installs subscribers/recorders
//! - Without an installed recorder every metric call is a no-op

pub mod logging;
pub mod metrics;
