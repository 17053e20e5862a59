//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → handed to cache / wait / throttle constructors
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; limiter sets are built from it once
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::BackoffConfig;
pub use schema::CacheConfig;
pub use schema::GuardConfig;
pub use schema::RuleConfig;
pub use schema::ServiceConfig;
