//! Caching subsystem.
//!
//! # Responsibilities
//! - Memoize slowly-changing externally-fetched data (identity, token lookups)
//! - Bound memory with LRU eviction
//! - Expire entries that have not been read within a fixed TTL
//!
//! # Design Decisions
//! - One mutex per cache; every operation is O(1) and never awaits under the lock
//! - Expiry is sliding: every successful `get` extends an entry's life
//! - Stale entries are dropped lazily on access, not by a background sweeper

pub mod ttl_lru;

pub use ttl_lru::{CacheError, TtlLruCache};
