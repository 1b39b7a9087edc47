//! Pokedex cache layer
//!
//! Two independent pieces sit under every upstream lookup:
//!
//! - **Bounded cache**: one process-wide LRU store, shared by reference and
//!   partitioned by key prefix between catalog records and translations.
//! - **Coalescer**: collapses concurrent cache-miss fills for the same key into
//!   a single upstream call.
//!
//! A lookup checks the cache, falls back to the coalescer on miss, and writes
//! the produced value back to the cache on success.

mod coalesce;
mod lock;
mod lru;

pub use coalesce::{CoalesceError, Coalescer};
pub use lru::{BoundedCache, InvalidCapacity, KeyValueCache};
