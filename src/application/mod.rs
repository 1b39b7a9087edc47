//! Lookup services sitting between the HTTP surface and the upstream adapters.

pub mod creatures;
pub mod error;
pub mod lookup_cache;
pub mod translation;
pub mod upstream;
