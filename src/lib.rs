//! Creature lookup service backed by a bounded LRU cache and per-key request
//! coalescing in front of the species catalog and translation upstreams.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
