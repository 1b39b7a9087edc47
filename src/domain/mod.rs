//! Domain layer types and invariants.

pub mod creatures;
pub mod error;
