use std::sync::Arc;

use crate::{
    cache::{CoalesceError, KeyValueCache},
    domain::{creatures::Creature, error::LookupError},
};

const TRANSLATION_SUFFIX: &str = "_translation";

/// Values stored in the process-wide lookup cache.
///
/// Both lookups share one cache instance, so a key written by one namespace
/// never parses as the other's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedLookup {
    Creature(Creature),
    Translation(String),
}

pub type LookupCache = Arc<dyn KeyValueCache<CachedLookup>>;

pub fn creature_key(name: &str) -> String {
    name.to_string()
}

pub fn translation_key(name: &str) -> String {
    format!("{name}{TRANSLATION_SUFFIX}")
}

/// Names that would land in the translation namespace cannot be creatures.
pub fn is_reserved_name(name: &str) -> bool {
    name.ends_with(TRANSLATION_SUFFIX)
}

impl From<CoalesceError<LookupError>> for LookupError {
    fn from(err: CoalesceError<LookupError>) -> Self {
        match err {
            CoalesceError::Producer(inner) => inner,
            CoalesceError::DeadlineExceeded => LookupError::Timeout,
            CoalesceError::Abandoned => LookupError::Abandoned,
        }
    }
}
