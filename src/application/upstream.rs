//! Upstream source traits implemented by the HTTP clients in `infra::upstream`.

use async_trait::async_trait;

use crate::domain::{
    creatures::{Creature, TranslationKind},
    error::LookupError,
};

/// Source of creature records (the species catalog).
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch `name`, which is already normalized.
    async fn fetch_creature(&self, name: &str) -> Result<Creature, LookupError>;
}

/// Source of description rewrites.
#[async_trait]
pub trait TranslationSource: Send + Sync {
    async fn translate(&self, text: &str, kind: TranslationKind) -> Result<String, LookupError>;
}
