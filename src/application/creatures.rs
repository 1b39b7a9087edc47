use std::sync::Arc;

use tokio::time::Instant;
use tracing::error;

use crate::{
    application::{
        lookup_cache::{CachedLookup, LookupCache, creature_key, is_reserved_name},
        translation::DescriptionTranslator,
        upstream::CatalogSource,
    },
    cache::Coalescer,
    domain::{
        creatures::{Creature, LookupResult, TranslationKind, normalize_name},
        error::LookupError,
    },
};

pub const TRANSLATION_FAILED_WARNING: &str = "translation failed";

/// Resolves creature records through the shared cache, optionally rewriting the
/// description.
pub struct CreatureService {
    cache: LookupCache,
    catalog: Arc<dyn CatalogSource>,
    translator: Arc<dyn DescriptionTranslator>,
    flights: Coalescer<Creature, LookupError>,
}

impl CreatureService {
    pub fn new(
        cache: LookupCache,
        catalog: Arc<dyn CatalogSource>,
        translator: Arc<dyn DescriptionTranslator>,
    ) -> Self {
        Self {
            cache,
            catalog,
            translator,
            flights: Coalescer::new(),
        }
    }

    /// Look up `raw_name`, translating its description when `translate` is set.
    ///
    /// A failed translation is not an error: the untranslated record comes
    /// back with a warning attached.
    pub async fn lookup(
        &self,
        raw_name: &str,
        translate: bool,
        deadline: Option<Instant>,
    ) -> Result<LookupResult, LookupError> {
        let name = normalize_name(raw_name);
        let creature = self.creature(&name, deadline).await?;

        if !translate || creature.desc.is_empty() {
            return Ok(LookupResult::plain(creature));
        }

        let kind = TranslationKind::for_creature(&creature);
        match self
            .translator
            .translate(&name, &creature.desc, kind, deadline)
            .await
        {
            Ok(desc) => Ok(LookupResult::plain(Creature { desc, ..creature })),
            Err(err) => {
                if err != LookupError::TooManyRequests {
                    error!(
                        target = "pokedex::creatures",
                        pokemon = %name,
                        translation = %kind,
                        error = %err,
                        "failed to translate description"
                    );
                }
                Ok(LookupResult {
                    pokemon: creature,
                    warnings: vec![TRANSLATION_FAILED_WARNING.to_string()],
                })
            }
        }
    }

    async fn creature(
        &self,
        name: &str,
        deadline: Option<Instant>,
    ) -> Result<Creature, LookupError> {
        if is_reserved_name(name) {
            return Err(LookupError::not_found(name));
        }

        let key = creature_key(name);
        if let Some(CachedLookup::Creature(cached)) = self.cache.get(&key) {
            return Ok(cached);
        }

        let flight_key = format!("catalog:{name}");
        let creature = self
            .flights
            .run_until(&flight_key, deadline, || self.catalog.fetch_creature(name))
            .await?;

        self.cache.put(key, CachedLookup::Creature(creature.clone()));
        Ok(creature)
    }
}
