use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::{
    application::{
        lookup_cache::{CachedLookup, LookupCache, translation_key},
        upstream::TranslationSource,
    },
    cache::Coalescer,
    domain::{creatures::TranslationKind, error::LookupError},
};

/// Rewrites a creature description, as seen by [`CreatureService`].
///
/// [`CreatureService`]: crate::application::creatures::CreatureService
#[async_trait]
pub trait DescriptionTranslator: Send + Sync {
    async fn translate(
        &self,
        name: &str,
        text: &str,
        kind: TranslationKind,
        deadline: Option<Instant>,
    ) -> Result<String, LookupError>;
}

/// Cached, coalesced front for the translation upstream.
pub struct TranslationService {
    cache: LookupCache,
    upstream: Arc<dyn TranslationSource>,
    flights: Coalescer<String, LookupError>,
}

impl TranslationService {
    pub fn new(cache: LookupCache, upstream: Arc<dyn TranslationSource>) -> Self {
        Self {
            cache,
            upstream,
            flights: Coalescer::new(),
        }
    }
}

#[async_trait]
impl DescriptionTranslator for TranslationService {
    async fn translate(
        &self,
        name: &str,
        text: &str,
        kind: TranslationKind,
        deadline: Option<Instant>,
    ) -> Result<String, LookupError> {
        if text.is_empty() {
            debug!(
                target = "pokedex::translation",
                name, "translation requested for empty text"
            );
            return Ok(String::new());
        }

        let cache_key = translation_key(name);
        if let Some(CachedLookup::Translation(cached)) = self.cache.get(&cache_key) {
            return Ok(cached);
        }

        // The same text may need both treatments at once; keep them apart.
        let flight_key = format!("{text}-{kind}");
        let translated = self
            .flights
            .run_until(&flight_key, deadline, || self.upstream.translate(text, kind))
            .await?;

        self.cache
            .put(cache_key, CachedLookup::Translation(translated.clone()));
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use futures::future::join_all;

    use super::*;
    use crate::cache::BoundedCache;

    #[derive(Default)]
    struct FakeTranslator {
        calls: AtomicUsize,
        fail_with: Option<LookupError>,
    }

    #[async_trait]
    impl TranslationSource for FakeTranslator {
        async fn translate(
            &self,
            text: &str,
            kind: TranslationKind,
        ) -> Result<String, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(format!("{kind}: {text}")),
            }
        }
    }

    fn service(upstream: Arc<FakeTranslator>) -> (TranslationService, LookupCache) {
        let cache: LookupCache = Arc::new(BoundedCache::new(8).expect("positive capacity"));
        (TranslationService::new(cache.clone(), upstream), cache)
    }

    #[tokio::test]
    async fn empty_text_skips_upstream() {
        let upstream = Arc::new(FakeTranslator::default());
        let (service, cache) = service(upstream.clone());

        let out = service
            .translate("ditto", "", TranslationKind::Yoda, None)
            .await
            .expect("empty text translates");

        assert_eq!(out, "");
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
        assert!(cache.get(&translation_key("ditto")).is_none());
    }

    #[tokio::test]
    async fn result_is_cached_under_translation_namespace() {
        let upstream = Arc::new(FakeTranslator::default());
        let (service, cache) = service(upstream.clone());

        let first = service
            .translate("ditto", "It transforms.", TranslationKind::Shakespeare, None)
            .await
            .expect("translation");
        let second = service
            .translate("ditto", "It transforms.", TranslationKind::Shakespeare, None)
            .await
            .expect("cached translation");

        assert_eq!(first, "shakespeare: It transforms.");
        assert_eq!(first, second);
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.get("ditto_translation"),
            Some(CachedLookup::Translation(first))
        );
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_upstream_call() {
        let upstream = Arc::new(FakeTranslator::default());
        let (service, _cache) = service(upstream.clone());

        let results = join_all(
            (0..5).map(|_| service.translate("onix", "Rock snake.", TranslationKind::Yoda, None)),
        )
        .await;

        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.as_deref() == Ok("yoda: Rock snake.")));
    }

    #[tokio::test]
    async fn different_kinds_are_not_coalesced() {
        let upstream = Arc::new(FakeTranslator::default());
        let (service, _cache) = service(upstream.clone());

        let (yoda, bard) = tokio::join!(
            service.translate("a", "Same text.", TranslationKind::Yoda, None),
            service.translate("b", "Same text.", TranslationKind::Shakespeare, None),
        );

        assert_eq!(yoda.as_deref(), Ok("yoda: Same text."));
        assert_eq!(bard.as_deref(), Ok("shakespeare: Same text."));
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let upstream = Arc::new(FakeTranslator {
            fail_with: Some(LookupError::TooManyRequests),
            ..Default::default()
        });
        let (service, cache) = service(upstream.clone());

        let err = service
            .translate("ditto", "It transforms.", TranslationKind::Yoda, None)
            .await
            .expect_err("upstream failure propagates");

        assert_eq!(err, LookupError::TooManyRequests);
        assert!(cache.get(&translation_key("ditto")).is_none());
    }

    #[tokio::test]
    async fn expired_deadline_reports_timeout() {
        let upstream = Arc::new(FakeTranslator::default());
        let (service, _cache) = service(upstream);

        let err = service
            .translate(
                "ditto",
                "It transforms.",
                TranslationKind::Yoda,
                Some(Instant::now() + Duration::from_millis(5)),
            )
            .await
            .expect_err("deadline should expire before the fake upstream answers");

        assert_eq!(err, LookupError::Timeout);
    }
}
