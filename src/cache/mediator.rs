//! Read-through and write-through mediation between queries and stores.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use serde::{de::DeserializeOwned, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::backend::{CacheStore, MemoryStore};
use super::cooldown::{CooldownDecision, CooldownTracker};
use super::key::{entity_path, CacheKey, KeyDeriver, TagSet};
use super::lock::mutex_lock;
use super::registry::StoreRegistry;
use super::switch::DisableSwitch;
use crate::config::CachingConfig;
use crate::query::QueryDescription;
use crate::{Error, ErrorContext, Result};

const SOURCE: &str = "cache::mediator";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub invalidations: u64,
    pub suppressed: u64,
    pub bypassed: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    invalidations: AtomicU64,
    suppressed: AtomicU64,
    bypassed: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Builder for [`CacheMediator`].
#[derive(Default)]
pub struct CacheMediatorBuilder {
    config: CachingConfig,
    stores: StoreRegistry,
}

impl CacheMediatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: CachingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_store(mut self, name: impl Into<String>, store: Arc<dyn CacheStore>) -> Self {
        self.stores.register(name, store);
        self
    }

    pub fn with_registry(mut self, stores: StoreRegistry) -> Self {
        self.stores = stores;
        self
    }

    /// Build the mediator. With no stores registered, an in-memory store is
    /// registered under the configured default name.
    pub fn build(self) -> Result<CacheMediator> {
        let mut stores = self.stores;
        if stores.is_empty() {
            stores.register(
                self.config.store.clone(),
                Arc::new(MemoryStore::named(
                    self.config.store.clone(),
                    MemoryStore::DEFAULT_CAPACITY,
                )),
            );
        }
        check_default_store(&stores, &self.config)?;
        Ok(CacheMediator {
            config: ArcSwap::from_pointee(self.config),
            stores,
            cooldown: CooldownTracker::new(),
            entity_slugs: Mutex::new(HashMap::new()),
            stats: AtomicStats::default(),
        })
    }
}

fn check_default_store(stores: &StoreRegistry, config: &CachingConfig) -> Result<()> {
    if stores.contains(&config.store) {
        return Ok(());
    }
    Err(Error::configuration_with_context(
        "default cache store is not registered",
        ErrorContext::new()
            .with_field_path("store")
            .with_details(config.store.clone())
            .with_source("cache_mediator"),
    ))
}

/// Sits between query execution and the cache stores.
///
/// Reads are served from the store when possible and populated on a miss.
/// Writes evict every entry tagged with an affected entity, subject to the
/// per-tag cooldown. Store failures never fail the caller.
pub struct CacheMediator {
    config: ArcSwap<CachingConfig>,
    stores: StoreRegistry,
    cooldown: CooldownTracker,
    /// Entity path -> the entity name first seen with it.
    entity_slugs: Mutex<HashMap<String, String>>,
    stats: AtomicStats,
}

impl CacheMediator {
    pub fn builder() -> CacheMediatorBuilder {
        CacheMediatorBuilder::new()
    }

    /// Mediator over a single in-memory store.
    pub fn in_memory(config: CachingConfig) -> Result<Self> {
        Self::builder().with_config(config).build()
    }

    /// Serve `query` from the cache, or run `executor` and cache its result.
    ///
    /// Executor failures are returned unchanged and nothing is stored.
    pub async fn read_through<T, E, F, Fut>(
        &self,
        query: &QueryDescription,
        executor: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<Error>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let config = self.config.load_full();
        if DisableSwitch::new(&config).is_disabled(query) {
            AtomicStats::bump(&self.stats.bypassed);
            debug!(entity = %query.entity, "cache bypassed");
            return executor().await;
        }

        let deriver = KeyDeriver::new(&config);
        let (key, tags, entities) = deriver.derive_with_entities(query)?;
        self.claim_entities(entities.iter().map(String::as_str))?;
        let store = self.stores.resolve(query.store.as_deref(), &config.store)?;

        let now = Instant::now();
        if let Some(cooldown) = query.cooldown {
            self.cooldown
                .configure(&deriver.entity_tag(&query.entity), cooldown, now);
        }
        for tag in tags.iter() {
            if self.cooldown.take_expired_pending(tag, now) {
                debug!(tag, "applying deferred invalidation");
                AtomicStats::bump(&self.stats.invalidations);
                self.forget_or_retry(tag, now).await;
            }
        }

        if let Some(value) = self.lookup::<T>(store.as_ref(), &key).await {
            AtomicStats::bump(&self.stats.hits);
            debug!(key = %key, store = store.name(), entity = %query.entity, "cache hit");
            return Ok(value);
        }
        AtomicStats::bump(&self.stats.misses);
        debug!(key = %key, store = store.name(), entity = %query.entity, "cache miss");

        let value = executor().await?;
        self.populate(store.as_ref(), &key, &value, &tags, &config)
            .await;
        Ok(value)
    }

    /// Run `executor` and, once it succeeds, invalidate `tags`.
    ///
    /// A failed write invalidates nothing.
    pub async fn write_through<W, E, F, Fut>(
        &self,
        tags: &TagSet,
        executor: F,
    ) -> std::result::Result<W, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<W, E>>,
    {
        let result = executor().await?;
        self.invalidate(tags).await;
        Ok(result)
    }

    /// Invalidate `tags` as a write would, honouring cooldown windows.
    /// Returns the number of entries forgotten.
    pub async fn invalidate(&self, tags: &TagSet) -> u64 {
        let now = Instant::now();
        let mut forgotten = 0;
        for tag in tags.iter() {
            match self.cooldown.begin_invalidation(tag, now) {
                CooldownDecision::Proceed => {
                    AtomicStats::bump(&self.stats.invalidations);
                    forgotten += self.forget_or_retry(tag, now).await;
                }
                CooldownDecision::Suppressed { remaining } => {
                    AtomicStats::bump(&self.stats.suppressed);
                    debug!(
                        tag,
                        remaining_ms = remaining.as_millis() as u64,
                        "invalidation suppressed by cooldown"
                    );
                }
            }
        }
        forgotten
    }

    /// Forget everything under `tags` immediately, ignoring cooldowns.
    pub async fn flush(&self, tags: &TagSet) -> u64 {
        let now = Instant::now();
        let mut forgotten = 0;
        for tag in tags.iter() {
            AtomicStats::bump(&self.stats.invalidations);
            forgotten += self.forget_or_retry(tag, now).await;
        }
        forgotten
    }

    /// Tags for the entities affected by a write, namespaced like read-side tags.
    pub fn entity_tags<I, S>(&self, entities: I) -> Result<TagSet>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entities: Vec<S> = entities.into_iter().collect();
        let tags = KeyDeriver::new(&self.config.load()).entity_tags(entities.iter())?;
        self.claim_entities(entities.iter().map(|e| e.as_ref()))?;
        Ok(tags)
    }

    /// Key and tags `query` would be cached under with the current configuration.
    pub fn derive(&self, query: &QueryDescription) -> Result<(CacheKey, TagSet)> {
        KeyDeriver::new(&self.config.load()).derive(query)
    }

    pub fn is_disabled(&self, query: &QueryDescription) -> bool {
        DisableSwitch::new(&self.config.load()).is_disabled(query)
    }

    pub fn config(&self) -> Arc<CachingConfig> {
        self.config.load_full()
    }

    /// Swap in a new configuration. Reads already in flight finish under the old one.
    pub fn update_config(&self, config: CachingConfig) -> Result<()> {
        check_default_store(&self.stores, &config)?;
        self.config.store(Arc::new(config));
        Ok(())
    }

    pub fn stores(&self) -> &StoreRegistry {
        &self.stores
    }

    pub fn cooldown(&self) -> &CooldownTracker {
        &self.cooldown
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    async fn lookup<T: DeserializeOwned>(&self, store: &dyn CacheStore, key: &CacheKey) -> Option<T> {
        match store.get(key).await {
            Ok(Some(entry)) => match serde_json::from_slice(&entry.value) {
                Ok(value) => Some(value),
                Err(e) => {
                    AtomicStats::bump(&self.stats.errors);
                    warn!(key = %key, store = store.name(), error = %e, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                warn!(key = %key, store = store.name(), error = %e, "cache read failed, executing query");
                None
            }
        }
    }

    async fn populate<T: Serialize>(
        &self,
        store: &dyn CacheStore,
        key: &CacheKey,
        value: &T,
        tags: &TagSet,
        config: &CachingConfig,
    ) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                warn!(key = %key, error = %e, "result is not serializable, not caching");
                return;
            }
        };
        match store.put(key, bytes, tags, config.ttl()).await {
            Ok(()) => AtomicStats::bump(&self.stats.stores),
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                warn!(key = %key, store = store.name(), error = %e, "cache write failed");
            }
        }
    }

    /// Entity names that lower to the same path would share keys and tags, so
    /// the first spelling seen for a path owns it.
    fn claim_entities<'e>(&self, entities: impl IntoIterator<Item = &'e str>) -> Result<()> {
        let mut slugs = mutex_lock(&self.entity_slugs, SOURCE, "claim_entities");
        for entity in entities {
            let path = entity_path(entity);
            match slugs.get(&path) {
                Some(owner) if owner != entity => {
                    return Err(Error::configuration_with_context(
                        "entity names collide in cache keys",
                        ErrorContext::new()
                            .with_field_path("entity")
                            .with_details(format!(
                                "{:?} and {:?} both map to {:?}",
                                owner, entity, path
                            ))
                            .with_source("cache_mediator"),
                    ));
                }
                Some(_) => {}
                None => {
                    slugs.insert(path, entity.to_string());
                }
            }
        }
        Ok(())
    }

    /// Forget `tag` in every store. If any store fails, the invalidation stays
    /// owed and the next read of the tag retries it.
    async fn forget_or_retry(&self, tag: &str, now: Instant) -> u64 {
        let (forgotten, complete) = self.forget_everywhere(tag).await;
        if !complete {
            self.cooldown.mark_pending(tag, now);
        }
        forgotten
    }

    async fn forget_everywhere(&self, tag: &str) -> (u64, bool) {
        let mut forgotten = 0;
        let mut complete = true;
        for (name, store) in self.stores.iter() {
            match store.forget_by_tag(tag).await {
                Ok(n) => forgotten += n,
                Err(e) => {
                    complete = false;
                    AtomicStats::bump(&self.stats.errors);
                    warn!(store = name, tag, error = %e, "cache invalidation failed, retrying on next read");
                }
            }
        }
        debug!(tag, forgotten, "invalidated tag");
        (forgotten, complete)
    }
}
