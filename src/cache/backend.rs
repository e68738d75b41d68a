//! Cache store implementations.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::time::Instant;

use super::key::{CacheKey, TagSet};
use super::lock::mutex_lock;
use crate::Result;

const SOURCE: &str = "cache::backend";

/// A stored result set and the tags it was registered under.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Vec<u8>,
    pub tags: TagSet,
    pub created_at: Instant,
    /// `None` keeps the entry until it is forgotten or evicted.
    pub ttl: Option<Duration>,
}

impl CacheEntry {
    pub fn new(value: Vec<u8>, tags: TagSet, ttl: Option<Duration>) -> Self {
        Self {
            value,
            tags,
            created_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.ttl
            .map(|ttl| self.created_at.elapsed() > ttl)
            .unwrap_or(false)
    }
}

/// Tag-aware key/value store.
///
/// Tag-based eviction is owned entirely by the store: the mediator never tracks
/// which keys belong to a tag.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;
    async fn put(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        tags: &TagSet,
        ttl: Option<Duration>,
    ) -> Result<()>;
    async fn forget(&self, key: &CacheKey) -> Result<bool>;
    /// Forget every entry registered under `tag`, returning how many were removed.
    async fn forget_by_tag(&self, tag: &str) -> Result<u64>;
    async fn len(&self) -> Result<usize>;
    fn name(&self) -> &str;
}

struct MemoryState {
    entries: LruCache<String, CacheEntry>,
    tag_index: HashMap<String, HashSet<String>>,
}

impl MemoryState {
    fn unindex(&mut self, key: &str, tags: &TagSet) {
        for tag in tags.iter() {
            if let Some(keys) = self.tag_index.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.pop(key)?;
        self.unindex(key, &entry.tags);
        Some(entry)
    }
}

/// In-process store with LRU eviction and a tag index.
pub struct MemoryStore {
    name: String,
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new(capacity: usize) -> Self {
        Self::named(crate::config::DEFAULT_STORE, capacity)
    }

    pub fn named(name: impl Into<String>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name: name.into(),
            state: Mutex::new(MemoryState {
                entries: LruCache::new(capacity),
                tag_index: HashMap::new(),
            }),
        }
    }

    /// Number of live keys registered under `tag`.
    pub fn tagged_keys(&self, tag: &str) -> usize {
        mutex_lock(&self.state, SOURCE, "tagged_keys")
            .tag_index
            .get(tag)
            .map(HashSet::len)
            .unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let mut state = mutex_lock(&self.state, SOURCE, "get");
        match state.entries.get(&key.hash) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.clone())),
            Some(_) => {}
        }
        state.remove(&key.hash);
        Ok(None)
    }

    async fn put(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        tags: &TagSet,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let mut state = mutex_lock(&self.state, SOURCE, "put");
        state.remove(&key.hash);
        for tag in tags.iter() {
            state
                .tag_index
                .entry(tag.to_string())
                .or_default()
                .insert(key.hash.clone());
        }
        let entry = CacheEntry::new(value, tags.clone(), ttl);
        if let Some((evicted_key, evicted)) = state.entries.push(key.hash.clone(), entry) {
            if evicted_key != key.hash {
                state.unindex(&evicted_key, &evicted.tags);
            }
        }
        Ok(())
    }

    async fn forget(&self, key: &CacheKey) -> Result<bool> {
        Ok(mutex_lock(&self.state, SOURCE, "forget")
            .remove(&key.hash)
            .is_some())
    }

    async fn forget_by_tag(&self, tag: &str) -> Result<u64> {
        let mut state = mutex_lock(&self.state, SOURCE, "forget_by_tag");
        let keys = state.tag_index.remove(tag).unwrap_or_default();
        let mut removed = 0;
        for key in keys {
            if state.remove(&key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        Ok(mutex_lock(&self.state, SOURCE, "len")
            .entries
            .iter()
            .filter(|(_, e)| !e.is_expired())
            .count())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Store that never holds anything.
pub struct NullStore;

impl NullStore {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for NullStore {
    async fn get(&self, _: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(None)
    }
    async fn put(&self, _: &CacheKey, _: Vec<u8>, _: &TagSet, _: Option<Duration>) -> Result<()> {
        Ok(())
    }
    async fn forget(&self, _: &CacheKey) -> Result<bool> {
        Ok(false)
    }
    async fn forget_by_tag(&self, _: &str) -> Result<u64> {
        Ok(0)
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    fn name(&self) -> &str {
        "null"
    }
}
