//! 模型访问模块：将数据访问层与缓存中介组合在一起。
//!
//! # Cached Data Access
//!
//! [`DataAccess`] is the seam to the persistence layer: it runs a
//! [`QueryDescription`] and applies writes. [`CachedModel`] wraps any
//! implementation so reads go through the cache and writes invalidate it.
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use model_cache::{CacheMediator, CachedModel, CachingConfig, DataAccess, QueryDescription};
//!
//! struct Authors;
//!
//! #[async_trait]
//! impl DataAccess for Authors {
//!     type Record = String;
//!     type Write = String;
//!     type Output = ();
//!     type Error = model_cache::Error;
//!
//!     fn entity(&self) -> &str {
//!         "Author"
//!     }
//!
//!     async fn fetch(&self, _query: &QueryDescription) -> Result<Vec<String>, Self::Error> {
//!         Ok(vec!["Anna".into()])
//!     }
//!
//!     async fn persist(&self, _name: String) -> Result<(), Self::Error> {
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> model_cache::Result<()> {
//! let cache = Arc::new(CacheMediator::in_memory(CachingConfig::new())?);
//! let authors = CachedModel::new(Authors, cache);
//! assert_eq!(authors.all().await?, vec!["Anna"]);
//! authors.write("Bruno".into()).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::cache::CacheMediator;
use crate::query::QueryDescription;
use crate::Error;

/// Persistence layer for one entity.
#[async_trait]
pub trait DataAccess: Send + Sync {
    type Record: Serialize + DeserializeOwned + Send;
    type Write: Send;
    type Output: Send;
    type Error: From<Error> + Send;

    /// Entity name used for keys and tags.
    fn entity(&self) -> &str;

    async fn fetch(&self, query: &QueryDescription) -> Result<Vec<Self::Record>, Self::Error>;

    async fn persist(&self, write: Self::Write) -> Result<Self::Output, Self::Error>;

    /// Entities other than [`entity`](Self::entity) whose cached results the
    /// write makes stale, e.g. the parent of a touched relation.
    fn affected_entities(&self, _write: &Self::Write) -> Vec<String> {
        Vec::new()
    }
}

/// A [`DataAccess`] whose reads and writes go through a [`CacheMediator`].
pub struct CachedModel<D> {
    inner: D,
    cache: Arc<CacheMediator>,
}

impl<D: DataAccess> CachedModel<D> {
    pub fn new(inner: D, cache: Arc<CacheMediator>) -> Self {
        Self { inner, cache }
    }

    /// Empty description for this model's entity.
    pub fn query(&self) -> QueryDescription {
        QueryDescription::new(self.inner.entity())
    }

    pub async fn get(&self, query: &QueryDescription) -> Result<Vec<D::Record>, D::Error> {
        self.cache
            .read_through(query, || self.inner.fetch(query))
            .await
    }

    pub async fn all(&self) -> Result<Vec<D::Record>, D::Error> {
        let query = self.query();
        self.get(&query).await
    }

    /// Persist `write`, then invalidate this entity and every affected one.
    pub async fn write(&self, write: D::Write) -> Result<D::Output, D::Error> {
        let mut entities = self.inner.affected_entities(&write);
        entities.push(self.inner.entity().to_string());
        let tags = self.cache.entity_tags(&entities)?;
        self.cache
            .write_through(&tags, move || self.inner.persist(write))
            .await
    }

    /// Drop every cached result for this entity, ignoring cooldowns.
    pub async fn flush(&self) -> Result<u64, D::Error> {
        let tags = self.cache.entity_tags([self.inner.entity()])?;
        Ok(self.cache.flush(&tags).await)
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn cache(&self) -> &Arc<CacheMediator> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CachingConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Tags {
        rows: Mutex<Vec<String>>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl DataAccess for Tags {
        type Record = String;
        type Write = String;
        type Output = usize;
        type Error = Error;

        fn entity(&self) -> &str {
            "Tag"
        }

        async fn fetch(&self, _query: &QueryDescription) -> Result<Vec<String>, Error> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn persist(&self, name: String) -> Result<usize, Error> {
            let mut rows = self.rows.lock().unwrap();
            rows.push(name);
            Ok(rows.len())
        }

        fn affected_entities(&self, _write: &String) -> Vec<String> {
            vec!["Post".to_string()]
        }
    }

    fn model() -> CachedModel<Tags> {
        let cache = CacheMediator::in_memory(CachingConfig::new()).unwrap();
        CachedModel::new(Tags::default(), Arc::new(cache))
    }

    #[tokio::test]
    async fn write_invalidates_entity_and_affected() {
        let tags = model();
        assert!(tags.all().await.unwrap().is_empty());
        assert!(tags.all().await.unwrap().is_empty());
        assert_eq!(tags.inner().fetches.load(Ordering::SeqCst), 1);

        assert_eq!(tags.write("rust".into()).await.unwrap(), 1);
        assert_eq!(tags.all().await.unwrap(), vec!["rust"]);
        assert_eq!(tags.inner().fetches.load(Ordering::SeqCst), 2);
        // Own tag and the affected Post tag.
        assert_eq!(tags.cache().stats().invalidations, 2);
    }

    #[tokio::test]
    async fn flush_forgets_cached_results() {
        let tags = model();
        tags.all().await.unwrap();
        assert_eq!(tags.flush().await.unwrap(), 1);
        tags.all().await.unwrap();
        assert_eq!(tags.inner().fetches.load(Ordering::SeqCst), 2);
    }
}
