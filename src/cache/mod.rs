//! 查询结果缓存模块：键推导、标签失效、冷却窗口与可插拔存储。
//!
//! # Query Result Caching Module
//!
//! Transparent read-through caching of query results with tag-based
//! write-through invalidation.
//!
//! ## Overview
//!
//! A read is described by a [`QueryDescription`](crate::query::QueryDescription).
//! The [`KeyDeriver`] turns it into a deterministic [`CacheKey`] and a
//! [`TagSet`] naming every entity the result depends on, including entities
//! reached through eager loads and existence predicates. A write names the
//! entities it touched; every cached result tagged with one of them is
//! forgotten, unless the tag is inside a cooldown window.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheMediator`] | Read-through and write-through entry points, statistics |
//! | [`KeyDeriver`] | Canonical key and tag derivation |
//! | [`EagerLoadPropagator`] | Folds nested relation fragments into the parent key and tags |
//! | [`CooldownTracker`] | Per-tag invalidation cooldown windows |
//! | [`DisableSwitch`] | Global and per-query bypass |
//! | [`CacheStore`] | Trait for tag-aware cache stores |
//! | [`MemoryStore`] | In-memory LRU store with a tag index |
//! | [`NullStore`] | Store that never holds anything |
//! | [`StoreRegistry`] | Named stores, selectable per query |
//!
//! ## Example
//!
//! ```rust
//! use model_cache::cache::CacheMediator;
//! use model_cache::config::CachingConfig;
//! use model_cache::query::QueryDescription;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> model_cache::Result<()> {
//! let cache = CacheMediator::in_memory(CachingConfig::new())?;
//! let query = QueryDescription::new("Author").where_eq("active", true);
//!
//! let names: Vec<String> = cache
//!     .read_through(&query, || async { Ok::<_, model_cache::Error>(vec!["Anna".into()]) })
//!     .await?;
//! assert_eq!(names, vec!["Anna"]);
//!
//! let tags = cache.entity_tags(["Author"])?;
//! cache.write_through(&tags, || async { Ok::<_, model_cache::Error>(()) }).await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod canonical;
mod cooldown;
mod key;
mod lock;
mod mediator;
mod propagate;
mod registry;
mod switch;

pub use backend::{CacheEntry, CacheStore, MemoryStore, NullStore};
pub use cooldown::{CooldownDecision, CooldownRecord, CooldownTracker};
pub use key::{entity_path, CacheKey, KeyDeriver, TagSet};
pub use mediator::{CacheMediator, CacheMediatorBuilder, CacheStats};
pub use propagate::EagerLoadPropagator;
pub use registry::StoreRegistry;
pub use switch::DisableSwitch;
