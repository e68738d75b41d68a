//! # model-cache
//!
//! 透明的查询结果缓存层：读穿透缓存、基于实体标签的写失效、失效冷却窗口。
//!
//! Transparent query-result caching for a data-access layer. Reads are served
//! from a cache store when an identical query was seen before; writes evict
//! every cached result that depends on a touched entity.
//!
//! ## Overview
//!
//! - **Deterministic keys**: structurally identical queries share one key, and
//!   any difference in filters, relations, sort or pagination yields another
//! - **Tag-based invalidation**: results are tagged with every entity they
//!   depend on, including eagerly loaded relations
//! - **Cooldowns**: a query may opt its entity into a window during which
//!   further invalidations are deferred
//! - **Fail open**: an unavailable cache store degrades to direct execution
//!
//! ## Quick Start
//!
//! ```rust
//! use model_cache::{CacheMediator, CachingConfig, QueryDescription};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> model_cache::Result<()> {
//! let cache = CacheMediator::in_memory(
//!     CachingConfig::new().with_namespace("shop").with_environment("dev"),
//! )?;
//!
//! let query = QueryDescription::new("Book")
//!     .with("author", "Author")
//!     .where_eq("published", true);
//! let titles: Vec<String> = cache
//!     .read_through(&query, || async { Ok::<_, model_cache::Error>(vec!["Dune".into()]) })
//!     .await?;
//! assert_eq!(titles, vec!["Dune"]);
//!
//! // Writing an author evicts the book listing above as well.
//! let tags = cache.entity_tags(["Author"])?;
//! cache.write_through(&tags, || async { Ok::<_, model_cache::Error>(()) }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`query`] | Structural query descriptions and their builder |
//! | [`cache`] | Key derivation, mediator, cooldowns and stores |
//! | [`model`] | Data-access trait and cached model wrapper |
//! | [`config`] | Caching configuration (YAML and environment) |
//! | [`error`] | Error types |

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod query;

pub use cache::{
    CacheKey, CacheMediator, CacheMediatorBuilder, CacheStats, CacheStore, KeyDeriver,
    MemoryStore, NullStore, StoreRegistry, TagSet,
};
pub use config::CachingConfig;
pub use error::{Error, ErrorContext};
pub use model::{CachedModel, DataAccess};
pub use query::QueryDescription;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
