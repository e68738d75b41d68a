//! 查询描述模块：以纯数据结构描述读查询，供缓存键推导使用。
//!
//! # Query Description Module
//!
//! Structural, immutable descriptions of read queries. The data-access layer
//! builds a [`QueryDescription`] and hands it to the cache layer read-only.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`QueryDescription`] | Entity, filters, relations, sort, pagination and cache modifiers |
//! | [`Filter`] | A filter predicate (basic, in, null, between, column, nested group) |
//! | [`RelationLoad`] | Eager-loaded relation with optional nested constraints |
//! | [`RelationExistence`] | `has`/`where_has`/`doesnt_have` predicate |
//!
//! ## Example
//!
//! ```rust
//! use model_cache::query::QueryDescription;
//!
//! let books = QueryDescription::new("Book")
//!     .with("author", "Author")
//!     .where_has("author", "Author", |q| q.where_eq("id", 1))
//!     .order_by_desc("published_at")
//!     .limit(20);
//! assert_eq!(books.relations.len(), 1);
//! ```

mod description;
mod filter;
mod relation;

pub use description::QueryDescription;
pub use filter::{Connector, Filter, Operator};
pub use relation::{
    CountConstraint, JoinCondition, Pagination, RelationExistence, RelationLoad, SortColumn,
    SortDirection,
};
