//! The structural query description handed to the key deriver.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::filter::{Connector, Filter, Operator};
use super::relation::{
    Pagination, RelationExistence, RelationLoad, SortColumn, SortDirection,
};

/// Immutable structural representation of a read query.
///
/// Built eagerly by the data-access layer: closures that scope a relation are
/// applied at build time and only their resulting predicates are stored, so the
/// description can be fingerprinted without executing anything.
///
/// The `cache_*`/`cooldown`/`store` fields are per-execution modifiers. Only
/// `cache_prefix` takes part in the derived key (it is part of the namespace).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDescription {
    pub entity: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<RelationLoad>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortColumn>,
    pub pagination: Pagination,

    pub cache_disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
}

impl QueryDescription {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Default::default()
        }
    }

    /// Restrict the selected columns. A lone `"*"` is equivalent to selecting nothing.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn where_op(self, column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        self.filter(Filter::Basic {
            connector: Connector::And,
            column: column.into(),
            operator,
            value: value.into(),
        })
    }

    pub fn where_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_op(column, Operator::Eq, value)
    }

    pub fn or_where(self, column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        self.filter(Filter::Basic {
            connector: Connector::Or,
            column: column.into(),
            operator,
            value: value.into(),
        })
    }

    pub fn where_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filter(Filter::In {
            connector: Connector::And,
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        })
    }

    pub fn where_not_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filter(Filter::In {
            connector: Connector::And,
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        })
    }

    pub fn where_null(self, column: impl Into<String>) -> Self {
        self.filter(Filter::Null {
            connector: Connector::And,
            column: column.into(),
            negated: false,
        })
    }

    pub fn where_not_null(self, column: impl Into<String>) -> Self {
        self.filter(Filter::Null {
            connector: Connector::And,
            column: column.into(),
            negated: true,
        })
    }

    pub fn where_between(
        self,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.filter(Filter::Between {
            connector: Connector::And,
            column: column.into(),
            low: low.into(),
            high: high.into(),
            negated: false,
        })
    }

    pub fn where_column(
        self,
        left: impl Into<String>,
        operator: Operator,
        right: impl Into<String>,
    ) -> Self {
        self.filter(Filter::Column {
            connector: Connector::And,
            left: left.into(),
            operator,
            right: right.into(),
        })
    }

    /// Add a parenthesized group built by `scope`.
    pub fn where_group<F>(self, scope: F) -> Self
    where
        F: FnOnce(QueryDescription) -> QueryDescription,
    {
        self.group(Connector::And, scope)
    }

    pub fn or_where_group<F>(self, scope: F) -> Self
    where
        F: FnOnce(QueryDescription) -> QueryDescription,
    {
        self.group(Connector::Or, scope)
    }

    fn group<F>(self, connector: Connector, scope: F) -> Self
    where
        F: FnOnce(QueryDescription) -> QueryDescription,
    {
        let scoped = scope(QueryDescription::new(self.entity.clone()));
        self.filter(Filter::Nested {
            connector,
            filters: scoped.filters,
        })
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push(SortColumn {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn order_by_desc(self, column: impl Into<String>) -> Self {
        self.order_by(column, SortDirection::Desc)
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.pagination.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.pagination.limit = Some(limit);
        self
    }

    /// Page-based pagination, pages are 1-based.
    pub fn for_page(self, page: u64, per_page: u64) -> Self {
        let offset = page.saturating_sub(1).saturating_mul(per_page);
        self.offset(offset).limit(per_page)
    }

    /// Eager-load a relation.
    pub fn with(mut self, relation: impl Into<String>, entity: impl Into<String>) -> Self {
        self.relations.push(RelationLoad::new(relation, entity));
        self
    }

    /// Eager-load a relation scoped by `scope`, which receives a description of the related entity.
    pub fn with_constrained<F>(
        mut self,
        relation: impl Into<String>,
        entity: impl Into<String>,
        scope: F,
    ) -> Self
    where
        F: FnOnce(QueryDescription) -> QueryDescription,
    {
        let entity = entity.into();
        let constraints = scope(QueryDescription::new(entity.clone()));
        self.relations
            .push(RelationLoad::new(relation, entity).with_constraints(constraints));
        self
    }

    pub fn has(self, relation: impl Into<String>, entity: impl Into<String>) -> Self {
        self.exists(RelationExistence::new(relation, entity))
    }

    pub fn has_count(
        self,
        relation: impl Into<String>,
        entity: impl Into<String>,
        operator: Operator,
        count: u64,
    ) -> Self {
        self.exists(RelationExistence::new(relation, entity).with_count(operator, count))
    }

    pub fn doesnt_have(self, relation: impl Into<String>, entity: impl Into<String>) -> Self {
        self.exists(RelationExistence::new(relation, entity).negated())
    }

    /// `where_has`: the relation must exist and satisfy the predicates added by `scope`.
    pub fn where_has<F>(
        self,
        relation: impl Into<String>,
        entity: impl Into<String>,
        scope: F,
    ) -> Self
    where
        F: FnOnce(QueryDescription) -> QueryDescription,
    {
        let entity = entity.into();
        let constraints = scope(QueryDescription::new(entity.clone()));
        self.exists(RelationExistence::new(relation, entity).with_constraints(constraints))
    }

    pub fn or_where_has<F>(
        self,
        relation: impl Into<String>,
        entity: impl Into<String>,
        scope: F,
    ) -> Self
    where
        F: FnOnce(QueryDescription) -> QueryDescription,
    {
        let entity = entity.into();
        let constraints = scope(QueryDescription::new(entity.clone()));
        self.exists(
            RelationExistence::new(relation, entity)
                .with_constraints(constraints)
                .with_connector(Connector::Or),
        )
    }

    pub fn where_doesnt_have<F>(
        self,
        relation: impl Into<String>,
        entity: impl Into<String>,
        scope: F,
    ) -> Self
    where
        F: FnOnce(QueryDescription) -> QueryDescription,
    {
        let entity = entity.into();
        let constraints = scope(QueryDescription::new(entity.clone()));
        self.exists(
            RelationExistence::new(relation, entity)
                .with_constraints(constraints)
                .negated(),
        )
    }

    /// Add a fully specified existence predicate (e.g. one carrying a join condition).
    ///
    /// The predicate joins the filter list at its current position.
    pub fn exists(self, existence: RelationExistence) -> Self {
        self.filter(Filter::Exists(existence))
    }

    /// Bypass the cache for this execution only.
    pub fn disable_cache(mut self) -> Self {
        self.cache_disabled = true;
        self
    }

    /// Opt this read path into a cooldown window for its entity.
    pub fn with_cache_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    pub fn with_cache_cooldown_seconds(self, seconds: u64) -> Self {
        self.with_cache_cooldown(Duration::from_secs(seconds))
    }

    /// Override the per-model key prefix for this description's entity.
    pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = Some(prefix.into());
        self
    }

    /// Serve this execution from a named store instead of the configured default.
    pub fn on_store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }

    /// Returns true when no column restriction applies (nothing, or a lone `"*"`).
    pub fn selects_all(&self) -> bool {
        match self.columns.as_slice() {
            [] => true,
            [only] => only == "*",
            _ => false,
        }
    }

    /// Returns true when no clause narrows or shapes the result set.
    pub fn is_unconstrained(&self) -> bool {
        self.selects_all()
            && self.filters.iter().all(Filter::is_empty_group)
            && self.relations.is_empty()
            && self.sort.is_empty()
            && self.pagination.is_unbounded()
    }
}
