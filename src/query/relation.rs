//! Relation loads, relation-existence predicates, sort and pagination.

use serde::{Deserialize, Serialize};

use super::description::QueryDescription;
use super::filter::{Connector, Operator};

/// An eager-loaded relation.
///
/// `constraints` holds the effect of a scoping closure as a nested description
/// whose entity is the related entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationLoad {
    pub name: String,
    pub entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Box<QueryDescription>>,
}

impl RelationLoad {
    pub fn new(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            constraints: None,
        }
    }

    pub fn with_constraints(mut self, constraints: QueryDescription) -> Self {
        self.constraints = Some(Box::new(constraints));
        self
    }
}

/// Join condition between the parent and the related table of an existence predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinCondition {
    pub parent_column: String,
    pub related_column: String,
}

/// `has(relation, operator, count)` style comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountConstraint {
    pub operator: Operator,
    pub count: u64,
}

/// A `has` / `where_has` / `doesnt_have` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationExistence {
    #[serde(default)]
    pub connector: Connector,
    pub relation: String,
    pub entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Box<QueryDescription>>,
    #[serde(default)]
    pub negated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<CountConstraint>,
}

impl RelationExistence {
    pub fn new(relation: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            connector: Connector::And,
            relation: relation.into(),
            entity: entity.into(),
            join: None,
            constraints: None,
            negated: false,
            count: None,
        }
    }

    pub fn joined_on(
        mut self,
        parent_column: impl Into<String>,
        related_column: impl Into<String>,
    ) -> Self {
        self.join = Some(JoinCondition {
            parent_column: parent_column.into(),
            related_column: related_column.into(),
        });
        self
    }

    pub fn with_constraints(mut self, constraints: QueryDescription) -> Self {
        self.constraints = Some(Box::new(constraints));
        self
    }

    pub fn negated(mut self) -> Self {
        self.negated = true;
        self
    }

    pub fn with_count(mut self, operator: Operator, count: u64) -> Self {
        self.count = Some(CountConstraint { operator, count });
        self
    }

    pub fn with_connector(mut self, connector: Connector) -> Self {
        self.connector = connector;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortColumn {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Offset/limit bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl Pagination {
    pub fn is_unbounded(&self) -> bool {
        self.offset.is_none() && self.limit.is_none()
    }
}
