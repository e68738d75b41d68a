//! Filter predicates.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::relation::RelationExistence;

/// Boolean connector joining a predicate to the ones before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connector {
    #[default]
    And,
    Or,
}

impl Connector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Connector::And => "and",
            Connector::Or => "or",
        }
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "not like")]
    NotLike,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
            Operator::Like => "like",
            Operator::NotLike => "not like",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single filter predicate of a query description.
///
/// Values are kept as JSON values so the key deriver can distinguish `"1"` from `1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// `column operator value`
    Basic {
        #[serde(default)]
        connector: Connector,
        column: String,
        operator: Operator,
        value: Value,
    },
    /// `column [not] in (values...)`
    In {
        #[serde(default)]
        connector: Connector,
        column: String,
        values: Vec<Value>,
        #[serde(default)]
        negated: bool,
    },
    /// `column is [not] null`
    Null {
        #[serde(default)]
        connector: Connector,
        column: String,
        #[serde(default)]
        negated: bool,
    },
    /// `column [not] between low and high`
    Between {
        #[serde(default)]
        connector: Connector,
        column: String,
        low: Value,
        high: Value,
        #[serde(default)]
        negated: bool,
    },
    /// Column-to-column comparison, typically a join condition.
    Column {
        #[serde(default)]
        connector: Connector,
        left: String,
        operator: Operator,
        right: String,
    },
    /// Parenthesized group of predicates.
    Nested {
        #[serde(default)]
        connector: Connector,
        filters: Vec<Filter>,
    },
    /// Relation existence (`has`, `where_has`, `doesnt_have`). Kept in the
    /// filter list so its position among the other predicates is preserved.
    Exists(RelationExistence),
}

impl Filter {
    pub fn connector(&self) -> Connector {
        match self {
            Filter::Basic { connector, .. }
            | Filter::In { connector, .. }
            | Filter::Null { connector, .. }
            | Filter::Between { connector, .. }
            | Filter::Column { connector, .. }
            | Filter::Nested { connector, .. } => *connector,
            Filter::Exists(existence) => existence.connector,
        }
    }

    /// Returns true for groups that contain no predicate at any depth.
    pub fn is_empty_group(&self) -> bool {
        match self {
            Filter::Nested { filters, .. } => filters.iter().all(Filter::is_empty_group),
            _ => false,
        }
    }
}
