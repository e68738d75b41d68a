//! Canonical string rendering of query descriptions.
//!
//! Clause order is fixed (`select`, `where`, `order`, `offset`, `limit`,
//! `with`). Filters, existence predicates among them, and relation loads keep
//! insertion order. Values are JSON encoded and identifiers are validated, so
//! no user-supplied text can forge a clause boundary.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::propagate::EagerLoadPropagator;
use crate::query::{Filter, QueryDescription};
use crate::{Error, ErrorContext, Result};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("identifier pattern is valid")
});

pub(crate) fn check_identifier(value: &str, field_path: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::malformed("empty identifier", field_path));
    }
    if !IDENTIFIER.is_match(value) {
        return Err(Error::MalformedQuery {
            message: "invalid identifier".to_string(),
            context: ErrorContext::new()
                .with_field_path(field_path)
                .with_details(format!("{:?}", value))
                .with_source("key_deriver"),
        });
    }
    Ok(())
}

fn check_column(value: &str, field_path: &str) -> Result<()> {
    if value == "*" {
        return Ok(());
    }
    match value.strip_suffix(".*") {
        Some(table) => check_identifier(table, field_path),
        None => check_identifier(value, field_path),
    }
}

pub(crate) fn join_path(base: &str, field: &str) -> String {
    if base.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", base, field)
    }
}

fn json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Render every clause of `query` below the namespace base.
///
/// Relation loads and existence predicates are delegated to `propagator`, which
/// recurses back into this function for nested fragments.
pub(crate) fn render_body(
    query: &QueryDescription,
    path: &str,
    propagator: &mut EagerLoadPropagator,
) -> Result<String> {
    let mut out = String::new();

    if !query.selects_all() {
        for (i, column) in query.columns.iter().enumerate() {
            check_column(column, &join_path(path, &format!("columns[{}]", i)))?;
        }
        out.push_str("-select(");
        out.push_str(&query.columns.join(","));
        out.push(')');
    }

    if !query.filters.iter().all(Filter::is_empty_group) {
        out.push_str("-where(");
        render_filters(&query.filters, &join_path(path, "filters"), propagator, &mut out)?;
        out.push(')');
    }

    if !query.sort.is_empty() {
        let mut parts = Vec::with_capacity(query.sort.len());
        for (i, sort) in query.sort.iter().enumerate() {
            check_identifier(&sort.column, &join_path(path, &format!("sort[{}].column", i)))?;
            parts.push(format!("{} {}", sort.column, sort.direction.as_str()));
        }
        out.push_str("-order(");
        out.push_str(&parts.join(","));
        out.push(')');
    }

    if let Some(offset) = query.pagination.offset {
        out.push_str(&format!("-offset({})", offset));
    }
    if let Some(limit) = query.pagination.limit {
        out.push_str(&format!("-limit({})", limit));
    }

    propagator.fold_relations(query, path, &mut out)?;

    Ok(out)
}

fn render_filters(
    filters: &[Filter],
    path: &str,
    propagator: &mut EagerLoadPropagator,
    out: &mut String,
) -> Result<()> {
    let mut first = true;
    for (i, filter) in filters.iter().enumerate() {
        if filter.is_empty_group() {
            continue;
        }
        let fpath = format!("{}[{}]", path, i);
        // The leading connector has no effect on the result set.
        if !first {
            out.push(' ');
            out.push_str(filter.connector().as_str());
            out.push(' ');
        }
        first = false;

        match filter {
            Filter::Basic {
                column,
                operator,
                value,
                ..
            } => {
                check_identifier(column, &join_path(&fpath, "column"))?;
                out.push_str(&format!("{} {} {}", column, operator, json(value)?));
            }
            Filter::In {
                column,
                values,
                negated,
                ..
            } => {
                check_identifier(column, &join_path(&fpath, "column"))?;
                let op = if *negated { "not in" } else { "in" };
                out.push_str(&format!("{} {} {}", column, op, json(values)?));
            }
            Filter::Null {
                column, negated, ..
            } => {
                check_identifier(column, &join_path(&fpath, "column"))?;
                let op = if *negated { "is not null" } else { "is null" };
                out.push_str(&format!("{} {}", column, op));
            }
            Filter::Between {
                column,
                low,
                high,
                negated,
                ..
            } => {
                check_identifier(column, &join_path(&fpath, "column"))?;
                let op = if *negated { "not between" } else { "between" };
                out.push_str(&format!("{} {} [{},{}]", column, op, json(low)?, json(high)?));
            }
            Filter::Column {
                left,
                operator,
                right,
                ..
            } => {
                check_identifier(left, &join_path(&fpath, "left"))?;
                check_identifier(right, &join_path(&fpath, "right"))?;
                out.push_str(&format!("{} {} @{}", left, operator, right));
            }
            Filter::Nested { filters, .. } => {
                out.push('(');
                render_filters(filters, &join_path(&fpath, "filters"), propagator, out)?;
                out.push(')');
            }
            Filter::Exists(existence) => {
                propagator.fold_existence(existence, &fpath, out)?;
            }
        }
    }
    Ok(())
}
