//! Eager-load propagation.
//!
//! Walks the relation loads of a description and the existence predicates in
//! its filter list. Each nested fragment is folded into the parent's canonical
//! string, and every entity reached is collected so the parent result also
//! carries its tag.
//! Tag granularity is per entity, never per row.

use std::collections::BTreeSet;

use super::canonical::{check_identifier, join_path, render_body};
use super::key::entity_path;
use crate::query::{QueryDescription, RelationExistence};
use crate::Result;

#[derive(Debug, Default)]
pub struct EagerLoadPropagator {
    entities: BTreeSet<String>,
}

impl EagerLoadPropagator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Related entities reached so far, deduplicated.
    pub fn entities(&self) -> &BTreeSet<String> {
        &self.entities
    }

    pub fn into_entities(self) -> BTreeSet<String> {
        self.entities
    }

    /// Append `-with(...)` for the eager loads of `query`, in declared order.
    pub fn fold_relations(
        &mut self,
        query: &QueryDescription,
        path: &str,
        out: &mut String,
    ) -> Result<()> {
        if query.relations.is_empty() {
            return Ok(());
        }
        out.push_str("-with(");
        for (i, relation) in query.relations.iter().enumerate() {
            let rpath = join_path(path, &format!("relations[{}]", i));
            check_identifier(&relation.name, &join_path(&rpath, "name"))?;
            check_identifier(&relation.entity, &join_path(&rpath, "entity"))?;
            self.entities.insert(relation.entity.clone());

            if i > 0 {
                out.push(',');
            }
            out.push_str(&relation.name);
            out.push_str("->");
            out.push_str(&entity_path(&relation.entity));
            out.push('{');
            if let Some(ref constraints) = relation.constraints {
                self.fold_fragment(constraints, &join_path(&rpath, "constraints"), out)?;
            }
            out.push('}');
        }
        out.push(')');
        Ok(())
    }

    /// Append one existence predicate. The caller writes its connector, since
    /// the predicate sits in the filter list alongside the other filters.
    pub fn fold_existence(
        &mut self,
        existence: &RelationExistence,
        path: &str,
        out: &mut String,
    ) -> Result<()> {
        check_identifier(&existence.relation, &join_path(path, "relation"))?;
        check_identifier(&existence.entity, &join_path(path, "entity"))?;
        self.entities.insert(existence.entity.clone());

        if existence.negated {
            out.push_str("not ");
        }
        out.push_str("has ");
        out.push_str(&existence.relation);
        out.push_str("->");
        out.push_str(&entity_path(&existence.entity));
        if let Some(ref join) = existence.join {
            check_identifier(&join.parent_column, &join_path(path, "join.parent_column"))?;
            check_identifier(&join.related_column, &join_path(path, "join.related_column"))?;
            out.push_str(&format!(
                " on {} = {}",
                join.parent_column, join.related_column
            ));
        }
        if let Some(count) = existence.count {
            out.push_str(&format!(" count {} {}", count.operator, count.count));
        }
        out.push('{');
        if let Some(ref constraints) = existence.constraints {
            self.fold_fragment(constraints, &join_path(path, "constraints"), out)?;
        }
        out.push('}');
        Ok(())
    }

    fn fold_fragment(
        &mut self,
        fragment: &QueryDescription,
        path: &str,
        out: &mut String,
    ) -> Result<()> {
        // A fragment naming another entity than its relation still gets tagged.
        if !fragment.entity.is_empty() {
            check_identifier(&fragment.entity, &join_path(path, "entity"))?;
            self.entities.insert(fragment.entity.clone());
        }
        let body = render_body(fragment, path, self)?;
        out.push_str(&body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Operator;

    fn fold(query: &QueryDescription) -> (String, BTreeSet<String>) {
        let mut propagator = EagerLoadPropagator::new();
        let body = render_body(query, "", &mut propagator).unwrap();
        (body, propagator.into_entities())
    }

    #[test]
    fn eager_loads_contribute_entities() {
        let q = QueryDescription::new("Book")
            .with("author", "Author")
            .with("publisher", "Publisher");
        let (body, entities) = fold(&q);
        assert_eq!(body, "-with(author->author{},publisher->publisher{})");
        assert_eq!(
            entities.into_iter().collect::<Vec<_>>(),
            vec!["Author".to_string(), "Publisher".to_string()]
        );
    }

    #[test]
    fn nested_loads_are_walked() {
        let q = QueryDescription::new("Book").with_constrained("author", "Author", |a| {
            a.where_eq("active", true).with("profile", "Profile")
        });
        let (body, entities) = fold(&q);
        assert_eq!(
            body,
            "-with(author->author{-where(active = true)-with(profile->profile{})})"
        );
        assert!(entities.contains("Author"));
        assert!(entities.contains("Profile"));
    }

    #[test]
    fn where_has_serializes_join_and_constraints() {
        let q = QueryDescription::new("Book").exists(
            RelationExistence::new("author", "Author")
                .joined_on("books.author_id", "authors.id")
                .with_constraints(QueryDescription::new("Author").where_eq("id", 1)),
        );
        let (body, entities) = fold(&q);
        assert_eq!(
            body,
            "-where(has author->author on books.author_id = authors.id{-where(id = 1)})"
        );
        assert_eq!(entities.len(), 1);
    }

    #[test]
    fn nested_filter_changes_parent_fragment() {
        let one = QueryDescription::new("Book").where_has("author", "Author", |q| q.where_eq("id", 1));
        let two = QueryDescription::new("Book").where_has("author", "Author", |q| q.where_eq("id", 2));
        assert_ne!(fold(&one).0, fold(&two).0);
    }

    #[test]
    fn negation_count_and_connector_are_distinguished() {
        let has = QueryDescription::new("Author").has("books", "Book");
        let missing = QueryDescription::new("Author").doesnt_have("books", "Book");
        let counted = QueryDescription::new("Author").has_count("books", "Book", Operator::GtEq, 2);
        assert_eq!(fold(&has).0, "-where(has books->book{})");
        assert_eq!(fold(&missing).0, "-where(not has books->book{})");
        assert_eq!(fold(&counted).0, "-where(has books->book count >= 2{})");

        let or = QueryDescription::new("Author")
            .has("books", "Book")
            .or_where_has("profile", "Profile", |p| p.where_not_null("bio"));
        assert_eq!(
            fold(&or).0,
            "-where(has books->book{} or has profile->profile{-where(bio is not null)})"
        );
    }

    #[test]
    fn duplicate_entities_collapse() {
        let q = QueryDescription::new("Book")
            .with("author", "Author")
            .where_has("author", "Author", |q| q.where_eq("id", 1));
        let (_, entities) = fold(&q);
        assert_eq!(entities.len(), 1);
    }

    #[test]
    fn malformed_existence_reports_filter_path() {
        let q = QueryDescription::new("Author")
            .where_eq("active", true)
            .has("bad relation", "Book");
        let err = render_body(&q, "", &mut EagerLoadPropagator::new()).unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("filters[1].relation")
        );
    }

    #[test]
    fn malformed_relation_reports_path() {
        let q = QueryDescription::new("Book").with_constrained("author", "Author", |a| {
            a.with("bad name", "Profile")
        });
        let err = render_body(&q, "", &mut EagerLoadPropagator::new()).unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("relations[0].constraints.relations[0].name")
        );
    }
}
