//! Cache key and tag derivation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::canonical::{check_identifier, render_body};
use super::propagate::EagerLoadPropagator;
use crate::config::CachingConfig;
use crate::query::QueryDescription;
use crate::Result;

/// Opaque, fixed-length cache key (hex SHA-256 of the canonical query string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub hash: String,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    /// Digest a canonical string into a key.
    pub fn from_canonical(canonical: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        Self::new(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Set of namespaced entity tags, iterated in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(tag: impl Into<String>) -> Self {
        let mut tags = Self::new();
        tags.insert(tag);
        tags
    }

    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        self.0.insert(tag.into())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn extend(&mut self, other: TagSet) {
        self.0.extend(other.0);
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for TagSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Entity name as it appears in keys and tags: lowercased, with everything
/// outside `[a-z0-9_.-]` removed. Names that differ only in case share a path;
/// [`CacheMediator`](super::CacheMediator) refuses to mix them.
pub fn entity_path(entity: &str) -> String {
    entity
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_alphanumeric() || matches!(*c, '_' | '-' | '.'))
        .collect()
}

/// Derives keys and tags from query descriptions under one configuration.
///
/// Keys hash `<namespace>:<environment>[:<prefix>]:<entity-path>` followed by
/// the rendered clauses; an unconstrained query hashes the bare namespace base.
pub struct KeyDeriver<'a> {
    config: &'a CachingConfig,
}

impl<'a> KeyDeriver<'a> {
    pub fn new(config: &'a CachingConfig) -> Self {
        Self { config }
    }

    pub fn derive(&self, query: &QueryDescription) -> Result<(CacheKey, TagSet)> {
        let (canonical, tags, _) = self.canonicalize(query)?;
        Ok((CacheKey::from_canonical(&canonical), tags))
    }

    /// Like [`derive`](Self::derive), also returning every entity name the
    /// query reaches, its own included.
    pub(crate) fn derive_with_entities(
        &self,
        query: &QueryDescription,
    ) -> Result<(CacheKey, TagSet, BTreeSet<String>)> {
        let (canonical, tags, entities) = self.canonicalize(query)?;
        Ok((CacheKey::from_canonical(&canonical), tags, entities))
    }

    /// The canonical string a key is digested from.
    pub fn canonical(&self, query: &QueryDescription) -> Result<String> {
        Ok(self.canonicalize(query)?.0)
    }

    fn canonicalize(&self, query: &QueryDescription) -> Result<(String, TagSet, BTreeSet<String>)> {
        check_identifier(&query.entity, "entity")?;

        let mut propagator = EagerLoadPropagator::new();
        let body = render_body(query, "", &mut propagator)?;

        let prefix = query
            .cache_prefix
            .as_deref()
            .or_else(|| self.config.model_prefix(&query.entity));
        let mut canonical = self.namespace_base(&query.entity, prefix);

        let mut tags = TagSet::new();
        tags.insert(self.entity_tag(&query.entity));
        // A per-query prefix override also tags its own namespace.
        tags.insert(canonical.clone());
        let mut entities = propagator.into_entities();
        for entity in &entities {
            tags.insert(self.entity_tag(entity));
        }
        entities.insert(query.entity.clone());

        canonical.push_str(&body);
        Ok((canonical, tags, entities))
    }

    /// Tag for an entity, using its configured model prefix.
    pub fn entity_tag(&self, entity: &str) -> String {
        self.namespace_base(entity, self.config.model_prefix(entity))
    }

    /// Validated tag set for the entities touched by a write.
    pub fn entity_tags<I, S>(&self, entities: I) -> Result<TagSet>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tags = TagSet::new();
        for (i, entity) in entities.into_iter().enumerate() {
            let entity = entity.as_ref();
            check_identifier(entity, &format!("entities[{}]", i))?;
            tags.insert(self.entity_tag(entity));
        }
        Ok(tags)
    }

    fn namespace_base(&self, entity: &str, prefix: Option<&str>) -> String {
        let path = entity_path(entity);
        let mut parts: Vec<&str> = vec![
            self.config.namespace.as_str(),
            self.config.environment.as_str(),
        ];
        if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
            parts.push(prefix);
        }
        parts.push(&path);
        parts.join(":")
    }
}
