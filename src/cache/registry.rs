//! Named cache store registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::backend::CacheStore;
use crate::{Error, ErrorContext, Result};

/// Maps store names to store instances. The default store name comes from
/// configuration; a query may select another registered store by name.
#[derive(Clone, Default)]
pub struct StoreRegistry {
    stores: BTreeMap<String, Arc<dyn CacheStore>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, name: impl Into<String>, store: Arc<dyn CacheStore>) -> Self {
        self.register(name, store);
        self
    }

    /// Register a store, returning the one previously registered under `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        store: Arc<dyn CacheStore>,
    ) -> Option<Arc<dyn CacheStore>> {
        self.stores.insert(name.into(), store)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CacheStore>> {
        self.stores.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    /// The requested store, or the default one when none was requested.
    pub fn resolve(&self, requested: Option<&str>, default: &str) -> Result<Arc<dyn CacheStore>> {
        let name = requested.unwrap_or(default);
        self.get(name).ok_or_else(|| {
            Error::configuration_with_context(
                "unknown cache store",
                ErrorContext::new()
                    .with_field_path("store")
                    .with_details(format!("{:?} (registered: {})", name, self.names().join(", ")))
                    .with_source("store_registry"),
            )
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.stores.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn CacheStore>)> {
        self.stores.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}
