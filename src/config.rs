//! Caching configuration.
//!
//! The configuration is an explicit value passed into the mediator; it can be
//! loaded from YAML and overlaid with environment variables:
//!
//! - `MODEL_CACHE_DISABLED` (`1`/`true` disables caching globally)
//! - `MODEL_CACHE_STORE` (default store name)
//! - `MODEL_CACHE_NAMESPACE`
//! - `MODEL_CACHE_ENV`
//! - `MODEL_CACHE_TTL_SECS` (`0` means indefinite)

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, ErrorContext, Result};

pub const DEFAULT_NAMESPACE: &str = "model-cache";
pub const DEFAULT_ENVIRONMENT: &str = "production";
pub const DEFAULT_STORE: &str = "memory";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachingConfig {
    /// Application namespace, first segment of every key and tag.
    pub namespace: String,
    /// Environment segment (e.g. "testing", "production").
    pub environment: String,
    /// Global disable switch.
    pub disabled: bool,
    /// Name of the default cache store.
    pub store: String,
    /// Entry TTL in seconds; `None` stores entries indefinitely.
    pub ttl_secs: Option<u64>,
    /// Per-entity key prefixes, keyed by entity name.
    pub model_prefixes: BTreeMap<String, String>,
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            disabled: false,
            store: DEFAULT_STORE.to_string(),
            ttl_secs: None,
            model_prefixes: BTreeMap::new(),
        }
    }
}

impl CachingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = store.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = Some(ttl.as_secs());
        self
    }

    pub fn with_model_prefix(mut self, entity: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.model_prefixes.insert(entity.into(), prefix.into());
        self
    }

    /// Entry TTL, `None` when entries never expire on their own.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }

    pub fn model_prefix(&self, entity: &str) -> Option<&str> {
        self.model_prefixes.get(entity).map(String::as_str)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("MODEL_CACHE_DISABLED") {
            self.disabled = parse_flag("MODEL_CACHE_DISABLED", &raw)?;
        }
        if let Some(store) = lookup("MODEL_CACHE_STORE").filter(|s| !s.is_empty()) {
            self.store = store;
        }
        if let Some(ns) = lookup("MODEL_CACHE_NAMESPACE").filter(|s| !s.is_empty()) {
            self.namespace = ns;
        }
        if let Some(env) = lookup("MODEL_CACHE_ENV").filter(|s| !s.is_empty()) {
            self.environment = env;
        }
        if let Some(raw) = lookup("MODEL_CACHE_TTL_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                Error::configuration_with_context(
                    "invalid TTL",
                    ErrorContext::new()
                        .with_field_path("MODEL_CACHE_TTL_SECS")
                        .with_details(format!("{:?}: {}", raw, e))
                        .with_source("config"),
                )
            })?;
            self.ttl_secs = Some(secs);
        }
        Ok(self)
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::configuration_with_context(
            "invalid boolean flag",
            ErrorContext::new()
                .with_field_path(name)
                .with_details(other.to_string())
                .with_source("config"),
        )),
    }
}
