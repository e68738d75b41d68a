use crate::config::CachingConfig;
use crate::query::QueryDescription;

/// Decides whether a read bypasses the cache entirely.
#[derive(Debug, Clone, Copy)]
pub struct DisableSwitch<'a> {
    config: &'a CachingConfig,
}

impl<'a> DisableSwitch<'a> {
    pub fn new(config: &'a CachingConfig) -> Self {
        Self { config }
    }

    pub fn is_globally_disabled(&self) -> bool {
        self.config.disabled
    }

    /// Global flag or the query's own `disable_cache()`.
    pub fn is_disabled(&self, query: &QueryDescription) -> bool {
        self.config.disabled || query.cache_disabled
    }
}
