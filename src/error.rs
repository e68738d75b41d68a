use thiserror::Error;

/// Structured error context for locating the offending part of a query or configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path inside the query description or configuration (e.g. "relations[0].constraints.filters[1].column")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g. the rejected value)
    pub details: Option<String>,
    /// Source of the error (e.g. "key_deriver", "config")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the caching layer.
///
/// Failures of the wrapped query or write are never converted into this type:
/// they stay in the caller's own error type and pass through unchanged.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Cache store '{store}' unavailable: {message}")]
    StoreUnavailable { store: String, message: String },

    #[error("Malformed query description: {message}{}", format_context(.context))]
    MalformedQuery {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a malformed-query error pointing at a field of the description.
    pub fn malformed(msg: impl Into<String>, field_path: impl Into<String>) -> Self {
        Error::MalformedQuery {
            message: msg.into(),
            context: ErrorContext::new()
                .with_field_path(field_path)
                .with_source("key_deriver"),
        }
    }

    /// Create a configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn store_unavailable(store: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::StoreUnavailable {
            store: store.into(),
            message: msg.into(),
        }
    }

    /// Returns true if this error is a store outage that the mediator fails open on.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Error::StoreUnavailable { .. })
    }

    /// Get the error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::MalformedQuery { context, .. } | Error::Configuration { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }
}
