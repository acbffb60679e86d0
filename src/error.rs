use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the store, renderers and external service clients.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} responded with {status}: {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("prompt aborted: {0}")]
    Prompt(#[from] inquire::InquireError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error("{0} not found")]
    NotFound(String),

    #[error("free plan limit reached ({used}/{limit} quotes), upgrade to Pro to create more")]
    PlanLimit { used: usize, limit: usize },

    #[error("webhook rejected: {0}")]
    Webhook(String),

    #[error("{0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, QuoteError>;
