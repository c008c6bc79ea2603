//! The uniform adapter interface every source client (C1) implements.

use crate::model::{Publication, SourceUrl};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// A search query handed to a provider's `search`.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub search_type: SearchType,
    pub max_results: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchType {
    Keywords,
    Title,
    Accession,
    Doi,
}

/// Shared request context: deadline and credentials are threaded through here rather
/// than through global state, per §5's "no component may share mutable state" rule.
#[derive(Debug, Clone)]
pub struct SearchContext {
    pub deadline: Duration,
}

impl Default for SearchContext {
    fn default() -> Self {
        Self { deadline: Duration::from_secs(10) }
    }
}

/// Result of a `search` or `get_citing` call.
#[derive(Debug, Clone)]
pub struct ProviderResult {
    pub publications: Vec<Publication>,
    pub source: String,
    pub search_time: Duration,
}

/// Errors a provider may raise, translated at the boundary per §7's abstract taxonomy.
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited")]
    RateLimit { retry_after: Option<Duration> },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("api error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("timeout")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Classify an HTTP status the way §4.2 expects: 429 is rate-limited, 404 is
    /// not-found, other 4xx are permanent, 5xx are transient.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            429 => ProviderError::RateLimit { retry_after: None },
            404 => ProviderError::NotFound(message.into()),
            400..=499 => ProviderError::ApiError { status, message: message.into() },
            _ => ProviderError::ApiError { status, message: message.into() },
        }
    }
}

/// Uniform adapter over an external publication/full-text API (C1). Each client
/// exposes at most three operations, all optional beyond `name`/`priority`/`base_delay`.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Search for publications, e.g. PubMed's accession-mention search (Strategy B).
    async fn search(
        &self,
        _query: &SearchQuery,
        _context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        Err(ProviderError::Other(format!("{} does not support search", self.name())))
    }

    /// Publications that cite the given work, keyed however this provider indexes
    /// citations (DOI, PMID, or PMC id — see §4.1).
    async fn get_citing(
        &self,
        _id: &str,
        _max_results: u32,
        _context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        Err(ProviderError::Other(format!("{} does not support get_citing", self.name())))
    }

    /// Candidate full-text URLs for one publication.
    async fn get_fulltext_urls(
        &self,
        _publication: &Publication,
        _context: &SearchContext,
    ) -> Result<Vec<SourceUrl>, ProviderError> {
        Ok(Vec::new())
    }

    /// Minimum interval between consecutive requests to this source (§4.1's
    /// sleep-to-interval rate limit).
    fn base_delay(&self) -> Duration {
        Duration::from_millis(1000)
    }

    /// Fixed priority used by the URL collector's sort (§4.8); lower is preferred.
    fn priority(&self) -> u32 {
        50
    }
}
