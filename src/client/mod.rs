pub mod providers;
pub mod rate_limiter;

pub use providers::{ProviderError, ProviderResult, SearchContext, SearchQuery, SearchType, SourceProvider};
pub use rate_limiter::RateLimiter;

use crate::Result;
use std::time::Duration;

/// HTTP client configuration shared by every source provider.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_redirects: u32,
    pub user_agent: String,
    pub proxy: Option<String>,
    /// Tolerate self-signed TLS chains encountered behind institutional proxies (§6.1).
    pub danger_accept_invalid_certs: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_redirects: 10,
            user_agent: "citation-discovery-core/0.1 (+mailto:research@example.org)".to_string(),
            proxy: None,
            danger_accept_invalid_certs: false,
        }
    }
}

impl HttpClientConfig {
    pub fn build_client(&self) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(self.max_redirects as usize))
            .user_agent(self.user_agent.clone())
            .danger_accept_invalid_certs(self.danger_accept_invalid_certs);
        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        builder.build()
    }
}

/// DOI (Digital Object Identifier) wrapper for type safety.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Doi(String);

impl Doi {
    pub fn new(doi: &str) -> Result<Self> {
        let cleaned = doi
            .trim()
            .trim_start_matches("doi:")
            .trim_start_matches("https://doi.org/")
            .trim_start_matches("http://doi.org/");

        if cleaned.is_empty() {
            return Err(crate::Error::InvalidInput {
                field: "doi".to_string(),
                reason: "DOI cannot be empty".to_string(),
            });
        }
        if !cleaned.contains('/') {
            return Err(crate::Error::InvalidInput {
                field: "doi".to_string(),
                reason: "DOI must contain a '/' character".to_string(),
            });
        }
        Ok(Self(cleaned.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn url_encoded(&self) -> String {
        urlencoding::encode(&self.0).to_string()
    }
}

impl std::fmt::Display for Doi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Doi {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doi_strips_known_prefixes() {
        assert_eq!(Doi::new("https://doi.org/10.1/x").unwrap().as_str(), "10.1/x");
        assert_eq!(Doi::new("doi:10.1/x").unwrap().as_str(), "10.1/x");
    }

    #[test]
    fn doi_requires_slash() {
        assert!(Doi::new("notadoi").is_err());
    }
}
