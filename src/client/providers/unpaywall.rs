use super::traits::{ProviderError, ProviderResult, SearchContext, SearchQuery, SourceProvider};
use crate::model::{Publication, SourceUrl};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct UnpaywallResponse {
    doi: Option<String>,
    title: Option<String>,
    is_oa: bool,
    best_oa_location: Option<UnpaywallLocation>,
    #[serde(default)]
    oa_locations: Vec<UnpaywallLocation>,
}

#[derive(Debug, Deserialize, Clone)]
struct UnpaywallLocation {
    url: Option<String>,
    url_for_pdf: Option<String>,
    host_type: Option<String>,
}

/// Unpaywall `/v2/{doi}` client. Requires `email` per Unpaywall's polite-use policy;
/// no keyword search or citation-graph endpoint, just one DOI → OA location lookup.
pub struct UnpaywallProvider {
    client: Client,
    base_url: String,
    email: String,
}

impl UnpaywallProvider {
    pub fn new(email: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("citation-discovery-core/0.1")
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url: "https://api.unpaywall.org/v2".to_string(), email: email.into() })
    }

    fn clean_doi(doi: &str) -> String {
        doi.trim_start_matches("https://doi.org/").trim_start_matches("http://dx.doi.org/").to_string()
    }

    async fn lookup(&self, doi: &str, context: &SearchContext) -> Result<Option<UnpaywallResponse>, ProviderError> {
        let doi = Self::clean_doi(doi);
        let url = format!("{}/{}", self.base_url, doi);

        let response = self
            .client
            .get(&url)
            .query(&[("email", self.email.as_str())])
            .timeout(context.deadline)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { ProviderError::Timeout } else { ProviderError::Network(e.to_string()) })?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ProviderError::from_status(response.status().as_u16(), response.text().await.unwrap_or_default()));
        }

        let body: UnpaywallResponse = response.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        debug!("Unpaywall lookup for {doi}: is_oa={}", body.is_oa);
        Ok(Some(body))
    }

    fn collect_urls(&self, response: UnpaywallResponse) -> Vec<SourceUrl> {
        if !response.is_oa {
            return Vec::new();
        }
        let mut urls = Vec::new();
        let mut seen = std::collections::HashSet::new();

        let locations = response.best_oa_location.into_iter().chain(response.oa_locations);
        for location in locations {
            let candidate = location.url_for_pdf.or(location.url);
            if let Some(url) = candidate {
                if seen.insert(url.clone()) {
                    let mut source_url = SourceUrl::new(url, "unpaywall", self.priority());
                    if let Some(host_type) = location.host_type {
                        source_url.metadata.insert("host_type".to_string(), host_type);
                    }
                    urls.push(source_url);
                }
            }
        }
        urls
    }
}

#[async_trait]
impl SourceProvider for UnpaywallProvider {
    fn name(&self) -> &str {
        "unpaywall"
    }

    fn priority(&self) -> u32 {
        25
    }

    fn base_delay(&self) -> Duration {
        Duration::from_millis(100)
    }

    async fn search(
        &self,
        _query: &SearchQuery,
        _context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        Err(ProviderError::Other("unpaywall has no search endpoint; use get_fulltext_urls".to_string()))
    }

    async fn get_fulltext_urls(
        &self,
        publication: &Publication,
        context: &SearchContext,
    ) -> Result<Vec<SourceUrl>, ProviderError> {
        let Some(doi) = &publication.doi else {
            return Ok(Vec::new());
        };
        info!("looking up OA location for DOI {doi} via Unpaywall");
        let start_time = Instant::now();
        let result = match self.lookup(doi, context).await? {
            Some(response) => self.collect_urls(response),
            None => Vec::new(),
        };
        debug!("Unpaywall returned {} urls in {:?}", result.len(), start_time.elapsed());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_constructs() {
        assert!(UnpaywallProvider::new("research@example.org").is_ok());
    }

    #[test]
    fn doi_cleaning() {
        assert_eq!(UnpaywallProvider::clean_doi("https://doi.org/10.1234/x"), "10.1234/x");
    }

    #[test]
    fn closed_access_yields_no_urls() {
        let provider = UnpaywallProvider::new("research@example.org").unwrap();
        let response = UnpaywallResponse {
            doi: Some("10.1234/x".to_string()),
            title: None,
            is_oa: false,
            best_oa_location: None,
            oa_locations: Vec::new(),
        };
        assert!(provider.collect_urls(response).is_empty());
    }

    #[test]
    fn open_access_prefers_pdf_url() {
        let provider = UnpaywallProvider::new("research@example.org").unwrap();
        let response = UnpaywallResponse {
            doi: Some("10.1234/x".to_string()),
            title: None,
            is_oa: true,
            best_oa_location: Some(UnpaywallLocation {
                url: Some("https://host/landing".to_string()),
                url_for_pdf: Some("https://host/paper.pdf".to_string()),
                host_type: Some("repository".to_string()),
            }),
            oa_locations: Vec::new(),
        };
        let urls = provider.collect_urls(response);
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].url, "https://host/paper.pdf");
    }
}
