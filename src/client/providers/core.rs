use super::traits::{ProviderError, ProviderResult, SearchContext, SearchQuery, SourceProvider};
use crate::model::{Publication, SourceUrl};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct CoreSearchResponse {
    #[serde(default)]
    results: Vec<CoreWork>,
}

#[derive(Debug, Deserialize)]
struct CoreWork {
    id: Option<serde_json::Value>,
    title: Option<String>,
    #[serde(default)]
    authors: Vec<CoreAuthor>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    doi: Option<String>,
    #[serde(rename = "downloadUrl")]
    download_url: Option<String>,
    publisher: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CoreAuthor {
    Name(String),
    Object { name: Option<String> },
}

/// CORE v3 `/works/search` client. CORE requires an API key (§6.3
/// `URLCollectorConfig.core_api_key`) and specializes in open-access full-text PDFs
/// aggregated from repositories Unpaywall and Europe PMC may not index.
pub struct CoreProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CoreProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("citation-discovery-core/0.1")
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url: "https://api.core.ac.uk/v3".to_string(), api_key: api_key.into() })
    }

    fn clean_doi(doi: &str) -> String {
        doi.trim_start_matches("https://doi.org/").trim_start_matches("http://doi.org/").to_string()
    }

    fn convert(work: CoreWork) -> Option<Publication> {
        let title = work.title.filter(|t| !t.trim().is_empty())?;
        let mut publication = Publication::new();
        publication.title = Some(title);
        publication.doi = work.doi;
        publication.abstract_text = work.abstract_text;
        publication.authors = work
            .authors
            .into_iter()
            .filter_map(|a| match a {
                CoreAuthor::Name(name) => Some(name),
                CoreAuthor::Object { name } => name,
            })
            .collect();
        publication.journal = work.publisher;
        publication.pdf_url = work.download_url;
        if let Some(id) = work.id {
            publication.core_id = Some(id.to_string().trim_matches('"').to_string());
        }
        publication.source_provenance.push("core".to_string());
        Some(publication)
    }

    async fn run_search(&self, q: &str, limit: u32, context: &SearchContext) -> Result<Vec<Publication>, ProviderError> {
        let url = format!("{}/search/works", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", q), ("limit", &limit.min(100).to_string()), ("apiKey", &self.api_key)])
            .timeout(context.deadline)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { ProviderError::Timeout } else { ProviderError::Network(e.to_string()) })?;

        if response.status().as_u16() == 401 {
            return Err(ProviderError::Auth("CORE API key invalid or expired".to_string()));
        }
        if !response.status().is_success() {
            return Err(ProviderError::from_status(response.status().as_u16(), response.text().await.unwrap_or_default()));
        }

        let body: CoreSearchResponse = response.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(body.results.into_iter().filter_map(Self::convert).collect())
    }
}

#[async_trait]
impl SourceProvider for CoreProvider {
    fn name(&self) -> &str {
        "core"
    }

    fn priority(&self) -> u32 {
        30
    }

    fn base_delay(&self) -> Duration {
        Duration::from_millis(100)
    }

    async fn search(
        &self,
        query: &SearchQuery,
        context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        let start_time = Instant::now();
        info!("searching CORE for: {}", query.query);

        let publications = self.run_search(&query.query, query.max_results, context).await?;
        let search_time = start_time.elapsed();
        debug!("CORE search returned {} publications", publications.len());

        Ok(ProviderResult { publications, source: "core".to_string(), search_time })
    }

    async fn get_fulltext_urls(
        &self,
        publication: &Publication,
        context: &SearchContext,
    ) -> Result<Vec<SourceUrl>, ProviderError> {
        let Some(doi) = &publication.doi else {
            return Ok(Vec::new());
        };
        let q = format!("doi:\"{}\"", Self::clean_doi(doi));
        let results = self.run_search(&q, 1, context).await?;
        Ok(results
            .into_iter()
            .filter_map(|p| p.pdf_url)
            .map(|url| SourceUrl::new(url, "core", self.priority()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_constructs() {
        assert!(CoreProvider::new("test-key").is_ok());
    }

    #[test]
    fn doi_cleaning() {
        assert_eq!(CoreProvider::clean_doi("https://doi.org/10.1234/x"), "10.1234/x");
    }

    #[test]
    fn convert_requires_title() {
        let work = CoreWork {
            id: None,
            title: None,
            authors: Vec::new(),
            abstract_text: None,
            doi: None,
            download_url: None,
            publisher: None,
        };
        assert!(CoreProvider::convert(work).is_none());
    }

    #[test]
    fn provider_interface() {
        let provider = CoreProvider::new("test-key").unwrap();
        assert_eq!(provider.name(), "core");
    }
}
