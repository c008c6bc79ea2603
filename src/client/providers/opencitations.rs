use super::traits::{ProviderError, ProviderResult, SearchContext, SearchQuery, SourceProvider};
use crate::model::Publication;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct OcCitation {
    citing: String,
    creation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OcMetadata {
    title: Option<String>,
    author: Option<String>,
    year: Option<String>,
    source_title: Option<String>,
    #[serde(rename = "citation_count")]
    citation_count: Option<String>,
    oa_link: Option<String>,
}

/// OpenCitations COCI client (`/citations/{doi}`), folded into Strategy A alongside
/// Europe PMC: both answer "who cites this DOI" without a keyword search endpoint.
pub struct OpenCitationsProvider {
    client: Client,
    base_url: String,
}

impl OpenCitationsProvider {
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("citation-discovery-core/0.1")
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url: "https://opencitations.net/index/coci/api/v1".to_string() })
    }

    fn clean_doi(doi: &str) -> String {
        doi.trim_start_matches("https://doi.org/").trim_start_matches("http://dx.doi.org/").to_string()
    }

    async fn fetch_metadata(&self, doi: &str, context: &SearchContext) -> Result<Option<OcMetadata>, ProviderError> {
        let url = format!("{}/metadata/{}", self.base_url, doi);
        let response = self
            .client
            .get(&url)
            .timeout(context.deadline)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { ProviderError::Timeout } else { ProviderError::Network(e.to_string()) })?;

        if !response.status().is_success() {
            return Err(ProviderError::from_status(response.status().as_u16(), response.text().await.unwrap_or_default()));
        }

        let mut entries: Vec<OcMetadata> = response.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(entries.pop())
    }

    fn convert(citing_doi: &str, creation: Option<String>, metadata: Option<OcMetadata>) -> Option<Publication> {
        let mut publication = Publication::new();
        publication.doi = Some(citing_doi.to_string());
        publication.source_provenance.push("opencitations".to_string());

        let Some(metadata) = metadata else {
            publication.title = Some(format!("Publication {citing_doi}"));
            publication.landing_url = Some(format!("https://doi.org/{citing_doi}"));
            return Some(publication);
        };

        let title = metadata.title.filter(|t| !t.trim().is_empty())?;
        publication.title = Some(title);
        publication.journal = metadata.source_title;
        publication.authors = metadata
            .author
            .unwrap_or_default()
            .split(';')
            .filter_map(|a| {
                let a = a.trim();
                if a.is_empty() {
                    return None;
                }
                let parts: Vec<&str> = a.split(',').map(str::trim).collect();
                Some(if parts.len() == 2 { format!("{} {}", parts[1], parts[0]) } else { a.to_string() })
            })
            .collect();
        publication.publication_date = metadata
            .year
            .as_deref()
            .and_then(|y| y.parse::<i32>().ok())
            .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1));
        publication.citations = metadata.citation_count.and_then(|c| c.parse().ok()).unwrap_or(0);
        publication.landing_url = Some(metadata.oa_link.unwrap_or_else(|| format!("https://doi.org/{citing_doi}")));
        if let Some(created) = creation {
            publication.metadata.insert("citation_created".to_string(), created);
        }
        Some(publication)
    }
}

impl Default for OpenCitationsProvider {
    fn default() -> Self {
        Self::new().expect("failed to create OpenCitationsProvider")
    }
}

#[async_trait]
impl SourceProvider for OpenCitationsProvider {
    fn name(&self) -> &str {
        "opencitations"
    }

    fn priority(&self) -> u32 {
        45
    }

    fn base_delay(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn get_citing(
        &self,
        id: &str,
        max_results: u32,
        context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        let start_time = Instant::now();
        if !id.starts_with("10.") {
            return Err(ProviderError::InvalidQuery("opencitations requires a DOI".to_string()));
        }
        let doi = Self::clean_doi(id);
        info!("finding papers citing DOI {doi} via OpenCitations");

        let url = format!("{}/citations/{}", self.base_url, doi);
        let response = self
            .client
            .get(&url)
            .timeout(context.deadline)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { ProviderError::Timeout } else { ProviderError::Network(e.to_string()) })?;

        if !response.status().is_success() {
            return Err(ProviderError::from_status(response.status().as_u16(), response.text().await.unwrap_or_default()));
        }

        let citations: Vec<OcCitation> = response.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        debug!("OpenCitations found {} citing DOIs for {doi}", citations.len());

        let mut publications = Vec::new();
        for citation in citations.into_iter().take(max_results as usize) {
            let metadata = self.fetch_metadata(&citation.citing, context).await.ok().flatten();
            if let Some(pub_) = Self::convert(&citation.citing, citation.creation, metadata) {
                publications.push(pub_);
            }
        }

        let search_time = start_time.elapsed();
        Ok(ProviderResult { publications, source: "opencitations".to_string(), search_time })
    }

    async fn search(
        &self,
        _query: &SearchQuery,
        _context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        Err(ProviderError::Other("opencitations has no keyword search endpoint".to_string()))
    }
}
