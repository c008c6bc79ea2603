use super::traits::{ProviderError, ProviderResult, SearchContext, SearchQuery, SearchType, SourceProvider};
use crate::model::Publication;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const FIELDS: &str = "title,authors,year,publicationDate,externalIds,abstract,citationCount,url";

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
struct S2CitationsResponse {
    data: Vec<S2CitationEdge>,
}

#[derive(Debug, Deserialize)]
struct S2CitationEdge {
    #[serde(rename = "citingPaper")]
    citing_paper: S2Paper,
}

#[derive(Debug, Deserialize)]
struct S2Paper {
    title: Option<String>,
    authors: Option<Vec<S2Author>>,
    year: Option<i32>,
    #[serde(rename = "publicationDate")]
    publication_date: Option<String>,
    #[serde(rename = "externalIds")]
    external_ids: Option<S2ExternalIds>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "citationCount")]
    citation_count: Option<u64>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "PubMed")]
    pubmed: Option<String>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

/// Semantic Scholar Graph API client (`/paper/search`, `/paper/{id}/citations`).
pub struct SemanticScholarProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_api_key(None)
    }

    pub fn with_api_key(api_key: Option<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("citation-discovery-core/0.1")
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url: "https://api.semanticscholar.org/graph/v1".to_string(), api_key })
    }

    fn paper_id(id: &str) -> String {
        if id.starts_with("10.") {
            format!("DOI:{id}")
        } else if id.chars().all(|c| c.is_ascii_digit()) {
            format!("PMID:{id}")
        } else {
            id.to_string()
        }
    }

    fn convert(paper: S2Paper) -> Option<Publication> {
        let title = paper.title?;
        let mut publication = Publication::new();
        publication.title = Some(title);
        publication.authors = paper
            .authors
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.name)
            .collect();

        let external_ids = paper.external_ids.unwrap_or(S2ExternalIds { pubmed: None, doi: None });
        publication.pmid = external_ids.pubmed;
        publication.doi = external_ids.doi;

        let date_str = paper
            .publication_date
            .or_else(|| paper.year.map(|y| format!("{y}-01-01")));
        publication.publication_date =
            date_str.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok());

        publication.abstract_text = paper.abstract_text;
        publication.citations = paper.citation_count.unwrap_or(0);
        publication.landing_url = paper.url;
        publication.source_provenance.push("semantic_scholar".to_string());
        Some(publication)
    }

    fn request_builder(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.get(url);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }
        req
    }
}

impl Default for SemanticScholarProvider {
    fn default() -> Self {
        Self::new().expect("failed to create SemanticScholarProvider")
    }
}

#[async_trait]
impl SourceProvider for SemanticScholarProvider {
    fn name(&self) -> &str {
        "semantic_scholar"
    }

    fn priority(&self) -> u32 {
        40
    }

    fn base_delay(&self) -> Duration {
        Duration::from_millis(10)
    }

    async fn search(
        &self,
        query: &SearchQuery,
        context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        let start_time = Instant::now();
        info!("searching Semantic Scholar for: {}", query.query);

        let url = format!("{}/paper/search", self.base_url);
        let response = self
            .request_builder(&url)
            .query(&[
                ("query", query.query.as_str()),
                ("fields", FIELDS),
                ("limit", &query.max_results.min(100).to_string()),
            ])
            .timeout(context.deadline)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { ProviderError::Timeout } else { ProviderError::Network(e.to_string()) })?;

        if !response.status().is_success() {
            return Err(ProviderError::from_status(response.status().as_u16(), response.text().await.unwrap_or_default()));
        }

        let body: S2SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let publications: Vec<Publication> = body.data.into_iter().filter_map(Self::convert).collect();
        let search_time = start_time.elapsed();
        debug!("Semantic Scholar search returned {} publications", publications.len());

        Ok(ProviderResult { publications, source: "semantic_scholar".to_string(), search_time })
    }

    async fn get_citing(
        &self,
        id: &str,
        max_results: u32,
        context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        let start_time = Instant::now();
        let paper_id = Self::paper_id(id);
        info!("fetching Semantic Scholar citations for: {paper_id}");

        let url = format!("{}/paper/{}/citations", self.base_url, paper_id);
        let response = self
            .request_builder(&url)
            .query(&[("fields", FIELDS.to_string()), ("limit", max_results.min(1000).to_string())])
            .timeout(context.deadline)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { ProviderError::Timeout } else { ProviderError::Network(e.to_string()) })?;

        if !response.status().is_success() {
            return Err(ProviderError::from_status(response.status().as_u16(), response.text().await.unwrap_or_default()));
        }

        let body: S2CitationsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let publications: Vec<Publication> = body
            .data
            .into_iter()
            .filter_map(|edge| Self::convert(edge.citing_paper))
            .collect();
        let search_time = start_time.elapsed();

        Ok(ProviderResult { publications, source: "semantic_scholar".to_string(), search_time })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_constructs() {
        assert!(SemanticScholarProvider::new().is_ok());
    }

    #[test]
    fn paper_id_formatting() {
        assert_eq!(SemanticScholarProvider::paper_id("10.1038/nature12345"), "DOI:10.1038/nature12345");
        assert_eq!(SemanticScholarProvider::paper_id("12345678"), "PMID:12345678");
        assert_eq!(SemanticScholarProvider::paper_id("abcd1234"), "abcd1234");
    }

    #[test]
    fn convert_requires_title() {
        let paper = S2Paper {
            title: None,
            authors: None,
            year: None,
            publication_date: None,
            external_ids: None,
            abstract_text: None,
            citation_count: None,
            url: None,
        };
        assert!(SemanticScholarProvider::convert(paper).is_none());
    }

    #[test]
    fn provider_interface() {
        let provider = SemanticScholarProvider::new().unwrap();
        assert_eq!(provider.name(), "semantic_scholar");
        assert_eq!(provider.priority(), 40);
    }
}
