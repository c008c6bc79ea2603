use super::traits::{ProviderError, ProviderResult, SearchContext, SearchQuery, SearchType, SourceProvider};
use crate::model::{Publication, SourceUrl};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct BiorxivResponse {
    messages: Vec<BiorxivMessage>,
    collection: Vec<BiorxivPaper>,
}

#[derive(Debug, Deserialize)]
struct BiorxivMessage {
    status: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct BiorxivPaper {
    doi: String,
    title: String,
    authors: String,
    date: String,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    server: String,
}

/// bioRxiv/medRxiv `api.biorxiv.org/details/{server}/{doi}` client. No text-search
/// endpoint exists, so keyword queries fall back to a recent-papers date window.
pub struct BiorxivProvider {
    client: Client,
    base_url: String,
}

impl BiorxivProvider {
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("citation-discovery-core/0.1")
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url: "https://api.biorxiv.org".to_string() })
    }

    fn build_doi_url(&self, doi: &str) -> String {
        format!("{}/details/biorxiv/{}", self.base_url, doi)
    }

    fn build_date_search_url(&self, start_date: &str, end_date: &str) -> String {
        format!("{}/details/biorxiv/{}/{}", self.base_url, start_date, end_date)
    }

    /// Extract a bioRxiv DOI from a bare DOI, a doi.org URL, or a biorxiv.org content URL.
    fn extract_biorxiv_doi(doi_or_url: &str) -> Option<String> {
        let doi_start = doi_or_url.find("10.1101/")?;
        let doi_part = &doi_or_url[doi_start..];
        if let Some(version_pos) = doi_part.find('v') {
            if version_pos > 8 {
                return Some(doi_part[..version_pos].to_string());
            }
        }
        Some(doi_part.to_string())
    }

    fn convert_paper(&self, paper: BiorxivPaper) -> Publication {
        let authors: Vec<String> = paper
            .authors
            .split(',')
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        let publication_date = NaiveDate::parse_from_str(&paper.date, "%Y-%m-%d").ok();

        let pdf_url = Some(format!(
            "https://www.biorxiv.org/content/biorxiv/early/{}/{}.full.pdf",
            paper.date.replace('-', "/"),
            paper.doi
        ));

        let mut publication = Publication::new();
        publication.doi = Some(paper.doi);
        publication.title = Some(paper.title);
        publication.authors = authors;
        publication.journal = Some(format!("{} preprint", paper.server));
        publication.publication_date = publication_date;
        publication.abstract_text = paper.abstract_text;
        publication.pdf_url = pdf_url;
        publication.source_provenance.push("biorxiv".to_string());
        publication
    }

    async fn get_paper_by_doi(&self, doi: &str) -> Result<Option<Publication>, ProviderError> {
        let url = self.build_doi_url(doi);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ProviderError::from_status(response.status().as_u16(), ""));
        }

        let text = response.text().await.map_err(|e| ProviderError::Network(e.to_string()))?;
        let parsed: BiorxivResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Parse(format!("failed to parse JSON: {e}")))?;

        for message in &parsed.messages {
            if message.status != "ok" {
                warn!("bioRxiv API message: {}", message.text);
            }
        }

        Ok(parsed.collection.into_iter().next().map(|p| self.convert_paper(p)))
    }

    async fn search_recent_papers(&self, days_back: i64, limit: u32) -> Result<Vec<Publication>, ProviderError> {
        use chrono::{Duration as ChronoDuration, Utc};

        let end_date = Utc::now();
        let start_date = end_date - ChronoDuration::days(days_back);

        let url = self.build_date_search_url(
            &start_date.format("%Y-%m-%d").to_string(),
            &end_date.format("%Y-%m-%d").to_string(),
        );
        debug!("searching bioRxiv by date range: {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::from_status(response.status().as_u16(), ""));
        }

        let text = response.text().await.map_err(|e| ProviderError::Network(e.to_string()))?;
        let parsed: BiorxivResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Parse(format!("failed to parse JSON: {e}")))?;

        Ok(parsed
            .collection
            .into_iter()
            .take(limit as usize)
            .map(|p| self.convert_paper(p))
            .collect())
    }
}

impl Default for BiorxivProvider {
    fn default() -> Self {
        Self::new().expect("failed to create BiorxivProvider")
    }
}

#[async_trait]
impl SourceProvider for BiorxivProvider {
    fn name(&self) -> &str {
        "biorxiv"
    }

    fn priority(&self) -> u32 {
        75
    }

    fn base_delay(&self) -> Duration {
        Duration::from_millis(500)
    }

    async fn search(
        &self,
        query: &SearchQuery,
        _context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        let start_time = Instant::now();
        info!("searching bioRxiv for: {}", query.query);

        let publications = match query.search_type {
            SearchType::Doi => match Self::extract_biorxiv_doi(&query.query) {
                Some(doi) => self.get_paper_by_doi(&doi).await?.into_iter().collect(),
                None => Vec::new(),
            },
            SearchType::Keywords => {
                warn!("bioRxiv has no text search; falling back to recent papers");
                self.search_recent_papers(30, query.max_results).await?
            }
            _ => Vec::new(),
        };

        let search_time = start_time.elapsed();
        info!("bioRxiv search returned {} publications in {search_time:?}", publications.len());

        Ok(ProviderResult { publications, source: "biorxiv".to_string(), search_time })
    }

    async fn get_fulltext_urls(
        &self,
        publication: &Publication,
        _context: &SearchContext,
    ) -> Result<Vec<SourceUrl>, ProviderError> {
        let Some(doi) = &publication.doi else {
            return Ok(Vec::new());
        };
        let Some(biorxiv_doi) = Self::extract_biorxiv_doi(doi) else {
            return Ok(Vec::new());
        };
        match self.get_paper_by_doi(&biorxiv_doi).await? {
            Some(p) => Ok(p
                .pdf_url
                .into_iter()
                .map(|url| SourceUrl::new(url, "biorxiv", self.priority()))
                .collect()),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_constructs() {
        assert!(BiorxivProvider::new().is_ok());
    }

    #[test]
    fn provider_interface() {
        let provider = BiorxivProvider::new().unwrap();
        assert_eq!(provider.name(), "biorxiv");
        assert_eq!(provider.priority(), 75);
    }

    #[test]
    fn doi_extraction() {
        let cases = vec![
            ("10.1101/2023.01.01.000001", Some("10.1101/2023.01.01.000001")),
            ("https://doi.org/10.1101/2023.01.01.000001", Some("10.1101/2023.01.01.000001")),
            ("https://www.biorxiv.org/content/10.1101/2023.01.01.000001v1", Some("10.1101/2023.01.01.000001")),
            ("10.1038/nature12373", None),
        ];
        for (input, expected) in cases {
            assert_eq!(BiorxivProvider::extract_biorxiv_doi(input).as_deref(), expected, "input: {input}");
        }
    }

    #[test]
    fn url_building() {
        let provider = BiorxivProvider::new().unwrap();
        let doi_url = provider.build_doi_url("10.1101/2023.01.01.000001");
        assert!(doi_url.contains("api.biorxiv.org"));
        assert!(doi_url.contains("10.1101/2023.01.01.000001"));

        let search_url = provider.build_date_search_url("2023-01-01", "2023-01-31");
        assert!(search_url.contains("2023-01-01"));
        assert!(search_url.contains("2023-01-31"));
    }
}
