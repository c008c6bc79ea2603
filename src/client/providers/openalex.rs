use super::traits::{ProviderError, ProviderResult, SearchContext, SearchQuery, SourceProvider};
use crate::model::Publication;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct OpenAlexListResponse {
    results: Vec<OpenAlexWork>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexWork {
    id: Option<String>,
    doi: Option<String>,
    title: Option<String>,
    #[serde(default)]
    authorships: Vec<OpenAlexAuthorship>,
    publication_date: Option<String>,
    cited_by_count: Option<u64>,
    primary_location: Option<OpenAlexLocation>,
    ids: Option<OpenAlexIds>,
    abstract_inverted_index: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexAuthorship {
    author: Option<OpenAlexAuthor>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexAuthor {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexLocation {
    pdf_url: Option<String>,
    landing_page_url: Option<String>,
    source: Option<OpenAlexSource>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexSource {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexIds {
    pmid: Option<String>,
    pmcid: Option<String>,
}

/// OpenAlex `/works` and `/works/{id}/cited_by` client. Abstracts arrive as an
/// inverted index; this client reconstructs plain text from it (§6.1).
pub struct OpenAlexProvider {
    client: Client,
    base_url: String,
    mailto: Option<String>,
}

impl OpenAlexProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_mailto(None)
    }

    pub fn with_mailto(mailto: Option<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("citation-discovery-core/0.1")
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url: "https://api.openalex.org".to_string(), mailto })
    }

    fn reconstruct_abstract(index: &serde_json::Value) -> Option<String> {
        let map = index.as_object()?;
        let mut positions: Vec<(usize, &str)> = Vec::new();
        for (word, idxs) in map {
            if let Some(arr) = idxs.as_array() {
                for idx in arr {
                    if let Some(i) = idx.as_u64() {
                        positions.push((i as usize, word.as_str()));
                    }
                }
            }
        }
        positions.sort_by_key(|(i, _)| *i);
        if positions.is_empty() {
            return None;
        }
        Some(positions.into_iter().map(|(_, w)| w).collect::<Vec<_>>().join(" "))
    }

    fn convert(work: OpenAlexWork) -> Option<Publication> {
        let title = work.title.filter(|t| !t.trim().is_empty())?;
        let mut publication = Publication::new();
        publication.title = Some(title);
        publication.doi = work.doi.map(|d| d.trim_start_matches("https://doi.org/").to_string());
        publication.openalex_id = work.id;
        publication.authors = work
            .authorships
            .into_iter()
            .filter_map(|a| a.author.and_then(|au| au.display_name))
            .collect();
        publication.publication_date =
            work.publication_date.as_deref().and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        publication.citations = work.cited_by_count.unwrap_or(0);
        publication.abstract_text = work.abstract_inverted_index.as_ref().and_then(Self::reconstruct_abstract);

        if let Some(ids) = work.ids {
            publication.pmid = ids.pmid.and_then(|p| p.rsplit('/').next().map(str::to_string));
            publication.pmcid = ids.pmcid.and_then(|p| p.rsplit('/').next().map(str::to_string));
        }

        if let Some(location) = work.primary_location {
            publication.pdf_url = location.pdf_url;
            publication.landing_url = location.landing_page_url;
            publication.journal = location.source.and_then(|s| s.display_name);
        }

        publication.source_provenance.push("openalex".to_string());
        Some(publication)
    }

    fn apply_mailto(&self, mut pairs: Vec<(&str, String)>) -> Vec<(&str, String)> {
        if let Some(mailto) = &self.mailto {
            pairs.push(("mailto", mailto.clone()));
        }
        pairs
    }
}

impl Default for OpenAlexProvider {
    fn default() -> Self {
        Self::new().expect("failed to create OpenAlexProvider")
    }
}

#[async_trait]
impl SourceProvider for OpenAlexProvider {
    fn name(&self) -> &str {
        "openalex"
    }

    fn priority(&self) -> u32 {
        38
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
        info!("searching OpenAlex for: {}", query.query);

        let url = format!("{}/works", self.base_url);
        let params = self.apply_mailto(vec![
            ("search", query.query.clone()),
            ("per-page", query.max_results.min(200).to_string()),
        ]);

        let response = self
            .client
            .get(&url)
            .query(&params)
            .timeout(context.deadline)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { ProviderError::Timeout } else { ProviderError::Network(e.to_string()) })?;

        if !response.status().is_success() {
            return Err(ProviderError::from_status(response.status().as_u16(), response.text().await.unwrap_or_default()));
        }

        let body: OpenAlexListResponse = response.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        let publications: Vec<Publication> = body.results.into_iter().filter_map(Self::convert).collect();
        let search_time = start_time.elapsed();
        debug!("OpenAlex search returned {} publications", publications.len());

        Ok(ProviderResult { publications, source: "openalex".to_string(), search_time })
    }

    async fn get_citing(
        &self,
        id: &str,
        max_results: u32,
        context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        let start_time = Instant::now();
        info!("fetching OpenAlex citations for: {id}");

        let openalex_id = if id.starts_with("10.") { format!("https://doi.org/{id}") } else { id.to_string() };
        let url = format!("{}/works", self.base_url);
        let params = self.apply_mailto(vec![
            ("filter", format!("cites:{openalex_id}")),
            ("per-page", max_results.min(200).to_string()),
        ]);

        let response = self
            .client
            .get(&url)
            .query(&params)
            .timeout(context.deadline)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { ProviderError::Timeout } else { ProviderError::Network(e.to_string()) })?;

        if !response.status().is_success() {
            return Err(ProviderError::from_status(response.status().as_u16(), response.text().await.unwrap_or_default()));
        }

        let body: OpenAlexListResponse = response.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        let publications: Vec<Publication> = body.results.into_iter().filter_map(Self::convert).collect();
        let search_time = start_time.elapsed();

        Ok(ProviderResult { publications, source: "openalex".to_string(), search_time })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_constructs() {
        assert!(OpenAlexProvider::new().is_ok());
    }

    #[test]
    fn convert_requires_title() {
        let work = OpenAlexWork {
            id: None,
            doi: None,
            title: None,
            authorships: Vec::new(),
            publication_date: None,
            cited_by_count: None,
            primary_location: None,
            ids: None,
            abstract_inverted_index: None,
        };
        assert!(OpenAlexProvider::convert(work).is_none());
    }

    #[test]
    fn abstract_reconstruction_orders_by_position() {
        let index = serde_json::json!({ "brown": [2], "fox": [3], "quick": [1], "The": [0] });
        let text = OpenAlexProvider::reconstruct_abstract(&index).unwrap();
        assert_eq!(text, "The quick brown fox");
    }

    #[test]
    fn provider_interface() {
        let provider = OpenAlexProvider::new().unwrap();
        assert_eq!(provider.name(), "openalex");
    }
}
