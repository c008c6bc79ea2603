use super::traits::{ProviderError, ProviderResult, SearchContext, SearchQuery, SourceProvider};
use crate::model::Publication;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct CrossrefSearchResponse {
    message: CrossrefSearchMessage,
}

#[derive(Debug, Deserialize)]
struct CrossrefSearchMessage {
    #[serde(default)]
    items: Vec<CrossrefWork>,
}

#[derive(Debug, Deserialize)]
struct CrossrefWorkResponse {
    message: CrossrefWork,
}

#[derive(Debug, Deserialize)]
struct CrossrefWork {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<CrossrefAuthor>,
    published: Option<CrossrefDateParts>,
    created: Option<CrossrefDateParts>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    #[serde(rename = "is-referenced-by-count")]
    is_referenced_by_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CrossrefAuthor {
    given: Option<String>,
    family: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrossrefDateParts {
    #[serde(rename = "date-parts")]
    date_parts: Vec<Vec<i32>>,
}

/// Crossref `/works` client. Provides metadata and keyword search; Crossref has no
/// "papers citing this DOI" endpoint, so citation fan-out relies on OpenAlex/Semantic
/// Scholar/Europe PMC/OpenCitations instead (§6.1).
pub struct CrossrefProvider {
    client: Client,
    base_url: String,
    mailto: Option<String>,
}

impl CrossrefProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_mailto(None)
    }

    pub fn with_mailto(mailto: Option<String>) -> Result<Self, ProviderError> {
        let user_agent = match &mailto {
            Some(email) => format!("citation-discovery-core/0.1 (mailto:{email})"),
            None => "citation-discovery-core/0.1".to_string(),
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url: "https://api.crossref.org".to_string(), mailto })
    }

    fn clean_doi(doi: &str) -> String {
        doi.trim_start_matches("https://doi.org/").trim_start_matches("http://dx.doi.org/").to_string()
    }

    fn date_from_parts(date: Option<CrossrefDateParts>) -> Option<NaiveDate> {
        let parts = date?.date_parts.into_iter().next()?;
        let year = *parts.first()?;
        let month = parts.get(1).copied().unwrap_or(1).max(1);
        let day = parts.get(2).copied().unwrap_or(1).max(1);
        NaiveDate::from_ymd_opt(year, month as u32, day as u32)
            .or_else(|| NaiveDate::from_ymd_opt(year, 1, 1))
    }

    fn convert(work: CrossrefWork) -> Option<Publication> {
        let title = work.title.into_iter().next()?;
        let mut publication = Publication::new();
        publication.title = Some(title);
        publication.doi = work.doi;
        publication.authors = work
            .author
            .into_iter()
            .filter_map(|a| a.family.map(|family| format!("{} {family}", a.given.unwrap_or_default()).trim().to_string()))
            .collect();
        publication.publication_date =
            Self::date_from_parts(work.published).or_else(|| Self::date_from_parts(work.created));
        publication.journal = work.container_title.into_iter().next();
        publication.citations = work.is_referenced_by_count.unwrap_or(0);
        publication.landing_url = publication.doi.as_ref().map(|d| format!("https://doi.org/{d}"));
        publication.source_provenance.push("crossref".to_string());
        Some(publication)
    }

    fn apply_mailto(&self, mut pairs: Vec<(&str, String)>) -> Vec<(&str, String)> {
        if let Some(mailto) = &self.mailto {
            pairs.push(("mailto", mailto.clone()));
        }
        pairs
    }
}

impl Default for CrossrefProvider {
    fn default() -> Self {
        Self::new().expect("failed to create CrossrefProvider")
    }
}

#[async_trait]
impl SourceProvider for CrossrefProvider {
    fn name(&self) -> &str {
        "crossref"
    }

    fn priority(&self) -> u32 {
        55
    }

    fn base_delay(&self) -> Duration {
        Duration::from_millis(20)
    }

    async fn search(
        &self,
        query: &SearchQuery,
        context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        let start_time = Instant::now();
        info!("searching Crossref for: {}", query.query);

        let url = format!("{}/works", self.base_url);
        let params = self.apply_mailto(vec![
            ("query", query.query.clone()),
            ("rows", query.max_results.min(100).to_string()),
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

        let body: CrossrefSearchResponse = response.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        let publications: Vec<Publication> = body.message.items.into_iter().filter_map(Self::convert).collect();
        let search_time = start_time.elapsed();
        debug!("Crossref search returned {} publications", publications.len());

        Ok(ProviderResult { publications, source: "crossref".to_string(), search_time })
    }

    async fn get_fulltext_urls(
        &self,
        publication: &Publication,
        context: &SearchContext,
    ) -> Result<Vec<crate::model::SourceUrl>, ProviderError> {
        let Some(doi) = &publication.doi else {
            return Ok(Vec::new());
        };
        let doi = Self::clean_doi(doi);
        let url = format!("{}/works/{}", self.base_url, doi);
        let response = self
            .client
            .get(&url)
            .timeout(context.deadline)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(ProviderError::from_status(response.status().as_u16(), ""));
        }

        let body: CrossrefWorkResponse = response.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(body
            .message
            .doi
            .into_iter()
            .map(|doi| {
                crate::model::SourceUrl::new(format!("https://doi.org/{doi}"), "crossref", self.priority())
            })
            .collect())
    }
}
