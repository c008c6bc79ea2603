use super::traits::{ProviderError, ProviderResult, SearchContext, SearchQuery, SourceProvider};
use crate::client::RateLimiter;
use crate::model::Publication;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct EsearchResponse {
    esearchresult: EsearchResult,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

/// PubMed E-utilities client (`esearch` for Strategy B's accession-mention search,
/// `efetch` for full records). Requires an email per NCBI's usage policy; an
/// optional API key raises the rate limit from 3 req/s to 10 req/s.
pub struct PubMedProvider {
    client: Client,
    base_url: String,
    email: String,
    api_key: Option<String>,
    rate_limiter: Mutex<RateLimiter>,
}

impl PubMedProvider {
    pub fn new(email: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_api_key(email, None)
    }

    pub fn with_api_key(email: impl Into<String>, api_key: Option<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("citation-discovery-core/0.1")
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to create HTTP client: {e}")))?;

        // NCBI's own published limits: 10 req/s with an API key, 3 req/s without.
        let requests_per_second = if api_key.is_some() { 10 } else { 3 };

        Ok(Self {
            client,
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            email: email.into(),
            api_key,
            rate_limiter: Mutex::new(RateLimiter::new(requests_per_second)),
        })
    }

    fn common_params(&self) -> Vec<(&str, String)> {
        let mut params = vec![("email", self.email.clone())];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    async fn esearch(&self, term: &str, max_results: u32, context: &SearchContext) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let mut params = self.common_params();
        params.push(("db", "pubmed".to_string()));
        params.push(("term", term.to_string()));
        params.push(("retmode", "json".to_string()));
        params.push(("retmax", max_results.min(10_000).to_string()));

        self.rate_limiter.lock().await.acquire().await;
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

        let body: EsearchResponse = response.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(body.esearchresult.idlist)
    }

    async fn efetch(&self, pmids: &[String], context: &SearchContext) -> Result<Vec<Publication>, ProviderError> {
        if pmids.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/efetch.fcgi", self.base_url);
        let mut params = self.common_params();
        params.push(("db", "pubmed".to_string()));
        params.push(("id", pmids.join(",")));
        params.push(("retmode", "xml".to_string()));

        self.rate_limiter.lock().await.acquire().await;
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

        let text = response.text().await.map_err(|e| ProviderError::Network(e.to_string()))?;
        Self::parse_efetch(&text)
    }

    fn parse_efetch(xml: &str) -> Result<Vec<Publication>, ProviderError> {
        use roxmltree::Document;

        let doc = Document::parse(xml).map_err(|e| ProviderError::Parse(format!("failed to parse XML: {e}")))?;
        let mut publications = Vec::new();

        for article in doc.descendants().filter(|n| n.has_tag_name("PubmedArticle")) {
            let mut publication = Publication::new();

            if let Some(pmid) = article.descendants().find(|n| n.has_tag_name("PMID")).and_then(|n| n.text()) {
                publication.pmid = Some(pmid.to_string());
            }
            if let Some(title) = article.descendants().find(|n| n.has_tag_name("ArticleTitle")) {
                publication.title = title.text().map(|t| t.trim().to_string());
            }
            let abstract_parts: Vec<String> = article
                .descendants()
                .filter(|n| n.has_tag_name("AbstractText"))
                .filter_map(|n| n.text())
                .map(str::to_string)
                .collect();
            if !abstract_parts.is_empty() {
                publication.abstract_text = Some(abstract_parts.join(" "));
            }

            for author in article.descendants().filter(|n| n.has_tag_name("Author")) {
                let last = author.children().find(|n| n.has_tag_name("LastName")).and_then(|n| n.text());
                let fore = author.children().find(|n| n.has_tag_name("ForeName")).and_then(|n| n.text());
                if let Some(last) = last {
                    let name = match fore {
                        Some(fore) => format!("{fore} {last}"),
                        None => last.to_string(),
                    };
                    publication.authors.push(name);
                }
            }

            if let Some(journal) = article.descendants().find(|n| n.has_tag_name("Title")) {
                publication.journal = journal.text().map(str::to_string);
            }

            if let Some(pub_date) = article.descendants().find(|n| n.has_tag_name("PubDate")) {
                let year = pub_date.children().find(|n| n.has_tag_name("Year")).and_then(|n| n.text());
                if let Some(year) = year.and_then(|y| y.parse::<i32>().ok()) {
                    publication.publication_date = NaiveDate::from_ymd_opt(year, 1, 1);
                }
            }

            for article_id in article.descendants().filter(|n| n.has_tag_name("ArticleId")) {
                let id_type = article_id.attribute("IdType");
                if let Some(value) = article_id.text() {
                    match id_type {
                        Some("doi") => publication.doi = Some(value.to_string()),
                        Some("pmc") => publication.pmcid = Some(value.to_string()),
                        _ => {}
                    }
                }
            }

            if publication.pmid.is_some() {
                publication.landing_url =
                    publication.pmid.as_ref().map(|p| format!("https://pubmed.ncbi.nlm.nih.gov/{p}"));
                publication.source_provenance.push("pubmed".to_string());
                publications.push(publication);
            }
        }

        debug!("parsed {} publications from PubMed efetch response", publications.len());
        Ok(publications)
    }
}

#[async_trait]
impl SourceProvider for PubMedProvider {
    fn name(&self) -> &str {
        "pubmed"
    }

    fn priority(&self) -> u32 {
        20
    }

    fn base_delay(&self) -> Duration {
        if self.api_key.is_some() { Duration::from_millis(100) } else { Duration::from_millis(334) }
    }

    async fn search(
        &self,
        query: &SearchQuery,
        context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        let start_time = Instant::now();
        info!("searching PubMed for: {}", query.query);

        let pmids = self.esearch(&query.query, query.max_results, context).await?;
        let publications = self.efetch(&pmids, context).await?;
        let search_time = start_time.elapsed();
        debug!("PubMed search returned {} publications", publications.len());

        Ok(ProviderResult { publications, source: "pubmed".to_string(), search_time })
    }
}
