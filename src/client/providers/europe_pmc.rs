use super::traits::{ProviderError, ProviderResult, SearchContext, SearchQuery, SearchType, SourceProvider};
use crate::model::Publication;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct EpmcResponse {
    #[serde(rename = "resultList")]
    result_list: EpmcResultList,
}

#[derive(Debug, Deserialize, Default)]
struct EpmcResultList {
    #[serde(default)]
    result: Vec<EpmcResult>,
}

#[derive(Debug, Deserialize)]
struct EpmcResult {
    pmid: Option<String>,
    doi: Option<String>,
    pmcid: Option<String>,
    title: Option<String>,
    #[serde(rename = "abstractText")]
    abstract_text: Option<String>,
    #[serde(rename = "authorList")]
    author_list: Option<EpmcAuthorList>,
    #[serde(rename = "pubYear")]
    pub_year: Option<String>,
    #[serde(rename = "journalTitle")]
    journal_title: Option<String>,
    #[serde(rename = "citedByCount")]
    cited_by_count: Option<u64>,
    #[serde(rename = "isOpenAccess")]
    is_open_access: Option<String>,
    #[serde(rename = "fullTextUrlList")]
    fulltext_url_list: Option<EpmcFullTextUrlList>,
}

#[derive(Debug, Deserialize, Default)]
struct EpmcAuthorList {
    #[serde(default)]
    author: Vec<EpmcAuthor>,
}

#[derive(Debug, Deserialize)]
struct EpmcAuthor {
    #[serde(rename = "fullName")]
    full_name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct EpmcFullTextUrlList {
    #[serde(rename = "fullTextUrl", default)]
    fulltext_url: Vec<EpmcFullTextUrl>,
}

#[derive(Debug, Deserialize)]
struct EpmcFullTextUrl {
    url: Option<String>,
    #[serde(rename = "availabilityCode")]
    availability_code: Option<String>,
    #[serde(rename = "documentStyle")]
    document_style: Option<String>,
    site: Option<String>,
}

/// Europe PMC REST client (`/search` with `CITES:<id>_MED`/`CITES:<id>_PMC` syntax).
pub struct EuropePmcProvider {
    client: Client,
    base_url: String,
}

impl EuropePmcProvider {
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("citation-discovery-core/0.1")
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url: "https://www.ebi.ac.uk/europepmc/webservices/rest".to_string() })
    }

    fn pick_pdf_url(result: &EpmcResult) -> Option<String> {
        let mut europepmc_pdf = None;
        let mut pmc_pdf = None;
        let mut other_oa_pdf = None;
        let mut subscription_pdf = None;

        if let Some(list) = &result.fulltext_url_list {
            for ft in &list.fulltext_url {
                let Some(url) = &ft.url else { continue };
                let is_oa = ft.availability_code.as_deref() == Some("OA");
                let is_pdf = ft.document_style.as_deref() == Some("pdf");
                if !is_pdf {
                    continue;
                }
                match ft.site.as_deref() {
                    Some("Europe_PMC") if is_oa => europepmc_pdf = Some(url.clone()),
                    Some("PubMed Central") | Some("PMC") if is_oa => pmc_pdf = Some(url.clone()),
                    _ if is_oa => other_oa_pdf = Some(url.clone()),
                    _ => subscription_pdf = Some(url.clone()),
                }
            }
        }

        europepmc_pdf.or(pmc_pdf).or(other_oa_pdf).or(subscription_pdf).or_else(|| {
            if result.is_open_access.as_deref() == Some("Y") {
                result.pmcid.as_ref().map(|id| format!("https://www.ncbi.nlm.nih.gov/pmc/articles/{id}/pdf/"))
            } else {
                None
            }
        })
    }

    fn convert(result: EpmcResult) -> Option<Publication> {
        let title = result.title.clone().filter(|t| !t.trim().is_empty())?;

        let mut publication = Publication::new();
        publication.pmid = result.pmid.clone();
        publication.doi = result.doi.clone();
        publication.pmcid = result.pmcid.clone();
        publication.title = Some(title);
        publication.abstract_text = result.abstract_text.clone();
        publication.authors = result
            .author_list
            .as_ref()
            .map(|l| l.author.iter().filter_map(|a| a.full_name.clone()).collect())
            .unwrap_or_default();
        publication.publication_date = result
            .pub_year
            .as_deref()
            .and_then(|y| y.parse::<i32>().ok())
            .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1));
        publication.journal = result.journal_title.clone();
        publication.citations = result.cited_by_count.unwrap_or(0);
        publication.landing_url = result
            .doi
            .as_ref()
            .map(|d| format!("https://doi.org/{d}"))
            .or_else(|| result.pmid.as_ref().map(|p| format!("https://pubmed.ncbi.nlm.nih.gov/{p}")))
            .or_else(|| result.pmcid.as_ref().map(|p| format!("https://www.ncbi.nlm.nih.gov/pmc/articles/{p}")));
        publication.pdf_url = Self::pick_pdf_url(&result);
        publication.source_provenance.push("europe_pmc".to_string());
        Some(publication)
    }

    fn cites_query(id: &str) -> String {
        if id.starts_with("PMC") {
            format!("CITES:{id}_PMC")
        } else if id.starts_with("10.") {
            format!("CITES:\"{id}\"")
        } else {
            format!("CITES:{id}_MED")
        }
    }

    async fn run_query(&self, query: &str, page_size: u32, context: &SearchContext) -> Result<Vec<Publication>, ProviderError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("query", query),
                ("format", "json"),
                ("resulttype", "core"),
                ("pageSize", &page_size.min(1000).to_string()),
                ("cursorMark", "*"),
            ])
            .timeout(context.deadline)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { ProviderError::Timeout } else { ProviderError::Network(e.to_string()) })?;

        if !response.status().is_success() {
            return Err(ProviderError::from_status(response.status().as_u16(), response.text().await.unwrap_or_default()));
        }

        let body: EpmcResponse = response.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        let publications: Vec<Publication> = body.result_list.result.into_iter().filter_map(Self::convert).collect();
        debug!("Europe PMC query '{query}' returned {} publications", publications.len());
        Ok(publications)
    }
}

impl Default for EuropePmcProvider {
    fn default() -> Self {
        Self::new().expect("failed to create EuropePmcProvider")
    }
}

#[async_trait]
impl SourceProvider for EuropePmcProvider {
    fn name(&self) -> &str {
        "europe_pmc"
    }

    fn priority(&self) -> u32 {
        35
    }

    fn base_delay(&self) -> Duration {
        Duration::from_millis(333)
    }

    async fn search(
        &self,
        query: &SearchQuery,
        context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        let start_time = Instant::now();
        if query.search_type == SearchType::Doi {
            warn!("europe_pmc search() does not accept raw DOI lookups; use get_citing instead");
        }
        info!("searching Europe PMC for: {}", query.query);

        let publications = self.run_query(&query.query, query.max_results, context).await?;
        let search_time = start_time.elapsed();

        Ok(ProviderResult { publications, source: "europe_pmc".to_string(), search_time })
    }

    async fn get_citing(
        &self,
        id: &str,
        max_results: u32,
        context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        let start_time = Instant::now();
        let query = Self::cites_query(id);
        info!("finding papers citing {id} via Europe PMC: {query}");

        let publications = self.run_query(&query, max_results, context).await?;
        let search_time = start_time.elapsed();

        Ok(ProviderResult { publications, source: "europe_pmc".to_string(), search_time })
    }
}
