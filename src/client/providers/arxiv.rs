use super::traits::{ProviderError, ProviderResult, SearchContext, SearchQuery, SearchType, SourceProvider};
use crate::model::{Publication, SourceUrl};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use url::Url;

/// arXiv `export.arxiv.org/api/query` Atom feed client. Supports `search` (Strategy
/// B-adjacent keyword lookup) and `get_fulltext_urls` (arXiv PDFs are always open).
pub struct ArxivProvider {
    client: Client,
    base_url: String,
}

impl ArxivProvider {
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("citation-discovery-core/0.1")
            .build()
            .map_err(|e| ProviderError::Other(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url: "http://export.arxiv.org/api/query".to_string() })
    }

    fn build_search_url(&self, query: &SearchQuery) -> Result<String, ProviderError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::Other(format!("invalid base URL: {e}")))?;

        let search_query = match query.search_type {
            SearchType::Doi => format!("doi:{}", query.query),
            SearchType::Title => format!("ti:\"{}\"", query.query),
            SearchType::Keywords | SearchType::Accession => format!("all:\"{}\"", query.query),
        };

        url.query_pairs_mut()
            .append_pair("search_query", &search_query)
            .append_pair("start", "0")
            .append_pair("max_results", &query.max_results.to_string())
            .append_pair("sortBy", "relevance")
            .append_pair("sortOrder", "descending");

        Ok(url.to_string())
    }

    fn parse_response(&self, response_text: &str) -> Result<Vec<Publication>, ProviderError> {
        use roxmltree::Document;

        let doc = Document::parse(response_text)
            .map_err(|e| ProviderError::Parse(format!("failed to parse XML: {e}")))?;

        let mut publications = Vec::new();

        for entry in doc.descendants().filter(|n| n.has_tag_name("entry")) {
            let mut pub_ = Publication::new();
            pub_.journal = Some("arXiv".to_string());

            for child in entry.children().filter(|n| n.is_element()) {
                match child.tag_name().name() {
                    "id" => {
                        if let Some(id) = child.text() {
                            if let Some(arxiv_id) = id.rsplit('/').next() {
                                pub_.arxiv_id = Some(arxiv_id.to_string());
                            }
                        }
                    }
                    "title" => {
                        if let Some(title) = child.text() {
                            pub_.title = Some(title.trim().replace('\n', " ").replace("  ", " "));
                        }
                    }
                    "summary" => {
                        if let Some(summary) = child.text() {
                            pub_.abstract_text =
                                Some(summary.trim().replace('\n', " ").replace("  ", " "));
                        }
                    }
                    "published" => {
                        if let Some(published) = child.text() {
                            if let Ok(date) = NaiveDate::parse_from_str(
                                published.get(0..10).unwrap_or(""),
                                "%Y-%m-%d",
                            ) {
                                pub_.publication_date = Some(date);
                            }
                        }
                    }
                    "author" => {
                        for name_elem in child.descendants().filter(|n| n.has_tag_name("name")) {
                            if let Some(author_name) = name_elem.text() {
                                pub_.authors.push(author_name.trim().to_string());
                            }
                        }
                    }
                    "link" => {
                        if let (Some(href), Some("application/pdf")) =
                            (child.attribute("href"), child.attribute("type"))
                        {
                            pub_.pdf_url = Some(href.to_string());
                        }
                    }
                    _ => {}
                }
            }

            if pub_.title.is_some() {
                pub_.source_provenance.push("arxiv".to_string());
                publications.push(pub_);
            }
        }

        debug!("parsed {} publications from arXiv response", publications.len());
        Ok(publications)
    }
}

impl Default for ArxivProvider {
    fn default() -> Self {
        Self::new().expect("failed to create ArxivProvider")
    }
}

#[async_trait]
impl SourceProvider for ArxivProvider {
    fn name(&self) -> &str {
        "arxiv"
    }

    fn priority(&self) -> u32 {
        80
    }

    fn base_delay(&self) -> Duration {
        Duration::from_millis(3000)
    }

    async fn search(
        &self,
        query: &SearchQuery,
        context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        let start_time = Instant::now();
        info!("searching arXiv for: {}", query.query);

        let url = self.build_search_url(query)?;

        let response = self
            .client
            .get(&url)
            .timeout(context.deadline)
            .send()
            .await
            .map_err(|e| {
                error!("arXiv request failed: {e}");
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let publications = self.parse_response(&response_text)?;
        let search_time = start_time.elapsed();
        info!("arXiv search returned {} publications in {search_time:?}", publications.len());

        Ok(ProviderResult { publications, source: "arxiv".to_string(), search_time })
    }

    async fn get_fulltext_urls(
        &self,
        publication: &Publication,
        _context: &SearchContext,
    ) -> Result<Vec<SourceUrl>, ProviderError> {
        let Some(id) = &publication.arxiv_id else {
            return Ok(Vec::new());
        };
        let url = format!("https://arxiv.org/pdf/{id}.pdf");
        Ok(vec![SourceUrl::new(url, "arxiv", self.priority())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn provider_constructs() {
        assert!(ArxivProvider::new().is_ok());
    }

    #[test]
    fn keyword_search_url_building() {
        let provider = ArxivProvider::new().unwrap();
        let query = SearchQuery {
            query: "quantum computing".to_string(),
            search_type: SearchType::Keywords,
            max_results: 10,
        };
        let url = provider.build_search_url(&query).unwrap();
        assert!(url.contains("all%3A") || url.contains("all:"));
        assert!(url.contains("max_results=10"));
    }

    #[test]
    fn doi_search_url_building() {
        let provider = ArxivProvider::new().unwrap();
        let query = SearchQuery {
            query: "10.1103/PhysRevA.52.R2493".to_string(),
            search_type: SearchType::Doi,
            max_results: 1,
        };
        let url = provider.build_search_url(&query).unwrap();
        assert!(url.contains("doi"));
    }

    #[tokio::test]
    async fn fulltext_url_from_arxiv_id() {
        let provider = ArxivProvider::new().unwrap();
        let mut publication = Publication::new();
        publication.arxiv_id = Some("2301.00001".to_string());
        let urls = provider
            .get_fulltext_urls(&publication, &SearchContext::default())
            .await
            .unwrap();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].url.ends_with("2301.00001.pdf"));
    }
}
