use super::traits::{ProviderError, ProviderResult, SearchContext, SearchQuery, SourceProvider};
use crate::model::{Publication, SourceUrl};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_MIRRORS: &[&str] = &["https://sci-hub.se", "https://sci-hub.st"];

/// Sci-Hub/LibGen mirror scraper. Disabled by default (§9 Open Question 3,
/// `URLCollectorConfig.allow_gray_market`); the caller is responsible for not
/// constructing or invoking this provider unless the flag is set.
pub struct GrayMarketProvider {
    client: Client,
    mirrors: Vec<String>,
}

impl GrayMarketProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_mirrors(DEFAULT_MIRRORS.iter().map(|s| s.to_string()).collect())
    }

    pub fn with_mirrors(mirrors: Vec<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36")
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, mirrors })
    }

    fn extract_pdf_url(html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let selector = Selector::parse("a[href*='.pdf'], iframe[src*='.pdf'], embed[src*='.pdf']").ok()?;
        document.select(&selector).find_map(|el| {
            let raw = el.value().attr("href").or_else(|| el.value().attr("src"))?;
            Some(if raw.starts_with("http") {
                raw.to_string()
            } else if let Some(rest) = raw.strip_prefix("//") {
                format!("https://{rest}")
            } else {
                format!("https:{raw}")
            })
        })
    }

    async fn try_mirror(&self, mirror: &str, doi: &str, context: &SearchContext) -> Result<Option<String>, ProviderError> {
        let url = format!("{}/{}", mirror.trim_end_matches('/'), doi);
        let response = self
            .client
            .get(&url)
            .timeout(context.deadline)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(None);
        }
        let html = response.text().await.map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(Self::extract_pdf_url(&html))
    }
}

impl Default for GrayMarketProvider {
    fn default() -> Self {
        Self::new().expect("failed to create GrayMarketProvider")
    }
}

#[async_trait]
impl SourceProvider for GrayMarketProvider {
    fn name(&self) -> &str {
        "gray_market"
    }

    fn priority(&self) -> u32 {
        90
    }

    fn base_delay(&self) -> Duration {
        Duration::from_secs(2)
    }

    async fn search(
        &self,
        _query: &SearchQuery,
        _context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        Err(ProviderError::Other("gray_market provides full-text only, not search".to_string()))
    }

    async fn get_fulltext_urls(
        &self,
        publication: &Publication,
        context: &SearchContext,
    ) -> Result<Vec<SourceUrl>, ProviderError> {
        let Some(doi) = &publication.doi else {
            return Ok(Vec::new());
        };
        for mirror in &self.mirrors {
            match self.try_mirror(mirror, doi, context).await {
                Ok(Some(pdf_url)) => {
                    let mut source_url = SourceUrl::new(pdf_url, "gray_market", self.priority());
                    source_url.confidence = 0.3;
                    return Ok(vec![source_url]);
                }
                Ok(None) => continue,
                Err(e) => {
                    warn!("gray_market mirror {mirror} failed: {e}");
                    continue;
                }
            }
        }
        debug!("gray_market found no PDF for DOI {doi} across {} mirrors", self.mirrors.len());
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_constructs() {
        assert!(GrayMarketProvider::new().is_ok());
    }

    #[test]
    fn extracts_absolute_pdf_link() {
        let html = r#"<html><body><a href="https://example.com/paper.pdf">PDF</a></body></html>"#;
        assert_eq!(GrayMarketProvider::extract_pdf_url(html), Some("https://example.com/paper.pdf".to_string()));
    }

    #[test]
    fn extracts_protocol_relative_link() {
        let html = r#"<html><body><iframe src="//example.com/paper.pdf"></iframe></body></html>"#;
        assert_eq!(GrayMarketProvider::extract_pdf_url(html), Some("https://example.com/paper.pdf".to_string()));
    }

    #[test]
    fn no_pdf_link_returns_none() {
        let html = "<html><body><p>nothing here</p></body></html>";
        assert_eq!(GrayMarketProvider::extract_pdf_url(html), None);
    }

    #[test]
    fn provider_interface() {
        let provider = GrayMarketProvider::new().unwrap();
        assert_eq!(provider.name(), "gray_market");
        assert_eq!(provider.priority(), 90);
    }
}
