use super::traits::{ProviderError, ProviderResult, SearchContext, SearchQuery, SourceProvider};
use crate::model::{Publication, SourceUrl};
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// NCBI PMC OAI/efetch client. Only contributes `get_fulltext_urls`: PMC's own
/// full-text XML is convertible to a PDF link, never a search or citation source
/// in its own right (§6.1).
pub struct PmcProvider {
    client: Client,
    efetch_base: String,
    email: String,
}

impl PmcProvider {
    pub fn new(email: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("citation-discovery-core/0.1")
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            efetch_base: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi".to_string(),
            email: email.into(),
        })
    }

    fn normalize_pmcid(pmcid: &str) -> String {
        let trimmed = pmcid.trim().to_uppercase();
        if trimmed.starts_with("PMC") { trimmed } else { format!("PMC{trimmed}") }
    }

    /// Confirm the article exists in PMC via an `efetch` HEAD-equivalent GET before
    /// handing back a synthesized PDF URL; a 200 with an empty `pmc-articleset` root
    /// means PMC has no record under this id.
    async fn article_exists(&self, pmcid: &str, context: &SearchContext) -> Result<bool, ProviderError> {
        let response = self
            .client
            .get(&self.efetch_base)
            .query(&[("db", "pmc"), ("id", pmcid), ("rettype", "full"), ("retmode", "xml"), ("email", &self.email)])
            .timeout(context.deadline)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { ProviderError::Timeout } else { ProviderError::Network(e.to_string()) })?;

        if response.status().as_u16() == 404 {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(ProviderError::from_status(response.status().as_u16(), response.text().await.unwrap_or_default()));
        }

        let text = response.text().await.map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(text.contains("<article"))
    }
}

#[async_trait]
impl SourceProvider for PmcProvider {
    fn name(&self) -> &str {
        "pmc"
    }

    fn priority(&self) -> u32 {
        15
    }

    fn base_delay(&self) -> Duration {
        Duration::from_millis(334)
    }

    async fn search(
        &self,
        _query: &SearchQuery,
        _context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        Err(ProviderError::Other("pmc does not support search; use pubmed".to_string()))
    }

    async fn get_fulltext_urls(
        &self,
        publication: &Publication,
        context: &SearchContext,
    ) -> Result<Vec<SourceUrl>, ProviderError> {
        let Some(pmcid) = &publication.pmcid else {
            return Ok(Vec::new());
        };
        let start_time = Instant::now();
        let pmcid = Self::normalize_pmcid(pmcid);
        info!("checking PMC full text for {pmcid}");

        if !self.article_exists(&pmcid, context).await? {
            return Ok(Vec::new());
        }

        let pdf_url = format!("https://www.ncbi.nlm.nih.gov/pmc/articles/{pmcid}/pdf/");
        debug!("PMC lookup for {pmcid} took {:?}", start_time.elapsed());
        Ok(vec![SourceUrl::new(pdf_url, "pmc", self.priority())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_constructs() {
        assert!(PmcProvider::new("research@example.org").is_ok());
    }

    #[test]
    fn pmcid_normalization() {
        assert_eq!(PmcProvider::normalize_pmcid("9999999"), "PMC9999999");
        assert_eq!(PmcProvider::normalize_pmcid("pmc9999999"), "PMC9999999");
        assert_eq!(PmcProvider::normalize_pmcid("PMC9999999"), "PMC9999999");
    }

    #[test]
    fn provider_interface() {
        let provider = PmcProvider::new("research@example.org").unwrap();
        assert_eq!(provider.name(), "pmc");
    }
}
