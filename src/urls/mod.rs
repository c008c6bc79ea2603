//! URL collector (C8): fan out to every enabled source client's
//! `get_fulltext_urls`, bounded by a semaphore, then merge and rank the results.

use crate::client::providers::traits::{ProviderError, SearchContext, SourceProvider};
use crate::config::UrlCollectorConfig;
use crate::model::{FullTextResult, Publication, SourceUrl};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct UrlCollector {
    providers: Vec<Arc<dyn SourceProvider>>,
    config: UrlCollectorConfig,
}

impl UrlCollector {
    pub fn new(providers: Vec<Arc<dyn SourceProvider>>, config: UrlCollectorConfig) -> Self {
        Self { providers, config }
    }

    fn active_providers(&self) -> Vec<Arc<dyn SourceProvider>> {
        self.providers
            .iter()
            .filter(|p| {
                if p.name() == "sci-hub" || p.name() == "libgen" {
                    self.config.allow_gray_market
                } else {
                    true
                }
            })
            .cloned()
            .collect()
    }

    /// Collect candidate full-text URLs for one publication, deduplicated by URL and
    /// sorted by URL type then priority (§4.8).
    pub async fn get_urls(&self, publication: &Publication) -> FullTextResult {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let context = SearchContext { deadline: Duration::from_secs(self.config.timeout_per_source_s) };
        let per_source_timeout = Duration::from_secs(self.config.timeout_per_source_s);

        let mut tasks = Vec::new();
        for provider in self.active_providers() {
            let semaphore = semaphore.clone();
            let publication = publication.clone();
            let context = context.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                let name = provider.name().to_string();
                match timeout(per_source_timeout, provider.get_fulltext_urls(&publication, &context)).await {
                    Ok(Ok(urls)) => (name, Ok(urls)),
                    Ok(Err(error)) => (name, Err(error)),
                    Err(_) => (name, Err(ProviderError::Timeout)),
                }
            }));
        }

        let mut urls: Vec<SourceUrl> = Vec::new();
        let mut errors: HashMap<String, String> = HashMap::new();
        for task in tasks {
            match task.await {
                Ok((_name, Ok(found))) => urls.extend(found),
                Ok((name, Err(error))) => {
                    warn!("source {name} failed to produce full-text urls: {error}");
                    errors.insert(name, error.to_string());
                }
                Err(join_error) => {
                    warn!("url collection task panicked: {join_error}");
                }
            }
        }

        let urls = Self::dedup_and_sort(urls);
        debug!("collected {} candidate full-text urls for publication", urls.len());

        FullTextResult { success: !urls.is_empty(), urls, chosen_url: None, errors }
    }

    /// Collect URLs for a batch of publications, running `config.max_concurrent`
    /// publications' `get_urls` calls at once (§4.8's "2-3" per-publication concurrency).
    pub async fn get_batch(&self, publications: &[Publication]) -> Vec<FullTextResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));

        let mut tasks = Vec::with_capacity(publications.len());
        for publication in publications {
            let collector = self.clone();
            let publication = publication.clone();
            let semaphore = semaphore.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                collector.get_urls(&publication).await
            }));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok(result) => results.push(result),
                Err(join_error) => {
                    warn!("url batch task panicked: {join_error}");
                    results.push(FullTextResult { success: false, urls: Vec::new(), chosen_url: None, errors: HashMap::new() });
                }
            }
        }
        results
    }

    fn dedup_and_sort(mut urls: Vec<SourceUrl>) -> Vec<SourceUrl> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut deduped: Vec<SourceUrl> = Vec::new();
        for url in urls.drain(..) {
            if let Some(&index) = seen.get(&url.url) {
                let existing_key = (deduped[index].url_type, deduped[index].priority);
                if (url.url_type, url.priority) < existing_key {
                    deduped[index] = url;
                }
                continue;
            }
            seen.insert(url.url.clone(), deduped.len());
            deduped.push(url);
        }
        deduped.sort_by(|a, b| (a.url_type, a.priority).cmp(&(b.url_type, b.priority)));
        deduped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubProvider {
        name: &'static str,
        priority: u32,
        urls: Vec<&'static str>,
    }

    #[async_trait]
    impl SourceProvider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        async fn get_fulltext_urls(
            &self,
            _publication: &Publication,
            _context: &SearchContext,
        ) -> Result<Vec<SourceUrl>, ProviderError> {
            Ok(self.urls.iter().map(|u| SourceUrl::new(*u, self.name, self.priority)).collect())
        }
    }

    #[tokio::test]
    async fn collects_and_sorts_by_url_type_then_priority() {
        let providers: Vec<Arc<dyn SourceProvider>> = vec![
            Arc::new(StubProvider { name: "pmc", priority: 2, urls: vec!["https://host/articles/PMC1"] }),
            Arc::new(StubProvider { name: "unpaywall", priority: 3, urls: vec!["https://host/paper.pdf"] }),
        ];
        let collector = UrlCollector::new(providers, UrlCollectorConfig::default());
        let result = collector.get_urls(&Publication::default()).await;

        assert!(result.success);
        assert_eq!(result.urls.len(), 2);
        // PdfDirect (priority 0 in UrlType ordering) sorts before HtmlFulltext.
        assert_eq!(result.urls[0].url, "https://host/paper.pdf");
    }

    #[tokio::test]
    async fn duplicate_urls_keep_the_better_ranked_entry() {
        let providers: Vec<Arc<dyn SourceProvider>> = vec![
            Arc::new(StubProvider { name: "core", priority: 4, urls: vec!["https://host/paper.pdf"] }),
            Arc::new(StubProvider { name: "pmc", priority: 2, urls: vec!["https://host/paper.pdf"] }),
        ];
        let collector = UrlCollector::new(providers, UrlCollectorConfig::default());
        let result = collector.get_urls(&Publication::default()).await;

        assert_eq!(result.urls.len(), 1);
        assert_eq!(result.urls[0].source, "pmc");
    }

    #[tokio::test]
    async fn get_batch_preserves_input_order_under_concurrency() {
        let providers: Vec<Arc<dyn SourceProvider>> =
            vec![Arc::new(StubProvider { name: "pmc", priority: 2, urls: vec!["https://host/paper.pdf"] })];
        let mut config = UrlCollectorConfig::default();
        config.max_concurrent = 2;
        let collector = UrlCollector::new(providers, config);

        let mut publications = Vec::new();
        for i in 0..6 {
            let mut publication = Publication::default();
            publication.pmid = Some(i.to_string());
            publications.push(publication);
        }

        let results = collector.get_batch(&publications).await;
        assert_eq!(results.len(), 6);
        for result in &results {
            assert!(result.success);
        }
    }

    #[tokio::test]
    async fn gray_market_provider_excluded_unless_allowed() {
        let providers: Vec<Arc<dyn SourceProvider>> =
            vec![Arc::new(StubProvider { name: "sci-hub", priority: 9, urls: vec!["https://sci-hub.test/x.pdf"] })];
        let mut config = UrlCollectorConfig::default();
        config.allow_gray_market = false;
        let collector = UrlCollector::new(providers, config);
        let result = collector.get_urls(&Publication::default()).await;
        assert!(result.urls.is_empty());
    }
}
