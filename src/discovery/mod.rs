//! Discovery coordinator (C4): ties the source clients, cache, deduplicator,
//! quality validator, and relevance scorer together into one pipeline per dataset.

use crate::cache::TwoLayerCache;
use crate::client::providers::traits::{SearchContext, SearchQuery, SearchType, SourceProvider};
use crate::config::DiscoveryConfig;
use crate::dedup::{deduplicate, DedupConfig};
use crate::model::{Dataset, DiscoveryResult, Publication, QualitySummary, RankedPublication};
use crate::quality::{QualityLevel, QualityValidator};
use crate::resilience::retry::{retry, ErrorKind};
use crate::scorer::RelevanceScorer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedDiscovery {
    publications: Vec<Publication>,
    strategy_provenance: HashMap<String, Vec<String>>,
}

pub struct DiscoveryCoordinator {
    pubmed: Arc<dyn SourceProvider>,
    citation_providers: Vec<Arc<dyn SourceProvider>>,
    cache: Option<Arc<TwoLayerCache>>,
    config: DiscoveryConfig,
}

impl DiscoveryCoordinator {
    pub fn new(
        pubmed: Arc<dyn SourceProvider>,
        citation_providers: Vec<Arc<dyn SourceProvider>>,
        cache: Option<Arc<TwoLayerCache>>,
        config: DiscoveryConfig,
    ) -> Self {
        Self { pubmed, citation_providers, cache, config }
    }

    fn cache_key(accession: &str) -> String {
        format!("discovery:{accession}:all")
    }

    async fn strategy_a(&self, dataset: &Dataset, context: &SearchContext) -> (Vec<Publication>, HashMap<String, Vec<String>>) {
        let mut provenance: HashMap<String, Vec<String>> = HashMap::new();
        let Some(pmid) = dataset.primary_pmid() else {
            return (Vec::new(), provenance);
        };

        let resolved = retry(
            || async {
                self.pubmed
                    .search(&SearchQuery { query: pmid.to_string(), search_type: SearchType::Accession, max_results: 1 }, context)
                    .await
                    .map_err(crate::Error::from)
            },
            2,
            Duration::from_millis(300),
            Duration::from_secs(10),
            &[ErrorKind::Network, ErrorKind::Timeout, ErrorKind::RateLimit],
        )
        .await;

        let primary = match resolved {
            Ok(result) => result.publications.into_iter().next(),
            Err(error) => {
                warn!("strategy A: failed to resolve primary pmid {pmid}: {error}");
                None
            }
        };

        let Some(primary) = primary else { return (Vec::new(), provenance) };
        let lookup_id = primary.doi.clone().or_else(|| primary.pmid.clone()).unwrap_or_else(|| pmid.to_string());

        let mut tasks = Vec::new();
        for provider in &self.citation_providers {
            let provider = provider.clone();
            let lookup_id = lookup_id.clone();
            let context = context.clone();
            tasks.push(tokio::spawn(async move {
                let name = provider.name().to_string();
                let result = retry(
                    || async { provider.get_citing(&lookup_id, 100, &context).await.map_err(crate::Error::from) },
                    2,
                    Duration::from_millis(300),
                    Duration::from_secs(10),
                    &[ErrorKind::Network, ErrorKind::Timeout, ErrorKind::RateLimit],
                )
                .await;
                (name, result)
            }));
        }

        let mut publications = Vec::new();
        for task in tasks {
            match task.await {
                Ok((name, Ok(result))) => {
                    for publication in result.publications {
                        if let Some(id) = publication.canonical_id() {
                            provenance.entry(id).or_default().push(name.clone());
                        }
                        publications.push(publication);
                    }
                }
                Ok((name, Err(error))) => {
                    warn!("strategy A: provider {name} failed: {error}");
                }
                Err(join_error) => {
                    warn!("strategy A: task panicked: {join_error}");
                }
            }
        }

        (publications, provenance)
    }

    async fn strategy_b(&self, dataset: &Dataset, context: &SearchContext) -> Vec<Publication> {
        let query = SearchQuery {
            query: format!("\"{}\"[All Fields]", dataset.accession),
            search_type: SearchType::Accession,
            max_results: 100,
        };

        let result = retry(
            || async { self.pubmed.search(&query, context).await.map_err(crate::Error::from) },
            3,
            Duration::from_millis(300),
            Duration::from_secs(10),
            &[ErrorKind::Network, ErrorKind::Timeout, ErrorKind::RateLimit],
        )
        .await;

        match result {
            Ok(result) => result.publications,
            Err(error) => {
                warn!("strategy B: mention search failed for {}: {error}", dataset.accession);
                Vec::new()
            }
        }
    }

    fn union_by_identity(a: Vec<Publication>, b: Vec<Publication>) -> Vec<Publication> {
        let mut merged = a;
        'outer: for candidate in b {
            for existing in merged.iter() {
                if candidate.has_identifier() && existing.has_identifier() && candidate.shares_identity_with(existing) {
                    continue 'outer;
                }
            }
            merged.push(candidate);
        }
        merged
    }

    fn quality_summary(assessments: &[crate::quality::QualityAssessment]) -> QualitySummary {
        let mut summary = QualitySummary { excellent: 0, good: 0, acceptable: 0, poor: 0, rejected: 0 };
        for assessment in assessments {
            match assessment.level {
                QualityLevel::Excellent => summary.excellent += 1,
                QualityLevel::Good => summary.good += 1,
                QualityLevel::Acceptable => summary.acceptable += 1,
                QualityLevel::Poor => summary.poor += 1,
                QualityLevel::Rejected => summary.rejected += 1,
            }
        }
        summary
    }

    pub async fn discover(&self, dataset: &Dataset) -> DiscoveryResult {
        let key = Self::cache_key(&dataset.accession);

        if self.config.enable_cache {
            if let Some(cache) = &self.cache {
                match cache.get(&key).await {
                    Ok(Some(bytes)) => {
                        if let Ok(cached) = serde_json::from_slice::<CachedDiscovery>(&bytes) {
                            debug!("discovery cache hit for {}", dataset.accession);
                            return self.finish(dataset, cached.publications, cached.strategy_provenance);
                        }
                    }
                    Ok(None) => {}
                    Err(error) => warn!("discovery cache read failed: {error}"),
                }
            }
        }

        let context = SearchContext { deadline: Duration::from_secs(10) };

        let (strategy_a_publications, provenance) = if self.config.enable_strategy_a {
            self.strategy_a(dataset, &context).await
        } else {
            (Vec::new(), HashMap::new())
        };

        let strategy_b_publications =
            if self.config.enable_strategy_b { self.strategy_b(dataset, &context).await } else { Vec::new() };

        let union = Self::union_by_identity(strategy_a_publications, strategy_b_publications);

        if self.config.enable_cache {
            if let Some(cache) = &self.cache {
                let cached = CachedDiscovery { publications: union.clone(), strategy_provenance: provenance.clone() };
                if let Ok(bytes) = serde_json::to_vec(&cached) {
                    if let Err(error) = cache.set(&key, bytes, Some(self.config.cache_ttl_seconds)).await {
                        warn!("discovery cache write failed: {error}");
                    }
                }
            }
        }

        self.finish(dataset, union, provenance)
    }

    fn finish(&self, dataset: &Dataset, publications: Vec<Publication>, provenance: HashMap<String, Vec<String>>) -> DiscoveryResult {
        let dedup_result = deduplicate(publications, &DedupConfig::default());

        let scorer = RelevanceScorer::new(self.config.scorer_weights.clone());
        let ranked_by_relevance = scorer.rank_by_relevance(dedup_result.publications, dataset);

        let quality_validator = self.config.enable_quality.then(|| QualityValidator::new(self.config.quality_weights.clone()));

        let mut quality_assessments = Vec::new();
        let mut ranked: Vec<RankedPublication> = Vec::new();
        for (publication, relevance) in ranked_by_relevance {
            let quality = quality_validator.as_ref().map(|validator| validator.assess(&publication));
            if let (Some(assessment), Some(min_level)) = (&quality, self.config.min_quality_level) {
                if assessment.level < min_level {
                    continue;
                }
            }
            if let Some(assessment) = &quality {
                quality_assessments.push(assessment.clone());
            }
            ranked.push(RankedPublication { publication, relevance, quality });
        }

        info!("discovery for {} produced {} ranked publications", dataset.accession, ranked.len());

        DiscoveryResult {
            accession: dataset.accession.clone(),
            primary_pmid: dataset.primary_pmid().map(str::to_string),
            publications: ranked,
            strategy_provenance: provenance,
            quality_summary: (!quality_assessments.is_empty()).then(|| Self::quality_summary(&quality_assessments)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::providers::traits::{ProviderError, ProviderResult};
    use async_trait::async_trait;
    use std::time::Duration as StdDuration;

    struct StubProvider {
        name: &'static str,
        publications: Vec<Publication>,
    }

    #[async_trait]
    impl SourceProvider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn search(&self, _query: &SearchQuery, _context: &SearchContext) -> Result<ProviderResult, ProviderError> {
            Ok(ProviderResult { publications: self.publications.clone(), source: self.name.to_string(), search_time: StdDuration::ZERO })
        }

        async fn get_citing(&self, _id: &str, _max_results: u32, _context: &SearchContext) -> Result<ProviderResult, ProviderError> {
            Ok(ProviderResult { publications: self.publications.clone(), source: self.name.to_string(), search_time: StdDuration::ZERO })
        }
    }

    fn dataset() -> Dataset {
        Dataset { accession: "GSE1".to_string(), title: "t".to_string(), summary: "s".to_string(), primary_pmids: vec!["111".to_string()] }
    }

    fn publication(pmid: &str, title: &str) -> Publication {
        Publication { pmid: Some(pmid.to_string()), title: Some(title.to_string()), ..Publication::default() }
    }

    #[tokio::test]
    async fn discover_merges_strategies_and_ranks() {
        let pubmed = Arc::new(StubProvider { name: "pubmed", publications: vec![publication("111", "Primary"), publication("222", "Mentioned")] });
        let openalex = Arc::new(StubProvider { name: "openalex", publications: vec![publication("333", "Cited by openalex")] });

        let coordinator = DiscoveryCoordinator::new(pubmed, vec![openalex], None, DiscoveryConfig::default());
        let result = coordinator.discover(&dataset()).await;

        let pmids: Vec<Option<String>> = result.publications.iter().map(|r| r.publication.pmid.clone()).collect();
        assert!(pmids.contains(&Some("222".to_string())));
        assert!(pmids.contains(&Some("333".to_string())));
    }

    #[tokio::test]
    async fn discover_uses_cache_on_second_call() {
        let pubmed = Arc::new(StubProvider { name: "pubmed", publications: vec![publication("111", "Primary")] });
        let cache = Arc::new(TwoLayerCache::temporary(Some(10)).unwrap());

        let coordinator = DiscoveryCoordinator::new(pubmed, vec![], Some(cache.clone()), DiscoveryConfig::default());
        let first = coordinator.discover(&dataset()).await;
        assert!(!first.publications.is_empty());

        let stats_before = cache.stats().await;
        let second = coordinator.discover(&dataset()).await;
        let stats_after = cache.stats().await;

        assert_eq!(second.publications.len(), first.publications.len());
        assert!(stats_after.hits > stats_before.hits);
    }
}
