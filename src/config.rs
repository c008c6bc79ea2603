//! Configuration for the discovery, URL-collection, and download layers.
//!
//! Layered the way this crate loads everything else: built-in defaults, then
//! an optional TOML file, then environment variable overrides (`envy`), with
//! the `config` crate doing the file/env merge.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Quality classification thresholds and axis weights for C6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityWeights {
    pub metadata_completeness: f64,
    pub content_quality: f64,
    pub journal_quality: f64,
    pub temporal_relevance: f64,
    pub min_quality_score: f64,
    pub excellent_threshold: f64,
    pub good_threshold: f64,
    pub acceptable_threshold: f64,
    pub min_abstract_length: usize,
    pub min_citations_recent: u64,
    pub min_citations_older: u64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            metadata_completeness: 0.40,
            content_quality: 0.30,
            journal_quality: 0.20,
            temporal_relevance: 0.10,
            min_quality_score: 0.3,
            excellent_threshold: 0.8,
            good_threshold: 0.6,
            acceptable_threshold: 0.4,
            min_abstract_length: 100,
            min_citations_recent: 5,
            min_citations_older: 10,
        }
    }
}

/// Relevance-scorer axis weights for C7.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerWeights {
    pub content_similarity: f64,
    pub keyword_match: f64,
    pub recency: f64,
    pub citation_count: f64,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            content_similarity: 0.40,
            keyword_match: 0.30,
            recency: 0.20,
            citation_count: 0.10,
        }
    }
}

/// Minimum quality band a publication must clear to survive `filter_by_quality`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityLevel {
    Rejected,
    Poor,
    Acceptable,
    Good,
    Excellent,
}

/// Discovery coordinator configuration (C4), matching spec §6.3 `DiscoveryConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub enable_strategy_a: bool,
    pub enable_strategy_b: bool,
    pub enable_cache: bool,
    pub cache_ttl_seconds: u64,
    pub max_results: usize,
    pub enable_quality: bool,
    pub min_quality_level: Option<QualityLevel>,
    pub quality_weights: QualityWeights,
    pub scorer_weights: ScorerWeights,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enable_strategy_a: true,
            enable_strategy_b: true,
            enable_cache: true,
            cache_ttl_seconds: 604_800,
            max_results: 100,
            enable_quality: true,
            min_quality_level: None,
            quality_weights: QualityWeights::default(),
            scorer_weights: ScorerWeights::default(),
        }
    }
}

/// URL collector configuration (C8), matching spec §6.3 `URLCollectorConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlCollectorConfig {
    pub enable_pmc: bool,
    pub enable_unpaywall: bool,
    pub enable_core: bool,
    pub enable_openalex: bool,
    pub enable_crossref: bool,
    pub enable_biorxiv: bool,
    pub enable_arxiv: bool,
    pub enable_gray_market: bool,
    pub unpaywall_email: Option<String>,
    pub core_api_key: Option<String>,
    pub timeout_per_source_s: u64,
    pub max_concurrent: usize,
    pub allow_gray_market: bool,
}

impl Default for UrlCollectorConfig {
    fn default() -> Self {
        Self {
            enable_pmc: true,
            enable_unpaywall: true,
            enable_core: true,
            enable_openalex: true,
            enable_crossref: true,
            enable_biorxiv: true,
            enable_arxiv: true,
            enable_gray_market: false,
            unpaywall_email: None,
            core_api_key: None,
            timeout_per_source_s: 10,
            max_concurrent: 3,
            allow_gray_market: false,
        }
    }
}

/// Download manager configuration (C9), matching spec §6.3 `DownloaderConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    pub max_concurrent: usize,
    pub max_retries: u32,
    pub timeout_seconds: u64,
    pub validate_pdf: bool,
    pub min_pdf_size: u64,
    pub max_pdf_size: u64,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            max_retries: 2,
            timeout_seconds: 30,
            validate_pdf: true,
            min_pdf_size: 10_240,
            max_pdf_size: 104_857_600,
        }
    }
}

/// Per-source credentials/contact info (§4.1: "Accept optional API credentials ...
/// never silently change output semantics").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceCredentials {
    pub entrez_email: Option<String>,
    pub entrez_api_key: Option<String>,
    pub crossref_mailto: Option<String>,
    pub unpaywall_email: Option<String>,
    pub core_api_key: Option<String>,
}

/// Top-level aggregate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    pub url_collector: UrlCollectorConfig,
    pub downloader: DownloaderConfig,
    pub credentials: SourceCredentials,
    /// Directory the persistent (L2) cache file lives in.
    pub cache_dir: Option<PathBuf>,
    /// Directory downloaded PDFs are written to.
    pub output_dir: Option<PathBuf>,
}

/// Environment-variable overrides, parsed by `envy` with the `APP_` prefix and applied
/// on top of a loaded [`Config`] via [`Config::with_overrides`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverrides {
    pub entrez_email: Option<String>,
    pub entrez_api_key: Option<String>,
    pub crossref_mailto: Option<String>,
    pub unpaywall_email: Option<String>,
    pub core_api_key: Option<String>,
    pub cache_dir: Option<String>,
    pub output_dir: Option<String>,
    pub allow_gray_market: Option<bool>,
}

impl Config {
    /// Build defaults, optionally layering a TOML file, then environment overrides.
    pub fn load(toml_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = toml_path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path));
            }
        }

        let merged: Config = builder.build()?.try_deserialize()?;
        Ok(merged.with_overrides(Self::env_overrides()?))
    }

    fn env_overrides() -> Result<ConfigOverrides> {
        envy::prefixed("APP_")
            .from_env::<ConfigOverrides>()
            .map_err(|e| Error::Config(config::ConfigError::Message(e.to_string())))
    }

    /// Apply environment overrides on top of a loaded config, never changing output
    /// semantics beyond credentials and paths (per §4.1's clients contract).
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(v) = overrides.entrez_email {
            self.credentials.entrez_email = Some(v);
        }
        if let Some(v) = overrides.entrez_api_key {
            self.credentials.entrez_api_key = Some(v);
        }
        if let Some(v) = overrides.crossref_mailto {
            self.credentials.crossref_mailto = Some(v);
        }
        if let Some(v) = overrides.unpaywall_email {
            self.credentials.unpaywall_email = Some(v.clone());
            self.url_collector.unpaywall_email = Some(v);
        }
        if let Some(v) = overrides.core_api_key {
            self.credentials.core_api_key = Some(v.clone());
            self.url_collector.core_api_key = Some(v);
        }
        if let Some(v) = overrides.cache_dir {
            self.cache_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = overrides.output_dir {
            self.output_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = overrides.allow_gray_market {
            self.url_collector.allow_gray_market = v;
            self.url_collector.enable_gray_market = v;
        }
        self
    }

    /// Default cache directory when none is configured: the OS data dir.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("citation-discovery-core")
                .join("cache")
        })
    }

    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("citation-discovery-core").join("pdfs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert!(cfg.discovery.enable_strategy_a);
        assert!(cfg.discovery.enable_strategy_b);
        assert_eq!(cfg.discovery.cache_ttl_seconds, 604_800);
        assert_eq!(cfg.url_collector.max_concurrent, 3);
        assert!(!cfg.url_collector.allow_gray_market);
        assert_eq!(cfg.downloader.min_pdf_size, 10_240);
        assert_eq!(cfg.downloader.max_pdf_size, 104_857_600);
    }

    #[test]
    fn scorer_weights_sum_to_one() {
        let w = ScorerWeights::default();
        let total = w.content_similarity + w.keyword_match + w.recency + w.citation_count;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn overrides_set_credentials_without_touching_other_fields() {
        let base = Config::default();
        let overrides = ConfigOverrides {
            unpaywall_email: Some("me@example.org".to_string()),
            ..Default::default()
        };
        let merged = base.with_overrides(overrides);
        assert_eq!(merged.url_collector.unpaywall_email.as_deref(), Some("me@example.org"));
        assert_eq!(merged.downloader.max_retries, 2);
    }
}
