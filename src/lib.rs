//! Citation discovery core: finds, deduplicates, ranks, and retrieves the
//! scholarly publications that cite a given biomedical dataset.
//!
//! The pipeline is [`discovery::DiscoveryCoordinator`] (C4), which fans out to
//! the source clients in [`client::providers`] (C1) through the retry/fallback
//! layer in [`resilience`] (C2), consults the two-layer cache in [`cache`]
//! (C3), merges results with [`dedup`] (C5), and scores/filters survivors with
//! [`scorer`] and [`quality`] (C7/C6). [`urls`] and [`download`] (C8/C9) turn a
//! ranked publication into a validated PDF on disk.

pub mod cache;
pub mod client;
pub mod config;
pub mod dedup;
pub mod discovery;
pub mod download;
pub mod error;
pub mod identifier;
pub mod model;
pub mod quality;
pub mod resilience;
pub mod scorer;
pub mod telemetry;
pub mod urls;

pub use config::{Config, ConfigOverrides};
pub use discovery::DiscoveryCoordinator;
pub use download::{DownloadManager, DownloadReport};
pub use error::{Error, Result};
pub use model::{
    CacheEntry, Dataset, DiscoveryResult, DownloadResult, FullTextResult, Publication,
    QualitySummary, RankedPublication, SourceUrl, UrlType,
};
pub use quality::{QualityAssessment, QualityLevel, QualityValidator};
pub use resilience::FallbackChain;
pub use scorer::{RelevanceScore, RelevanceScorer};
pub use urls::UrlCollector;
