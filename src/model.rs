//! Core data model shared by every discovery, scoring, and download component.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A scholarly publication, keyed by whichever identifiers a source client recovered for it.
///
/// Two `Publication`s are *identity-equal* when they share a normalized PMID, DOI, or PMCID
/// (the identity rule). Identity equality is checked via [`Publication::shares_identity_with`]
/// rather than `PartialEq`, since two records sharing one identifier can otherwise disagree on
/// every other field until the deduplicator merges them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Publication {
    pub pmid: Option<String>,
    pub doi: Option<String>,
    pub pmcid: Option<String>,
    pub arxiv_id: Option<String>,
    pub openalex_id: Option<String>,
    pub core_id: Option<String>,

    pub title: Option<String>,
    pub abstract_text: Option<String>,
    /// Full-name author strings, in publication order.
    pub authors: Vec<String>,
    pub journal: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub citations: u64,
    pub keywords: Vec<String>,
    pub mesh_terms: Vec<String>,

    pub landing_url: Option<String>,
    pub pdf_url: Option<String>,

    /// Every provider that contributed a record merged into this one.
    pub source_provenance: Vec<String>,

    /// Provider-specific fields that don't deserve a first-class column.
    pub metadata: HashMap<String, String>,
}

impl Publication {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized PMID: digits only.
    pub fn normalized_pmid(&self) -> Option<String> {
        self.pmid.as_ref().map(|p| p.trim().trim_start_matches('0').to_string())
            .filter(|p| !p.is_empty())
            .or_else(|| self.pmid.clone())
    }

    /// Normalized DOI: lowercase, stripped of any `doi:`/URL prefix.
    pub fn normalized_doi(&self) -> Option<String> {
        self.doi.as_ref().map(|d| {
            d.trim()
                .trim_start_matches("https://doi.org/")
                .trim_start_matches("http://doi.org/")
                .trim_start_matches("doi:")
                .to_lowercase()
        })
    }

    /// Normalized PMCID: uppercase, `PMC` prefix enforced.
    pub fn normalized_pmcid(&self) -> Option<String> {
        self.pmcid.as_ref().map(|p| {
            let p = p.trim().to_uppercase();
            if p.starts_with("PMC") { p } else { format!("PMC{p}") }
        })
    }

    /// The identity rule of §3: two publications are equal iff they share a normalized
    /// PMID, DOI, or PMCID.
    pub fn shares_identity_with(&self, other: &Publication) -> bool {
        if let (Some(a), Some(b)) = (self.normalized_pmid(), other.normalized_pmid()) {
            if a == b {
                return true;
            }
        }
        if let (Some(a), Some(b)) = (self.normalized_doi(), other.normalized_doi()) {
            if a == b {
                return true;
            }
        }
        if let (Some(a), Some(b)) = (self.normalized_pmcid(), other.normalized_pmcid()) {
            if a == b {
                return true;
            }
        }
        false
    }

    /// Canonical id used for the deduplicator's exact-id pass: first of PMID, DOI, PMCID.
    pub fn canonical_id(&self) -> Option<String> {
        self.normalized_pmid()
            .map(|p| format!("pmid:{p}"))
            .or_else(|| self.normalized_doi().map(|d| format!("doi:{d}")))
            .or_else(|| self.normalized_pmcid().map(|p| format!("pmcid:{p}")))
    }

    /// Whether this record has at least one identifier.
    pub fn has_identifier(&self) -> bool {
        self.pmid.is_some()
            || self.doi.is_some()
            || self.pmcid.is_some()
            || self.arxiv_id.is_some()
            || self.openalex_id.is_some()
            || self.core_id.is_some()
    }
}

/// A biomedical dataset and the accession-matching rules that identify it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub accession: String,
    pub title: String,
    pub summary: String,
    /// PMIDs of the dataset's primary publication(s), in the order the source listed them.
    pub primary_pmids: Vec<String>,
}

impl Dataset {
    /// Validate `accession` against `^(GSE|GPL|GSM|GDS)\d+$`.
    pub fn is_valid_accession(accession: &str) -> bool {
        let prefixes = ["GSE", "GPL", "GSM", "GDS"];
        for prefix in prefixes {
            if let Some(rest) = accession.strip_prefix(prefix) {
                return !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit());
            }
        }
        false
    }

    pub fn primary_pmid(&self) -> Option<&str> {
        self.primary_pmids.first().map(String::as_str)
    }
}

/// Classification of a candidate full-text URL, used to order download attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UrlType {
    PdfDirect = 0,
    HtmlFulltext = 1,
    LandingPage = 2,
    Unknown = 3,
}

/// A candidate full-text URL discovered by a source client's `get_fulltext_urls`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceUrl {
    pub url: String,
    pub source: String,
    /// Lower is preferred.
    pub priority: u32,
    pub url_type: UrlType,
    pub requires_auth: bool,
    pub confidence: f64,
    pub metadata: HashMap<String, String>,
}

impl SourceUrl {
    pub fn new(url: impl Into<String>, source: impl Into<String>, priority: u32) -> Self {
        let url = url.into();
        let url_type = classify_url(&url);
        Self {
            url,
            source: source.into(),
            priority,
            url_type,
            requires_auth: false,
            confidence: 0.5,
            metadata: HashMap::new(),
        }
    }
}

/// Classify a URL per §4.8: extension, then path fragment, then DOI host, else unknown.
pub fn classify_url(url: &str) -> UrlType {
    let lower = url.to_lowercase();
    if lower.ends_with(".pdf") || lower.contains("/pdf/") {
        return UrlType::PdfDirect;
    }
    if lower.contains("/articles/") || lower.contains(".full") {
        return UrlType::HtmlFulltext;
    }
    if lower.contains("doi.org") {
        return UrlType::LandingPage;
    }
    UrlType::Unknown
}

/// Outcome of collecting candidate full-text URLs for one publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullTextResult {
    pub success: bool,
    pub urls: Vec<SourceUrl>,
    /// URL that ultimately succeeded on download, if a download was attempted.
    pub chosen_url: Option<String>,
    /// Per-source error messages, aggregated.
    pub errors: HashMap<String, String>,
}

/// Outcome of attempting to download a PDF for one publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResult {
    pub success: bool,
    pub local_path: Option<String>,
    pub byte_size: Option<u64>,
    pub source: Option<String>,
    pub sha256: Option<String>,
    pub error: Option<String>,
}

impl DownloadResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            local_path: None,
            byte_size: None,
            source: None,
            sha256: None,
            error: Some(error.into()),
        }
    }
}

/// A scored, ranked publication as it leaves the discovery pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPublication {
    pub publication: Publication,
    pub relevance: crate::scorer::RelevanceScore,
    pub quality: Option<crate::quality::QualityAssessment>,
}

/// Output of the discovery coordinator (C4) for one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub accession: String,
    pub primary_pmid: Option<String>,
    pub publications: Vec<RankedPublication>,
    /// Which strategy(ies) contributed each canonical id.
    pub strategy_provenance: HashMap<String, Vec<String>>,
    pub quality_summary: Option<QualitySummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySummary {
    pub excellent: usize,
    pub good: usize,
    pub acceptable: usize,
    pub poor: usize,
    pub rejected: usize,
}

/// A single L1/L2 cache record as described by §4.3's column list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Vec<u8>,
    pub created_at: i64,
    pub expires_at: i64,
    pub hit_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accession_validation() {
        assert!(Dataset::is_valid_accession("GSE123456"));
        assert!(Dataset::is_valid_accession("GPL1"));
        assert!(!Dataset::is_valid_accession("GSE"));
        assert!(!Dataset::is_valid_accession("XYZ123"));
        assert!(!Dataset::is_valid_accession("gse123"));
    }

    #[test]
    fn identity_by_doi() {
        let mut a = Publication::new();
        a.doi = Some("10.1234/ABC".to_string());
        let mut b = Publication::new();
        b.doi = Some("https://doi.org/10.1234/abc".to_string());
        assert!(a.shares_identity_with(&b));
    }

    #[test]
    fn no_identity_without_shared_id() {
        let mut a = Publication::new();
        a.pmid = Some("1".to_string());
        let mut b = Publication::new();
        b.pmid = Some("2".to_string());
        assert!(!a.shares_identity_with(&b));
    }

    #[test]
    fn url_classification() {
        assert_eq!(classify_url("https://host/paper.pdf"), UrlType::PdfDirect);
        assert_eq!(classify_url("https://host/pdf/123"), UrlType::PdfDirect);
        assert_eq!(classify_url("https://host/articles/PMC123"), UrlType::HtmlFulltext);
        assert_eq!(classify_url("https://doi.org/10.1234/x"), UrlType::LandingPage);
        assert_eq!(classify_url("https://host/whatever"), UrlType::Unknown);
    }
}
