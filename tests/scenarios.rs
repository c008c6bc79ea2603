//! End-to-end scenarios S1-S6.

use chrono::NaiveDate;
use citation_discovery_core::dedup::{deduplicate, DedupConfig};
use citation_discovery_core::download::DownloadManager;
use citation_discovery_core::identifier::UniversalIdentifier;
use citation_discovery_core::model::{Publication, SourceUrl, UrlType};
use citation_discovery_core::resilience::{retry, ErrorKind, FallbackChain};
use citation_discovery_core::{Error, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn publication(pmid: Option<&str>, doi: Option<&str>, title: &str, year: i32, citations: u64) -> Publication {
    Publication {
        pmid: pmid.map(str::to_string),
        doi: doi.map(str::to_string),
        title: Some(title.to_string()),
        authors: vec!["Smith J".to_string(), "Jones A".to_string()],
        publication_date: NaiveDate::from_ymd_opt(year, 1, 1),
        citations,
        ..Publication::default()
    }
}

/// S1: two records for the same paper - one known only by pmid, the other
/// only by a shared doi, with matching title/authors/year - collapse to one
/// survivor carrying both identifiers and the higher citation count.
#[test]
fn s1_dedup_by_identity() {
    let p1 = publication(Some("12345678"), Some("10.1234/abc"), "CRISPR editing", 2023, 0);
    let p2 = publication(None, Some("10.1234/abc"), "CRISPR editing", 2023, 150);

    let result = deduplicate(vec![p1, p2], &DedupConfig::default());

    assert_eq!(result.publications.len(), 1);
    let survivor = &result.publications[0];
    assert_eq!(survivor.pmid.as_deref(), Some("12345678"));
    assert_eq!(survivor.doi.as_deref(), Some("10.1234/abc"));
    assert_eq!(survivor.citations, 150);
}

/// S2: a preprint/published pair with the same title and authors, within year
/// tolerance, collapses to a single survivor carrying the published identity
/// (§8 S2: "output = [PB]"), with the pairing recorded alongside the merge.
#[test]
fn s2_fuzzy_dedup_preprint_vs_published() {
    let mut preprint = publication(None, None, "Novel CRISPR application", 2023, 0);
    preprint.journal = Some("bioRxiv".to_string());
    let mut published = publication(Some("99999999"), None, "Novel CRISPR application", 2024, 0);
    published.journal = Some("Nature".to_string());

    let config = DedupConfig { title_threshold: 85.0, author_threshold: 80.0, year_tolerance: 1 };
    let result = deduplicate(vec![preprint, published.clone()], &config);

    assert_eq!(result.publications.len(), 1);
    assert_eq!(result.pairs.len(), 1);
    let kept_published = &result.publications[result.pairs[0].published_index];
    assert_eq!(kept_published.pmid.as_deref(), published.pmid.as_deref());
    assert_eq!(kept_published.journal.as_deref(), Some("Nature"));
}

/// S3: a strategy that rate-limits once (with a 1s retry-after hint) then
/// succeeds is retried exactly once more, and the elapsed time reflects the
/// hinted delay. Going through `retry` directly (not `FallbackChain`) keeps
/// `fallback_used` at zero since there's only one strategy in play.
#[tokio::test]
async fn s3_retry_then_succeed_respects_retry_after() {
    let attempts = Arc::new(AtomicU32::new(0));
    let attempts_clone = attempts.clone();

    let started = Instant::now();
    let result: Result<&'static str> = retry(
        move || {
            let attempts = attempts_clone.clone();
            async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                if attempt == 0 {
                    Err(Error::RateLimitExceeded { retry_after: Duration::from_secs(1) })
                } else {
                    Ok("ok")
                }
            }
        },
        3,
        Duration::from_millis(10),
        Duration::from_secs(5),
        &[ErrorKind::RateLimit],
    )
    .await;

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() >= Duration::from_secs(1));

    let chain = FallbackChain::new(Duration::from_millis(10), Duration::from_secs(5), vec![ErrorKind::RateLimit]);
    let chain_attempts = Arc::new(AtomicU32::new(0));
    let chain_attempts_clone = chain_attempts.clone();
    let outcome: Result<&'static str> = chain
        .execute(vec![(
            "primary".to_string(),
            0,
            3,
            move || {
                let attempts = chain_attempts_clone.clone();
                async move {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                    if attempt == 0 {
                        Err(Error::RateLimitExceeded { retry_after: Duration::from_millis(10) })
                    } else {
                        Ok("ok")
                    }
                }
            },
        )])
        .await;
    assert_eq!(outcome.unwrap(), "ok");
    assert_eq!(chain.stats().fallback_used, 0);
}

/// S4: candidate URLs sort by `(url_type, priority)` ascending, so two
/// `PdfDirect` entries come first ordered by priority, then the single
/// `HtmlFulltext`, then the `LandingPage`, regardless of input order.
#[test]
fn s4_url_type_ordering() {
    let mut urls = vec![
        SourceUrl::new("https://doi.org/landing1", "crossref", 5),
        SourceUrl::new("https://pdf1.pdf", "pmc", 2),
        SourceUrl::new("https://host/articles/x.full", "biorxiv", 7),
        SourceUrl::new("https://pdf2.pdf", "institutional", 1),
    ];
    urls.sort_by(|a, b| (a.url_type, a.priority).cmp(&(b.url_type, b.priority)));

    let ordered: Vec<&str> = urls.iter().map(|u| u.url.as_str()).collect();
    assert_eq!(
        ordered,
        vec!["https://pdf2.pdf", "https://pdf1.pdf", "https://host/articles/x.full", "https://doi.org/landing1"]
    );
    assert_eq!(urls[0].url_type, UrlType::PdfDirect);
    assert_eq!(urls[2].url_type, UrlType::HtmlFulltext);
    assert_eq!(urls[3].url_type, UrlType::LandingPage);
}

/// S5: a body of `b"Not a PDF"` sitting at the target path is not accepted as
/// an already-downloaded PDF and the attempt fails for lack of any other
/// candidate; a well-formed `%PDF...%%EOF` body at that same path is reused
/// as a successful download. `validate_pdf_bytes` itself is private, so this
/// exercises the same byte-shape contract through the public download API.
#[tokio::test]
async fn s5_pdf_validation() {
    use citation_discovery_core::config::DownloaderConfig;

    let config = DownloaderConfig { min_pdf_size: 10, ..DownloaderConfig::default() };
    let manager = DownloadManager::new(config).unwrap();

    let mut publication = Publication::new();
    publication.pmid = Some("555".to_string());

    let dir = tempfile::tempdir().unwrap();
    // download_with_fallback's filename comes from UniversalIdentifier's own
    // fallback, same as s6_identifier_from_doi_only_publication below.
    let filename = UniversalIdentifier::from_publication(&publication, false).filename();
    tokio::fs::write(dir.path().join(&filename), b"Not a PDF").await.unwrap();

    let rejected = manager.download_with_fallback(&publication, &[], dir.path()).await;
    assert!(!rejected.success);

    let mut valid = b"%PDF-1.4\n".to_vec();
    valid.extend(std::iter::repeat(b'x').take(20_000));
    valid.extend_from_slice(b"\n%%EOF");
    tokio::fs::write(dir.path().join(&filename), &valid).await.unwrap();

    let accepted = manager.download_with_fallback(&publication, &[], dir.path()).await;
    assert!(accepted.success);
    assert_eq!(accepted.source.as_deref(), Some("cache"));
}

/// S6: a DOI-only publication produces the documented filename, cache key,
/// and display name.
#[test]
fn s6_identifier_from_doi_only_publication() {
    let mut publication = Publication::new();
    publication.doi = Some("10.1234/example.paper".to_string());
    publication.title = Some("X".to_string());

    let id = UniversalIdentifier::from_publication(&publication, false);

    assert_eq!(id.filename(), "doi_10_1234_example_paper.pdf");
    assert_eq!(id.cache_key(), "doi:10.1234/example.paper");
    assert_eq!(id.display_name(), "DOI 10.1234/example.paper");
}
