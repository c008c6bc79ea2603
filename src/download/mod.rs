//! Download manager (C9): waterfall through candidate URLs, validating and
//! atomically writing whichever one succeeds first.

use crate::config::DownloaderConfig;
use crate::error::{Error, Result};
use crate::identifier::UniversalIdentifier;
use crate::model::{DownloadResult, Publication, SourceUrl, UrlType};
use crate::resilience::retry::{retry, ErrorKind};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

const PDF_HEADER: &[u8] = b"%PDF";
const PDF_TRAILER: &[u8] = b"%%EOF";
const TRAILER_SEARCH_WINDOW: usize = 1024;

#[derive(Clone)]
pub struct DownloadManager {
    client: Client,
    config: DownloaderConfig,
}

/// Filename a publication's PDF is written under, via C10's full identifier
/// fallback (PMID → DOI → PMCID → arXiv → bioRxiv → OpenAlex → CORE → hash) —
/// never just the narrower PMID/DOI/PMCID `canonical_id()`, so publications
/// known only by e.g. an arXiv or OpenAlex id still get a distinct filename.
fn target_filename(publication: &Publication) -> String {
    UniversalIdentifier::from_publication(publication, false).filename()
}

fn validate_pdf_bytes(bytes: &[u8], config: &DownloaderConfig) -> Result<()> {
    if (bytes.len() as u64) < config.min_pdf_size {
        return Err(Error::Validation { subject: "pdf".to_string(), reason: format!("file too small: {} bytes", bytes.len()) });
    }
    if (bytes.len() as u64) > config.max_pdf_size {
        return Err(Error::Validation { subject: "pdf".to_string(), reason: format!("file too large: {} bytes", bytes.len()) });
    }
    if !bytes.starts_with(PDF_HEADER) {
        return Err(Error::Validation { subject: "pdf".to_string(), reason: "missing %PDF header".to_string() });
    }
    let tail_start = bytes.len().saturating_sub(TRAILER_SEARCH_WINDOW);
    let tail = &bytes[tail_start..];
    if !tail.windows(PDF_TRAILER.len()).any(|w| w == PDF_TRAILER) {
        return Err(Error::Validation { subject: "pdf".to_string(), reason: "missing %%EOF trailer".to_string() });
    }
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

impl DownloadManager {
    pub fn new(config: DownloaderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("citation-discovery-core/0.1")
            .build()
            .map_err(Error::Http)?;
        Ok(Self { client, config })
    }

    fn extract_pdf_link(html: &str, base_url: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let selector = Selector::parse("a[href*='.pdf'], meta[name='citation_pdf_url']").ok()?;
        document.select(&selector).find_map(|el| {
            let raw = el.value().attr("href").or_else(|| el.value().attr("content"))?;
            Some(if raw.starts_with("http") {
                raw.to_string()
            } else if let Some(rest) = raw.strip_prefix("//") {
                format!("https:{rest}")
            } else {
                reqwest::Url::parse(base_url).ok()?.join(raw).ok().map(|u| u.to_string())?
            })
        })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<(Vec<u8>, String)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Error::Http)?
            .error_for_status()
            .map_err(Error::Http)?;
        let content_type = response.headers().get(reqwest::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("").to_string();
        let bytes = response.bytes().await.map_err(Error::Http)?;
        Ok((bytes.to_vec(), content_type))
    }

    /// Resolve one candidate URL to validated PDF bytes, following an HTML
    /// landing page to its embedded PDF link when necessary.
    async fn resolve_one(&self, url: &SourceUrl) -> Result<Vec<u8>> {
        let (bytes, content_type) = self.fetch_bytes(&url.url).await?;

        if url.url_type == UrlType::PdfDirect || content_type.contains("pdf") {
            validate_pdf_bytes(&bytes, &self.config)?;
            return Ok(bytes);
        }

        // HtmlFulltext / LandingPage: parse for an embedded PDF link.
        let html = String::from_utf8_lossy(&bytes);
        let Some(pdf_link) = Self::extract_pdf_link(&html, &url.url) else {
            return Err(Error::NotFound(format!("no embedded pdf link found on {}", url.url)));
        };
        let (pdf_bytes, _) = self.fetch_bytes(&pdf_link).await?;
        validate_pdf_bytes(&pdf_bytes, &self.config)?;
        Ok(pdf_bytes)
    }

    async fn write_atomically(&self, output_dir: &Path, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(output_dir).await.map_err(Error::Io)?;
        let final_path = output_dir.join(filename);
        let temp_path = output_dir.join(format!("{filename}.part"));

        let mut file = tokio::fs::File::create(&temp_path).await.map_err(Error::Io)?;
        file.write_all(bytes).await.map_err(Error::Io)?;
        file.flush().await.map_err(Error::Io)?;
        drop(file);

        tokio::fs::rename(&temp_path, &final_path).await.map_err(Error::Io)?;
        Ok(final_path)
    }

    /// Skip the download if `output_dir/<filename>` already exists and still
    /// validates as a PDF (§4.9's idempotency rule).
    async fn already_downloaded(&self, path: &Path) -> Option<Vec<u8>> {
        let bytes = tokio::fs::read(path).await.ok()?;
        validate_pdf_bytes(&bytes, &self.config).ok()?;
        Some(bytes)
    }

    pub async fn download_with_fallback(
        &self,
        publication: &Publication,
        urls: &[SourceUrl],
        output_dir: &Path,
    ) -> DownloadResult {
        let filename = target_filename(publication);
        let final_path = output_dir.join(&filename);

        if let Some(bytes) = self.already_downloaded(&final_path).await {
            debug!("skipping already-downloaded {}", final_path.display());
            return DownloadResult {
                success: true,
                local_path: Some(final_path.to_string_lossy().to_string()),
                byte_size: Some(bytes.len() as u64),
                source: Some("cache".to_string()),
                sha256: Some(sha256_hex(&bytes)),
                error: None,
            };
        }

        let mut sorted: Vec<&SourceUrl> = urls.iter().collect();
        sorted.sort_by(|a, b| (a.url_type, a.priority).cmp(&(b.url_type, b.priority)));

        let mut last_error: Option<String> = None;
        for candidate in sorted {
            let source = candidate.source.clone();
            let result = retry(
                || self.resolve_one(candidate),
                self.config.max_retries,
                Duration::from_millis(500),
                Duration::from_secs(30),
                &[ErrorKind::Network, ErrorKind::Timeout, ErrorKind::RateLimit],
            )
            .await;

            match result {
                Ok(bytes) => match self.write_atomically(output_dir, &filename, &bytes).await {
                    Ok(path) => {
                        return DownloadResult {
                            success: true,
                            local_path: Some(path.to_string_lossy().to_string()),
                            byte_size: Some(bytes.len() as u64),
                            source: Some(source),
                            sha256: Some(sha256_hex(&bytes)),
                            error: None,
                        };
                    }
                    Err(error) => {
                        warn!("failed to persist download from {source}: {error}");
                        last_error = Some(error.to_string());
                    }
                },
                Err(error) => {
                    debug!("candidate url from {source} failed: {error}");
                    last_error = Some(error.to_string());
                }
            }
        }

        DownloadResult::failure(last_error.unwrap_or_else(|| "no candidate url available".to_string()))
    }

    /// Download every `(publication, urls)` item, bounded to `config.max_concurrent`
    /// concurrent downloads at once (§4.9/§5's "3-5" global download concurrency).
    pub async fn download_batch(
        &self,
        items: &[(Publication, Vec<SourceUrl>)],
        output_dir: &Path,
    ) -> DownloadReport {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));

        let mut tasks = Vec::with_capacity(items.len());
        for (publication, urls) in items {
            let manager = self.clone();
            let publication = publication.clone();
            let urls = urls.clone();
            let output_dir = output_dir.to_path_buf();
            let semaphore = semaphore.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                manager.download_with_fallback(&publication, &urls, &output_dir).await
            }));
        }

        let mut successful = 0;
        let mut failed = 0;
        let mut total_size_mb = 0.0;
        let mut by_source: HashMap<String, usize> = HashMap::new();
        let mut per_result = Vec::with_capacity(items.len());

        for task in tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(join_error) => {
                    warn!("download task panicked: {join_error}");
                    DownloadResult::failure(join_error.to_string())
                }
            };
            if result.success {
                successful += 1;
                if let Some(size) = result.byte_size {
                    total_size_mb += size as f64 / (1024.0 * 1024.0);
                }
                if let Some(source) = &result.source {
                    *by_source.entry(source.clone()).or_insert(0) += 1;
                }
            } else {
                failed += 1;
            }
            per_result.push(result);
        }

        DownloadReport { successful, failed, total_size_mb, by_source, per_result }
    }

    /// `<root>/<accession>` for a dataset-centric layout, `<root>` for a flat one (§6.2).
    pub fn resolve_output_dir(&self, root: &Path, accession: Option<&str>) -> PathBuf {
        match accession {
            Some(accession) => root.join(accession),
            None => root.to_path_buf(),
        }
    }

    /// Write `<root>/<accession>_mapping.json`, the dataset → publication mapping
    /// required by §6.2, covering every successfully downloaded entry in `results`.
    /// Written atomically: temp file then rename, same as `write_atomically` above.
    pub async fn write_mapping(
        &self,
        root: &Path,
        accession: &str,
        timestamp: &str,
        results: &[(Publication, DownloadResult)],
    ) -> Result<PathBuf> {
        let pdfs: Vec<MappingPdfEntry> = results
            .iter()
            .filter(|(_, result)| result.success)
            .map(|(publication, result)| MappingPdfEntry {
                identifier: UniversalIdentifier::from_publication(publication, false).cache_key(),
                title: publication.title.clone(),
                path: result.local_path.clone().unwrap_or_default(),
                source: result.source.clone(),
                size: result.byte_size,
            })
            .collect();

        let mapping = DatasetMapping { accession: accession.to_string(), timestamp: timestamp.to_string(), pdfs };
        let encoded = serde_json::to_vec_pretty(&mapping).map_err(Error::Serde)?;

        tokio::fs::create_dir_all(root).await.map_err(Error::Io)?;
        let final_path = root.join(format!("{accession}_mapping.json"));
        let temp_path = root.join(format!("{accession}_mapping.json.part"));
        tokio::fs::write(&temp_path, &encoded).await.map_err(Error::Io)?;
        tokio::fs::rename(&temp_path, &final_path).await.map_err(Error::Io)?;
        Ok(final_path)
    }
}

/// One entry in a [`DatasetMapping`]'s `pdfs` list (§6.2).
#[derive(Debug, Clone, Serialize)]
struct MappingPdfEntry {
    identifier: String,
    title: Option<String>,
    path: String,
    source: Option<String>,
    size: Option<u64>,
}

/// `<accession>_mapping.json`'s on-disk shape (§6.2).
#[derive(Debug, Clone, Serialize)]
struct DatasetMapping {
    accession: String,
    timestamp: String,
    pdfs: Vec<MappingPdfEntry>,
}

#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub successful: usize,
    pub failed: usize,
    pub total_size_mb: f64,
    pub by_source: HashMap<String, usize>,
    pub per_result: Vec<DownloadResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pdf_bytes(size: usize) -> Vec<u8> {
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.resize(size.saturating_sub(PDF_TRAILER.len()), b'x');
        bytes.extend_from_slice(PDF_TRAILER);
        bytes
    }

    #[test]
    fn validates_well_formed_pdf() {
        let config = DownloaderConfig { min_pdf_size: 10, max_pdf_size: 1_000_000, ..DownloaderConfig::default() };
        let bytes = sample_pdf_bytes(2048);
        assert!(validate_pdf_bytes(&bytes, &config).is_ok());
    }

    #[test]
    fn rejects_missing_header() {
        let config = DownloaderConfig { min_pdf_size: 10, max_pdf_size: 1_000_000, ..DownloaderConfig::default() };
        let bytes = b"not a pdf at all but long enough to pass the size check............".to_vec();
        assert!(validate_pdf_bytes(&bytes, &config).is_err());
    }

    #[test]
    fn rejects_missing_trailer_outside_window() {
        let config = DownloaderConfig { min_pdf_size: 10, max_pdf_size: 1_000_000, ..DownloaderConfig::default() };
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.extend_from_slice(PDF_TRAILER);
        bytes.resize(bytes.len() + 2048, b'x');
        assert!(validate_pdf_bytes(&bytes, &config).is_err());
    }

    #[test]
    fn rejects_undersized_file() {
        let config = DownloaderConfig { min_pdf_size: 10_240, ..DownloaderConfig::default() };
        let bytes = sample_pdf_bytes(100);
        assert!(validate_pdf_bytes(&bytes, &config).is_err());
    }

    #[tokio::test]
    async fn download_with_fallback_reports_failure_with_no_urls() {
        let manager = DownloadManager::new(DownloaderConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let result = manager.download_with_fallback(&Publication::default(), &[], dir.path()).await;
        assert!(!result.success);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn already_downloaded_pdf_is_reused_without_refetching() {
        let manager = DownloadManager::new(DownloaderConfig { min_pdf_size: 10, ..DownloaderConfig::default() }).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut publication = Publication::default();
        publication.pmid = Some("123".to_string());
        let filename = target_filename(&publication);
        tokio::fs::write(dir.path().join(&filename), sample_pdf_bytes(2048)).await.unwrap();

        let result = manager.download_with_fallback(&publication, &[], dir.path()).await;
        assert!(result.success);
        assert_eq!(result.source.as_deref(), Some("cache"));
    }

    #[tokio::test]
    async fn download_batch_preserves_input_order_under_concurrency() {
        let manager = DownloadManager::new(DownloaderConfig { min_pdf_size: 10, max_concurrent: 2, ..DownloaderConfig::default() }).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let mut items = Vec::new();
        for i in 0..5 {
            let mut publication = Publication::default();
            publication.pmid = Some(i.to_string());
            let filename = target_filename(&publication);
            tokio::fs::write(dir.path().join(&filename), sample_pdf_bytes(2048)).await.unwrap();
            items.push((publication, Vec::new()));
        }

        let report = manager.download_batch(&items, dir.path()).await;
        assert_eq!(report.successful, 5);
        assert_eq!(report.failed, 0);
        assert_eq!(report.per_result.len(), 5);
        for (i, result) in report.per_result.iter().enumerate() {
            let expected = target_filename(&items[i].0);
            assert!(result.local_path.as_deref().unwrap().ends_with(&expected));
        }
    }

    #[test]
    fn resolve_output_dir_nests_under_accession() {
        let manager = DownloadManager::new(DownloaderConfig::default()).unwrap();
        let root = Path::new("/tmp/root");
        assert_eq!(manager.resolve_output_dir(root, Some("GSE12345")), root.join("GSE12345"));
        assert_eq!(manager.resolve_output_dir(root, None), root);
    }

    #[tokio::test]
    async fn write_mapping_lists_only_successful_downloads() {
        let manager = DownloadManager::new(DownloaderConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let mut ok_pub = Publication::default();
        ok_pub.pmid = Some("1".to_string());
        ok_pub.title = Some("A paper".to_string());
        let ok_result = DownloadResult {
            success: true,
            local_path: Some(dir.path().join("pmid_1.pdf").to_string_lossy().to_string()),
            byte_size: Some(2048),
            source: Some("pubmed".to_string()),
            sha256: Some("deadbeef".to_string()),
            error: None,
        };
        let failed_result = DownloadResult::failure("no candidate url available");

        let results = vec![(ok_pub, ok_result), (Publication::default(), failed_result)];
        let path = manager.write_mapping(dir.path(), "GSE12345", "2026-07-27T00:00:00Z", &results).await.unwrap();

        assert_eq!(path, dir.path().join("GSE12345_mapping.json"));
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["accession"], "GSE12345");
        assert_eq!(parsed["pdfs"].as_array().unwrap().len(), 1);
        assert_eq!(parsed["pdfs"][0]["title"], "A paper");
    }
}
