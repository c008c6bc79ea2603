//! Universal publication identifier (C10): ordered fallback over a publication's
//! known identifiers, producing a filesystem-safe filename, a cache key, and a
//! human display name.
//!
//! Grounded in the ordered fallback and sanitization rules of the original
//! Python `UniversalIdentifier`, with one deliberate divergence: slash
//! replacement uses a single underscore here, per this crate's filename
//! contract (the original used a double underscore).

use crate::model::Publication;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierType {
    Pmid,
    Doi,
    Pmcid,
    Arxiv,
    Biorxiv,
    Openalex,
    Core,
    Hash,
}

impl IdentifierType {
    fn tag(self) -> &'static str {
        match self {
            IdentifierType::Pmid => "pmid",
            IdentifierType::Doi => "doi",
            IdentifierType::Pmcid => "pmcid",
            IdentifierType::Arxiv => "arxiv",
            IdentifierType::Biorxiv => "biorxiv",
            IdentifierType::Openalex => "openalex",
            IdentifierType::Core => "core",
            IdentifierType::Hash => "hash",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "pmid" => IdentifierType::Pmid,
            "doi" => IdentifierType::Doi,
            "pmcid" => IdentifierType::Pmcid,
            "arxiv" => IdentifierType::Arxiv,
            "biorxiv" => IdentifierType::Biorxiv,
            "openalex" => IdentifierType::Openalex,
            "core" => IdentifierType::Core,
            "hash" => IdentifierType::Hash,
            _ => return None,
        })
    }
}

/// A publication's chosen identifier, with the original (unsanitized) value retained
/// for display.
#[derive(Debug, Clone)]
pub struct UniversalIdentifier {
    pub id_type: IdentifierType,
    pub raw_value: String,
}

const MAX_SANITIZED_LEN: usize = 100;

impl UniversalIdentifier {
    /// Pick the identifier for `publication` by the ordered fallback of §3 (or, with
    /// `prefer_doi`, a DOI-before-PMID variant).
    pub fn from_publication(publication: &Publication, prefer_doi: bool) -> Self {
        let pmid = publication.pmid.as_ref().filter(|s| !s.is_empty());
        let doi = publication.doi.as_ref().filter(|s| !s.is_empty());

        if prefer_doi {
            if let Some(doi) = doi {
                return Self::new(IdentifierType::Doi, doi.clone());
            }
            if let Some(pmid) = pmid {
                return Self::new(IdentifierType::Pmid, pmid.clone());
            }
        } else {
            if let Some(pmid) = pmid {
                return Self::new(IdentifierType::Pmid, pmid.clone());
            }
            if let Some(doi) = doi {
                return Self::new(IdentifierType::Doi, doi.clone());
            }
        }
        if let Some(pmcid) = publication.pmcid.as_ref().filter(|s| !s.is_empty()) {
            return Self::new(IdentifierType::Pmcid, pmcid.clone());
        }
        if let Some(arxiv) = publication.arxiv_id.as_ref().filter(|s| !s.is_empty()) {
            return Self::new(IdentifierType::Arxiv, arxiv.clone());
        }
        if is_biorxiv_like(publication) {
            if let Some(doi) = publication.doi.as_ref().filter(|s| !s.is_empty()) {
                return Self::new(IdentifierType::Biorxiv, doi.clone());
            }
        }
        if let Some(openalex) = publication.openalex_id.as_ref().filter(|s| !s.is_empty()) {
            return Self::new(IdentifierType::Openalex, openalex.clone());
        }
        if let Some(core) = publication.core_id.as_ref().filter(|s| !s.is_empty()) {
            return Self::new(IdentifierType::Core, core.clone());
        }
        let title = publication.title.clone().unwrap_or_default();
        Self::new(IdentifierType::Hash, hash_title(&title))
    }

    fn new(id_type: IdentifierType, raw_value: String) -> Self {
        Self { id_type, raw_value }
    }

    /// Sanitize for filesystem use: runs of anything other than `[A-Za-z0-9_-]` become a
    /// single `_`, collapsed, truncated to 100 characters.
    pub fn sanitized_value(&self) -> String {
        sanitize(&self.raw_value)
    }

    /// `<type>_<value>.pdf`
    pub fn filename(&self) -> String {
        format!("{}_{}.pdf", self.id_type.tag(), self.sanitized_value())
    }

    /// `<type>:<value>` using the original (unsanitized) value for DOI.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.id_type.tag(), self.raw_value)
    }

    /// Human-readable display, e.g. `PMID 12345`, `DOI 10.xxx/yyy`, `arXiv:yymm.nnnnn`.
    pub fn display_name(&self) -> String {
        match self.id_type {
            IdentifierType::Pmid => format!("PMID {}", self.raw_value),
            IdentifierType::Doi => format!("DOI {}", self.raw_value),
            IdentifierType::Pmcid => format!("PMCID {}", self.raw_value),
            IdentifierType::Arxiv => format!("arXiv:{}", self.raw_value),
            IdentifierType::Biorxiv => format!("bioRxiv DOI {}", self.raw_value),
            IdentifierType::Openalex => format!("OpenAlex {}", self.raw_value),
            IdentifierType::Core => format!("CORE {}", self.raw_value),
            IdentifierType::Hash => format!("HASH {}", self.raw_value),
        }
    }

    /// `display_name`, ellipsized to at most 30 characters.
    pub fn short_display(&self) -> String {
        let name = self.display_name();
        if name.chars().count() <= 30 {
            name
        } else {
            let truncated: String = name.chars().take(27).collect();
            format!("{truncated}...")
        }
    }

    /// Reverse operation: best-effort recovery of `(type, sanitized_value)` from a filename
    /// produced by [`UniversalIdentifier::filename`]. Lossy for DOI (sanitization collapses
    /// the `/` and `.` separators).
    pub fn parse_filename(name: &str) -> Option<(IdentifierType, String)> {
        let stem = name.strip_suffix(".pdf").unwrap_or(name);
        let (tag, value) = stem.split_once('_')?;
        let id_type = IdentifierType::from_tag(tag)?;
        Some((id_type, value.to_string()))
    }
}

fn is_biorxiv_like(publication: &Publication) -> bool {
    publication
        .journal
        .as_deref()
        .map(|j| {
            let j = j.to_lowercase();
            j.contains("biorxiv") || j.contains("medrxiv")
        })
        .unwrap_or(false)
}

fn hash_title(title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    let digest = hasher.finalize();
    hex_prefix(&digest, 16)
}

fn hex_prefix(bytes: &[u8], hex_chars: usize) -> String {
    let mut out = String::with_capacity(hex_chars);
    for byte in bytes {
        if out.len() >= hex_chars {
            break;
        }
        out.push_str(&format!("{byte:02x}"));
    }
    out.truncate(hex_chars);
    out
}

fn sanitize(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_was_replaced = false;
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            out.push(ch);
            last_was_replaced = false;
        } else if !last_was_replaced {
            out.push('_');
            last_was_replaced = true;
        }
    }
    let trimmed = out.trim_matches('_');
    let mut result = trimmed.to_string();
    result.truncate(MAX_SANITIZED_LEN);
    if result.is_empty() {
        "unknown".to_string()
    } else {
        result
    }
}
