//! Deduplicator (C5): an exact-id pass followed by a fuzzy title/author/date
//! pass, each survivor built from a completeness-weighted merge of its
//! duplicates.

use crate::model::Publication;
use strsim::normalized_levenshtein;

#[derive(Debug, Clone)]
pub struct DedupConfig {
    pub title_threshold: f64,
    pub author_threshold: f64,
    pub year_tolerance: i32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { title_threshold: 85.0, author_threshold: 80.0, year_tolerance: 1 }
    }
}

/// A `(preprint, published)` pair identified by §4.5's auxiliary pairing rule.
/// Both indices point at the single surviving entry the pair was merged into.
#[derive(Debug, Clone)]
pub struct PreprintPair {
    pub preprint_index: usize,
    pub published_index: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DedupResult {
    pub publications: Vec<Publication>,
    pub pairs: Vec<PreprintPair>,
}

const PREPRINT_MARKERS: &[&str] = &["biorxiv", "medrxiv", "arxiv", "preprint"];

fn normalize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_space = false;
    for ch in title.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim().to_string()
}

/// Similarity ratio in [0, 100] over two already-normalized strings.
fn similarity_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    normalized_levenshtein(a, b) * 100.0
}

fn completeness_score(publication: &Publication) -> i64 {
    let mut score = 0i64;
    if publication.pmid.is_some() {
        score += 100;
    }
    if publication.pmcid.is_some() {
        score += 50;
    }
    if publication.doi.is_some() {
        score += 30;
    }
    if publication.abstract_text.as_deref().is_some_and(|a| !a.trim().is_empty()) {
        score += 20;
    }
    score += 2 * publication.authors.len() as i64;
    if publication.journal.is_some() {
        score += 10;
    }
    if publication.publication_date.is_some() {
        score += 10;
    }
    if !publication.mesh_terms.is_empty() {
        score += 15;
    }
    if !publication.keywords.is_empty() {
        score += 10;
    }
    if publication.citations > 0 {
        score += 5;
    }
    score
}

/// Merge `loser` into `survivor`, filling any field missing on the survivor
/// (per §4.5.2's "fields missing on the survivor are filled from the loser").
fn merge_into(survivor: &mut Publication, loser: &Publication) {
    macro_rules! fill {
        ($field:ident) => {
            if survivor.$field.is_none() {
                survivor.$field = loser.$field.clone();
            }
        };
    }
    fill!(pmid);
    fill!(doi);
    fill!(pmcid);
    fill!(arxiv_id);
    fill!(openalex_id);
    fill!(core_id);
    fill!(title);
    fill!(abstract_text);
    fill!(journal);
    fill!(publication_date);
    fill!(landing_url);
    fill!(pdf_url);

    if survivor.authors.is_empty() {
        survivor.authors = loser.authors.clone();
    }
    if survivor.keywords.is_empty() {
        survivor.keywords = loser.keywords.clone();
    }
    if survivor.mesh_terms.is_empty() {
        survivor.mesh_terms = loser.mesh_terms.clone();
    }
    if loser.citations > survivor.citations {
        survivor.citations = loser.citations;
    }
    for provenance in &loser.source_provenance {
        if !survivor.source_provenance.contains(provenance) {
            survivor.source_provenance.push(provenance.clone());
        }
    }
    for (key, value) in &loser.metadata {
        survivor.metadata.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

/// Merge `incoming` into `existing` in place, keeping whichever has the higher
/// completeness score as the base and filling gaps from the other.
fn merge_duplicate(existing: &mut Publication, incoming: &Publication) {
    if completeness_score(incoming) > completeness_score(existing) {
        let mut merged = incoming.clone();
        merge_into(&mut merged, existing);
        *existing = merged;
    } else {
        merge_into(existing, incoming);
    }
}

fn author_last_name(author: &str) -> String {
    author.split_whitespace().last().unwrap_or(author).to_lowercase()
}

fn first_author_similar(a: &Publication, b: &Publication, threshold: f64) -> bool {
    match (a.authors.first(), b.authors.first()) {
        (Some(x), Some(y)) => similarity_ratio(&author_last_name(x), &author_last_name(y)) >= threshold,
        _ => false,
    }
}

fn author_set_similar(a: &Publication, b: &Publication, threshold: f64) -> bool {
    let set_a: Vec<String> = a.authors.iter().take(5).map(|s| author_last_name(s)).collect();
    let set_b: Vec<String> = b.authors.iter().take(5).map(|s| author_last_name(s)).collect();
    if set_a.is_empty() || set_b.is_empty() {
        return false;
    }
    let matched = set_a
        .iter()
        .filter(|x| set_b.iter().any(|y| similarity_ratio(x, y) >= threshold))
        .count();
    let denom = set_a.len().max(set_b.len());
    (matched as f64 / denom as f64) * 100.0 >= threshold
}

fn years_apart(a: &Publication, b: &Publication) -> Option<i32> {
    match (a.publication_date, b.publication_date) {
        (Some(x), Some(y)) => Some((x.format("%Y").to_string().parse::<i32>().unwrap_or(0)
            - y.format("%Y").to_string().parse::<i32>().unwrap_or(0))
        .abs()),
        _ => None,
    }
}

fn is_fuzzy_duplicate(a: &Publication, b: &Publication, config: &DedupConfig) -> bool {
    let (Some(title_a), Some(title_b)) = (a.title.as_deref(), b.title.as_deref()) else {
        return false;
    };
    let ratio = similarity_ratio(&normalize_title(title_a), &normalize_title(title_b));
    if ratio < config.title_threshold {
        return false;
    }

    if !a.authors.is_empty() && !b.authors.is_empty() {
        let ordered_ok = first_author_similar(a, b, config.author_threshold);
        let set_ok = author_set_similar(a, b, config.author_threshold);
        if !(ordered_ok && set_ok) {
            return false;
        }
    }

    if let Some(diff) = years_apart(a, b) {
        if diff > config.year_tolerance {
            return false;
        }
    }

    true
}

fn is_preprint(publication: &Publication) -> bool {
    let journal = publication.journal.as_deref().unwrap_or("").to_lowercase();
    PREPRINT_MARKERS.iter().any(|marker| journal.contains(marker))
}

/// Run both dedup passes over `publications`, preserving input order among
/// survivors, and report any preprint/published pairs found among them.
pub fn deduplicate(publications: Vec<Publication>, config: &DedupConfig) -> DedupResult {
    let mut by_canonical_id: Vec<(String, usize)> = Vec::new();
    let mut survivors: Vec<Publication> = Vec::new();

    for publication in publications {
        if let Some(id) = publication.canonical_id() {
            if let Some((_, index)) = by_canonical_id.iter().find(|(existing_id, _)| existing_id == &id) {
                merge_duplicate(&mut survivors[*index], &publication);
                continue;
            }
            by_canonical_id.push((id, survivors.len()));
            survivors.push(publication);
            continue;
        }

        // No identifier at all: fall through to the fuzzy pass below.
        survivors.push(publication);
    }

    // A preprint and its published version are genuine fuzzy-duplicates and are
    // collapsed to a single survivor like any other fuzzy duplicate, with the
    // preprint/published relationship recorded as a pair alongside the merge.
    let mut deduped: Vec<Publication> = Vec::new();
    let mut pairs = Vec::new();
    'outer: for candidate in survivors {
        let candidate_is_preprint = is_preprint(&candidate);
        for (kept_index, kept) in deduped.iter_mut().enumerate() {
            if candidate.has_identifier() && kept.has_identifier() && candidate.canonical_id() == kept.canonical_id()
            {
                // Already unified by the exact-id pass above.
                continue;
            }
            if !is_fuzzy_duplicate(kept, &candidate, config) {
                continue;
            }

            let kept_is_preprint = is_preprint(kept);
            if candidate_is_preprint != kept_is_preprint {
                pairs.push(PreprintPair { preprint_index: kept_index, published_index: kept_index });
            }

            merge_duplicate(kept, &candidate);
            continue 'outer;
        }
        deduped.push(candidate);
    }

    DedupResult { publications: deduped, pairs }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pub_with(pmid: Option<&str>, title: &str) -> Publication {
        Publication { pmid: pmid.map(str::to_string), title: Some(title.to_string()), ..Publication::default() }
    }

    #[test]
    fn exact_id_pass_drops_later_occurrence() {
        let a = pub_with(Some("100"), "A study");
        let mut b = pub_with(Some("100"), "A study");
        b.abstract_text = Some("richer abstract".to_string());

        let result = deduplicate(vec![a, b], &DedupConfig::default());
        assert_eq!(result.publications.len(), 1);
        assert_eq!(result.publications[0].abstract_text.as_deref(), Some("richer abstract"));
    }

    #[test]
    fn fuzzy_pass_merges_near_identical_titles_without_ids() {
        let a = pub_with(None, "Deep learning for gene expression analysis");
        let b = pub_with(None, "Deep learning for gene expression analysis.");

        let result = deduplicate(vec![a, b], &DedupConfig::default());
        assert_eq!(result.publications.len(), 1);
    }

    #[test]
    fn year_mismatch_beyond_tolerance_keeps_both() {
        use chrono::NaiveDate;
        let mut a = pub_with(None, "Deep learning for gene expression analysis");
        a.publication_date = NaiveDate::from_ymd_opt(2015, 1, 1);
        let mut b = pub_with(None, "Deep learning for gene expression analysis");
        b.publication_date = NaiveDate::from_ymd_opt(2020, 1, 1);

        let result = deduplicate(vec![a, b], &DedupConfig::default());
        assert_eq!(result.publications.len(), 2);
    }

    #[test]
    fn completeness_score_favors_richer_record() {
        let mut rich = pub_with(Some("1"), "T");
        rich.pmcid = Some("PMC1".to_string());
        rich.doi = Some("10.1/x".to_string());
        let sparse = pub_with(Some("1"), "T");

        assert!(completeness_score(&rich) > completeness_score(&sparse));
    }

    #[test]
    fn preprint_published_pair_merged_to_single_survivor() {
        let mut preprint = pub_with(None, "Single cell atlas of liver regeneration");
        preprint.journal = Some("bioRxiv".to_string());
        let mut published = pub_with(Some("100"), "Single cell atlas of liver regeneration");
        published.journal = Some("Nature Medicine".to_string());

        let result = deduplicate(vec![preprint, published], &DedupConfig::default());
        assert_eq!(result.publications.len(), 1);
        assert_eq!(result.pairs.len(), 1);
        assert_eq!(result.pairs[0].preprint_index, 0);
        assert_eq!(result.pairs[0].published_index, 0);
        assert_eq!(result.publications[0].journal.as_deref(), Some("Nature Medicine"));
        assert_eq!(result.publications[0].pmid.as_deref(), Some("100"));
    }
}
