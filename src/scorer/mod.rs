//! Relevance scorer (C7): how well a publication matches the dataset it was
//! retrieved for, as a weighted blend of four independent sub-scores.

use crate::config::ScorerWeights;
use crate::model::{Dataset, Publication};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strsim::normalized_levenshtein;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceScore {
    pub total: f64,
    pub content_similarity: f64,
    pub keyword_match: f64,
    pub recency: f64,
    pub citation_count: f64,
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "this", "that", "are", "was", "were", "been", "have",
    "has", "had", "not", "but", "can", "will", "using", "used", "use", "into", "over", "such",
    "than", "then", "their", "these", "those", "its", "our", "which", "who", "also", "may",
    "more", "most", "between", "within", "among", "via", "per",
];

fn extract_keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .map(str::to_lowercase)
        .filter(|word| word.len() >= 3 && !STOPWORDS.contains(&word.as_str()))
        .take(20)
        .collect()
}

fn recency_score(years_old: Option<i32>) -> f64 {
    match years_old {
        Some(y) if y < 0 => 1.0,
        Some(0) => 1.0,
        Some(1) => 0.9,
        Some(2) => 0.8,
        Some(3) => 0.7,
        Some(4) => 0.6,
        Some(5) => 0.4,
        Some(6) => 0.2,
        Some(y) => 0.2 * 0.7f64.powi(y - 6),
        None => 0.3,
    }
}

fn citation_score(citations: u64) -> f64 {
    ((citations as f64 + 1.0).log10() / 4.0).clamp(0.0, 1.0)
}

pub struct RelevanceScorer {
    weights: ScorerWeights,
}

impl RelevanceScorer {
    pub fn new(weights: ScorerWeights) -> Self {
        Self { weights }
    }

    fn content_similarity(&self, publication: &Publication, dataset: &Dataset) -> f64 {
        let dataset_text = format!("{} {}", dataset.title, dataset.summary).to_lowercase();
        let publication_text = format!(
            "{} {}",
            publication.title.as_deref().unwrap_or(""),
            publication.abstract_text.as_deref().unwrap_or("")
        )
        .to_lowercase();

        if dataset_text.trim().is_empty() || publication_text.trim().is_empty() {
            return 0.0;
        }
        normalized_levenshtein(&dataset_text, &publication_text)
    }

    fn keyword_match(&self, publication: &Publication, dataset: &Dataset) -> f64 {
        let dataset_text = format!("{} {}", dataset.title, dataset.summary);
        let dataset_keywords = extract_keywords(&dataset_text);
        if dataset_keywords.is_empty() {
            return 0.0;
        }

        let publication_text = format!(
            "{} {} {}",
            publication.title.as_deref().unwrap_or(""),
            publication.abstract_text.as_deref().unwrap_or(""),
            publication.keywords.join(" ")
        );
        let publication_keywords = extract_keywords(&publication_text);

        let matched = dataset_keywords.intersection(&publication_keywords).count();
        matched as f64 / dataset_keywords.len() as f64
    }

    fn years_old(publication: &Publication) -> Option<i32> {
        publication.publication_date.map(|d| Utc::now().year() - d.year())
    }

    pub fn score(&self, publication: &Publication, dataset: &Dataset) -> RelevanceScore {
        let content_similarity = self.content_similarity(publication, dataset);
        let keyword_match = self.keyword_match(publication, dataset);
        let recency = recency_score(Self::years_old(publication));
        let citation_count = citation_score(publication.citations);

        let total = self.weights.content_similarity * content_similarity
            + self.weights.keyword_match * keyword_match
            + self.weights.recency * recency
            + self.weights.citation_count * citation_count;

        RelevanceScore { total, content_similarity, keyword_match, recency, citation_count }
    }

    /// Score every publication against `dataset` and sort descending by total relevance.
    pub fn rank_by_relevance(
        &self,
        publications: Vec<Publication>,
        dataset: &Dataset,
    ) -> Vec<(Publication, RelevanceScore)> {
        let mut scored: Vec<(Publication, RelevanceScore)> = publications
            .into_iter()
            .map(|publication| {
                let score = self.score(&publication, dataset);
                (publication, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.total.partial_cmp(&a.1.total).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dataset() -> Dataset {
        Dataset {
            accession: "GSE123".to_string(),
            title: "Single-cell RNA sequencing of liver regeneration".to_string(),
            summary: "We profile hepatocyte regeneration using single-cell transcriptomics."
                .to_string(),
            primary_pmids: vec![],
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let w = ScorerWeights::default();
        let total = w.content_similarity + w.keyword_match + w.recency + w.citation_count;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn closely_matching_publication_scores_higher_than_unrelated_one() {
        let scorer = RelevanceScorer::new(ScorerWeights::default());

        let mut relevant = Publication::default();
        relevant.title = Some("Single-cell transcriptomics of hepatocyte regeneration".to_string());
        relevant.abstract_text = Some("Liver regeneration profiled via single-cell RNA sequencing.".to_string());
        relevant.publication_date = NaiveDate::from_ymd_opt(Utc::now().year(), 1, 1);
        relevant.citations = 40;

        let mut unrelated = Publication::default();
        unrelated.title = Some("Structural analysis of ribosomal proteins in yeast".to_string());
        unrelated.abstract_text = Some("We analyze ribosome assembly in S. cerevisiae.".to_string());
        unrelated.publication_date = NaiveDate::from_ymd_opt(Utc::now().year() - 25, 1, 1);

        let relevant_score = scorer.score(&relevant, &dataset());
        let unrelated_score = scorer.score(&unrelated, &dataset());
        assert!(relevant_score.total > unrelated_score.total);
    }

    #[test]
    fn citation_score_is_logarithmic_and_clamped() {
        assert!((citation_score(0) - 0.0).abs() < 1e-9);
        assert!(citation_score(9999) <= 1.0);
        assert!(citation_score(100) > citation_score(10));
    }

    #[test]
    fn recency_score_prefers_newer_publications() {
        assert!(recency_score(Some(1)) > recency_score(Some(8)));
        assert!(recency_score(Some(8)) > recency_score(Some(30)));
    }

    #[test]
    fn recency_score_matches_bucket_table() {
        assert_eq!(recency_score(Some(-1)), 1.0);
        assert_eq!(recency_score(Some(0)), 1.0);
        assert_eq!(recency_score(Some(1)), 0.9);
        assert_eq!(recency_score(Some(2)), 0.8);
        assert_eq!(recency_score(Some(3)), 0.7);
        assert_eq!(recency_score(Some(4)), 0.6);
        assert_eq!(recency_score(Some(5)), 0.4);
        assert_eq!(recency_score(Some(6)), 0.2);
        assert!((recency_score(Some(7)) - 0.2 * 0.7).abs() < 1e-9);
        assert_eq!(recency_score(None), 0.3);
    }

    #[test]
    fn rank_by_relevance_sorts_descending() {
        let scorer = RelevanceScorer::new(ScorerWeights::default());
        let mut high = Publication::default();
        high.title = Some("Single-cell RNA sequencing of liver regeneration".to_string());
        high.citations = 100;
        let mut low = Publication::default();
        low.title = Some("Unrelated topic entirely".to_string());

        let ranked = scorer.rank_by_relevance(vec![low, high], &dataset());
        assert_eq!(ranked[0].0.title.as_deref(), Some("Single-cell RNA sequencing of liver regeneration"));
    }
}
