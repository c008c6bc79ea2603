//! Quality validator (C6): a weighted multi-criterion score in [0, 1] plus a
//! classification band used to decide whether a publication is worth keeping.

pub use crate::config::QualityLevel;
use crate::config::QualityWeights;
use crate::model::Publication;
use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendedAction {
    Include,
    IncludeWithWarning,
    Exclude,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub score: f64,
    pub level: QualityLevel,
    pub metadata_completeness: f64,
    pub content_quality: f64,
    pub journal_quality: f64,
    pub temporal_relevance: f64,
    pub critical_issues: Vec<String>,
}

impl QualityAssessment {
    pub fn recommended_action(&self) -> RecommendedAction {
        let has_critical = !self.critical_issues.is_empty();
        match self.level {
            QualityLevel::Excellent | QualityLevel::Good => RecommendedAction::Include,
            QualityLevel::Acceptable if has_critical => RecommendedAction::IncludeWithWarning,
            QualityLevel::Acceptable => RecommendedAction::Include,
            QualityLevel::Poor | QualityLevel::Rejected => RecommendedAction::Exclude,
        }
    }
}

fn default_predatory_patterns() -> Vec<Regex> {
    ["(?i)predatory", "(?i)international journal of advanced research in"]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
}

fn default_high_quality_journals() -> Vec<&'static str> {
    vec!["nature", "science", "cell", "the lancet", "new england journal of medicine", "nature medicine", "nature genetics"]
}

pub struct QualityValidator {
    weights: QualityWeights,
    predatory_patterns: Vec<Regex>,
    high_quality_journals: Vec<String>,
    allow_preprints: bool,
}

impl QualityValidator {
    pub fn new(weights: QualityWeights) -> Self {
        Self {
            weights,
            predatory_patterns: default_predatory_patterns(),
            high_quality_journals: default_high_quality_journals().into_iter().map(str::to_string).collect(),
            allow_preprints: true,
        }
    }

    pub fn with_predatory_patterns(mut self, patterns: Vec<Regex>) -> Self {
        self.predatory_patterns = patterns;
        self
    }

    pub fn with_high_quality_journals(mut self, journals: Vec<String>) -> Self {
        self.high_quality_journals = journals;
        self
    }

    fn years_old(date: Option<NaiveDate>) -> Option<i32> {
        date.map(|d| Utc::now().year() - d.year())
    }

    fn metadata_completeness(&self, publication: &Publication) -> f64 {
        let mut score = 0.0;
        if publication.title.as_deref().is_some_and(|t| !t.trim().is_empty()) {
            score += 0.20;
        }
        if publication.abstract_text.as_deref().is_some_and(|a| a.len() >= self.weights.min_abstract_length) {
            score += 0.35;
        }
        if !publication.authors.is_empty() {
            score += 0.20;
        }
        if publication.publication_date.is_some() {
            score += 0.15;
        }
        if publication.journal.as_deref().is_some_and(|j| !j.trim().is_empty()) {
            score += 0.10;
        }
        score
    }

    fn citation_score(&self, publication: &Publication, years_old: Option<i32>) -> f64 {
        let citations = publication.citations;
        match years_old {
            Some(y) if y < 2 => {
                if citations >= self.weights.min_citations_recent { 1.0 } else { citations as f64 / self.weights.min_citations_recent.max(1) as f64 }
            }
            Some(y) if y <= 5 => {
                if citations >= self.weights.min_citations_older { 1.0 } else { citations as f64 / self.weights.min_citations_older.max(1) as f64 }
            }
            Some(_) => {
                if citations >= 20 { 1.0 } else { citations as f64 / 20.0 }
            }
            None => {
                if citations > 0 { 0.5 } else { 0.0 }
            }
        }
        .min(1.0)
    }

    fn content_quality(&self, publication: &Publication, years_old: Option<i32>) -> f64 {
        let abstract_len = publication.abstract_text.as_deref().map_or(0, str::len);
        let length_score = match abstract_len {
            0 => 0.0,
            n if n < 100 => 0.3,
            n if n < 250 => 0.7,
            n if n <= 2500 => 1.0,
            _ => 0.8,
        };
        let citation_component = self.citation_score(publication, years_old);
        let indexed_terms = if !publication.mesh_terms.is_empty() || !publication.keywords.is_empty() { 1.0 } else { 0.0 };

        0.40 * length_score + 0.40 * citation_component + 0.20 * indexed_terms
    }

    fn journal_quality(&self, publication: &Publication) -> f64 {
        let Some(journal) = publication.journal.as_deref() else { return 0.5 };
        let lower = journal.to_lowercase();

        if self.predatory_patterns.iter().any(|p| p.is_match(&lower)) {
            return 0.2;
        }
        if self.high_quality_journals.iter().any(|j| lower.contains(j.as_str())) {
            return 1.0;
        }
        let is_preprint = ["biorxiv", "medrxiv", "arxiv", "preprint"].iter().any(|m| lower.contains(m));
        if is_preprint && self.allow_preprints {
            return 0.6;
        }
        if publication.pmid.is_some() {
            return 0.7;
        }
        0.5
    }

    fn temporal_relevance(&self, years_old: Option<i32>) -> f64 {
        match years_old {
            Some(y) if y < 0 => 0.5,
            Some(y) if y <= 2 => 1.0,
            Some(y) if y <= 5 => 0.8,
            Some(y) if y <= 10 => 0.5,
            Some(y) if y <= 15 => 0.3,
            Some(_) => 0.1,
            None => 0.3,
        }
    }

    fn critical_issues(&self, publication: &Publication, journal_quality: f64) -> Vec<String> {
        let mut issues = Vec::new();
        if publication.title.is_none() {
            issues.push("missing title".to_string());
        }
        if publication.abstract_text.as_deref().is_none_or(str::is_empty) {
            issues.push("missing abstract".to_string());
        }
        if journal_quality <= 0.2 {
            issues.push("predatory journal pattern match".to_string());
        }
        issues
    }

    fn classify(&self, score: f64, critical_count: usize) -> QualityLevel {
        if critical_count >= 2 {
            return QualityLevel::Rejected;
        }
        if score >= self.weights.excellent_threshold && critical_count == 0 {
            QualityLevel::Excellent
        } else if score >= self.weights.good_threshold && critical_count == 0 {
            QualityLevel::Good
        } else if score >= self.weights.acceptable_threshold && critical_count <= 1 {
            QualityLevel::Acceptable
        } else if score >= self.weights.min_quality_score {
            QualityLevel::Poor
        } else {
            QualityLevel::Rejected
        }
    }

    pub fn assess(&self, publication: &Publication) -> QualityAssessment {
        let years_old = Self::years_old(publication.publication_date);
        let metadata_completeness = self.metadata_completeness(publication);
        let content_quality = self.content_quality(publication, years_old);
        let journal_quality = self.journal_quality(publication);
        let temporal_relevance = self.temporal_relevance(years_old);

        let score = self.weights.metadata_completeness * metadata_completeness
            + self.weights.content_quality * content_quality
            + self.weights.journal_quality * journal_quality
            + self.weights.temporal_relevance * temporal_relevance;

        let critical_issues = self.critical_issues(publication, journal_quality);
        let level = self.classify(score, critical_issues.len());

        QualityAssessment {
            score,
            level,
            metadata_completeness,
            content_quality,
            journal_quality,
            temporal_relevance,
            critical_issues,
        }
    }

    /// Assess every publication and keep only those at or above `min_level`.
    pub fn filter_by_quality(
        &self,
        publications: Vec<Publication>,
        min_level: QualityLevel,
    ) -> (Vec<Publication>, Vec<QualityAssessment>) {
        let assessments: Vec<QualityAssessment> = publications.iter().map(|p| self.assess(p)).collect();
        let survivors = publications
            .into_iter()
            .zip(assessments.iter())
            .filter(|(_, assessment)| assessment.level >= min_level)
            .map(|(p, _)| p)
            .collect();
        (survivors, assessments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityWeights;
    use chrono::NaiveDate;

    fn rich_publication() -> Publication {
        Publication {
            title: Some("A landmark study".to_string()),
            abstract_text: Some("x".repeat(300)),
            authors: vec!["Jane Doe".to_string()],
            journal: Some("Nature".to_string()),
            publication_date: NaiveDate::from_ymd_opt(Utc::now().naive_utc().year(), 1, 1),
            citations: 50,
            mesh_terms: vec!["Genomics".to_string()],
            ..Publication::default()
        }
    }

    #[test]
    fn rich_recent_publication_scores_excellent() {
        let validator = QualityValidator::new(QualityWeights::default());
        let assessment = validator.assess(&rich_publication());
        assert_eq!(assessment.level, QualityLevel::Excellent);
        assert!(assessment.critical_issues.is_empty());
    }

    #[test]
    fn missing_title_and_abstract_is_rejected() {
        let validator = QualityValidator::new(QualityWeights::default());
        let publication = Publication::default();
        let assessment = validator.assess(&publication);
        assert_eq!(assessment.critical_issues.len(), 2);
        assert_eq!(assessment.level, QualityLevel::Rejected);
    }

    #[test]
    fn predatory_journal_pattern_forces_low_journal_score() {
        let validator = QualityValidator::new(QualityWeights::default());
        let mut publication = rich_publication();
        publication.journal = Some("Predatory Journal of Science".to_string());
        let assessment = validator.assess(&publication);
        assert!((assessment.journal_quality - 0.2).abs() < 1e-9);
        assert!(assessment.critical_issues.iter().any(|i| i.contains("predatory")));
    }

    #[test]
    fn filter_by_quality_drops_rejected_entries() {
        let validator = QualityValidator::new(QualityWeights::default());
        let (survivors, assessments) =
            validator.filter_by_quality(vec![rich_publication(), Publication::default()], QualityLevel::Poor);
        assert_eq!(survivors.len(), 1);
        assert_eq!(assessments.len(), 2);
    }

    #[test]
    fn recommended_action_matches_band() {
        let validator = QualityValidator::new(QualityWeights::default());
        let excellent = validator.assess(&rich_publication());
        assert_eq!(excellent.recommended_action(), RecommendedAction::Include);
    }
}
