//! Lexical relevance ranking of vocabulary terms against a description.
//!
//! Scores are word-set overlaps between the description and each term's
//! label, definition and synonyms. The ranker narrows thousands of terms to
//! a shortlist before any oracle call is made.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::chunker::{CandidateFormat, MatchCandidate};
use crate::vocab::{VocabularyStore, VocabularyTerm};

/// Scoring function for word-set overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankScoring {
    /// Size of the intersection.
    #[default]
    Overlap,
    /// Intersection over union.
    Jaccard,
}

/// A term with its relevance score.
#[derive(Debug, Clone)]
pub struct ScoredTerm<'a> {
    pub term: &'a VocabularyTerm,
    pub score: f64,
    /// Shared words, independent of the scoring function.
    pub overlap: usize,
}

/// Ranks active vocabulary terms by lexical overlap.
pub struct RelevanceRanker<'a> {
    store: &'a VocabularyStore,
    /// Active terms with their precomputed word sets, in vocabulary order.
    index: Vec<(&'a VocabularyTerm, HashSet<String>)>,
    scoring: RankScoring,
    format: CandidateFormat,
}

impl<'a> RelevanceRanker<'a> {
    pub fn new(store: &'a VocabularyStore, scoring: RankScoring, format: CandidateFormat) -> Self {
        let index = store
            .active_terms()
            .map(|term| (term, tokenize(&term.search_text())))
            .collect();
        Self {
            store,
            index,
            scoring,
            format,
        }
    }

    /// Scored terms with non-zero overlap, best first. Ties keep vocabulary
    /// order.
    pub fn rank_terms(&self, description: &str, top_k: usize) -> Vec<ScoredTerm<'a>> {
        let words = tokenize(description);
        if words.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<ScoredTerm<'a>> = self
            .index
            .iter()
            .filter_map(|(term, term_words)| {
                let overlap = words.intersection(term_words).count();
                if overlap == 0 {
                    return None;
                }
                let score = match self.scoring {
                    RankScoring::Overlap => overlap as f64,
                    RankScoring::Jaccard => {
                        let union = words.len() + term_words.len() - overlap;
                        overlap as f64 / union as f64
                    }
                };
                Some(ScoredTerm {
                    term: *term,
                    score,
                    overlap,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        scored
    }

    /// Formatted candidates for the `top_k` most relevant terms.
    pub fn rank(&self, description: &str, top_k: usize) -> Vec<MatchCandidate> {
        self.rank_terms(description, top_k)
            .into_iter()
            .map(|s| self.format.format(s.term))
            .collect()
    }

    /// Ranked candidates, or a category-balanced default sample of
    /// `fallback_size` terms when nothing overlaps.
    pub fn shortlist(
        &self,
        description: &str,
        top_k: usize,
        fallback_size: usize,
    ) -> Vec<MatchCandidate> {
        self.shortlist_as(description, top_k, fallback_size, self.format)
    }

    /// [`shortlist`](Self::shortlist) rendered with an explicit format.
    pub fn shortlist_as(
        &self,
        description: &str,
        top_k: usize,
        fallback_size: usize,
        format: CandidateFormat,
    ) -> Vec<MatchCandidate> {
        let ranked = self.rank_terms(description, top_k);
        if !ranked.is_empty() {
            return ranked.into_iter().map(|s| format.format(s.term)).collect();
        }
        tracing::debug!(fallback_size, "no lexical overlap, using default sample");
        self.store
            .default_sample(fallback_size)
            .into_iter()
            .map(|t| format.format(t))
            .collect()
    }
}

/// Case-folded, whitespace-separated words with surrounding punctuation
/// trimmed.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::VocabularyOptions;

    fn store() -> VocabularyStore {
        VocabularyStore::from_terms(
            vec![
                VocabularyTerm::new("topic_1", "Proteomics")
                    .with_definition("Protein identification and quantification."),
                VocabularyTerm::new("topic_2", "Gene expression").with_synonyms(["GEX"]),
                VocabularyTerm::new("operation_3", "Expression analysis")
                    .with_definition("Analyse gene expression profiles."),
                VocabularyTerm::new("data_4", "Sequence"),
                VocabularyTerm::new("topic_5", "Gene regulation"),
            ],
            &VocabularyOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn tokenize_folds_case_and_trims_punctuation() {
        let words = tokenize("Gene-expression, (RNA-seq) Analysis.");
        assert!(words.contains("gene-expression"));
        assert!(words.contains("rna-seq"));
        assert!(words.contains("analysis"));
        assert_eq!(words.len(), 3);
    }

    #[test]
    fn ranks_by_overlap_with_stable_ties() {
        let store = store();
        let ranker = RelevanceRanker::new(&store, RankScoring::Overlap, CandidateFormat::default());
        let ranked = ranker.rank_terms("this tool performs gene expression analysis", 10);
        let ids: Vec<_> = ranked.iter().map(|s| s.term.id.as_str()).collect();
        // operation_3 shares gene/expression/analysis; topic_2 shares two words.
        assert_eq!(ids, vec!["operation_3", "topic_2", "topic_5"]);
        assert_eq!(ranked[1].overlap, 2);
    }

    #[test]
    fn top_k_limits_results() {
        let store = store();
        let ranker = RelevanceRanker::new(&store, RankScoring::Overlap, CandidateFormat::default());
        assert_eq!(ranker.rank("gene expression", 1).len(), 1);
    }

    #[test]
    fn jaccard_prefers_tighter_terms() {
        let store = store();
        let ranker = RelevanceRanker::new(&store, RankScoring::Jaccard, CandidateFormat::default());
        let ranked = ranker.rank_terms("gene expression", 10);
        // "Gene expression GEX" is a closer set than the longer definition.
        assert_eq!(ranked[0].term.id, "topic_2");
        assert!(ranked[0].score <= 1.0);
    }

    #[test]
    fn zero_overlap_is_excluded() {
        let store = store();
        let ranker = RelevanceRanker::new(&store, RankScoring::Overlap, CandidateFormat::default());
        assert!(ranker.rank("metabolomics imaging", 10).is_empty());
        assert!(ranker.rank("", 10).is_empty());
    }

    #[test]
    fn shortlist_falls_back_to_default_sample() {
        let store = store();
        let ranker = RelevanceRanker::new(&store, RankScoring::Overlap, CandidateFormat::default());
        let shortlist = ranker.shortlist("metabolomics imaging", 10, 3);
        let ids: Vec<_> = shortlist.iter().map(|c| c.term_id.as_str()).collect();
        assert_eq!(ids, vec!["topic_1", "operation_3", "data_4"]);
    }
}
