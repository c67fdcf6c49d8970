//! Two-pass matching: a cheap label-only pass over everything, then a
//! detailed pass with full definitions for the most promising results.

use super::error::BatchResult;
use super::record::PackageRecord;
use super::sink::BatchSink;
use super::summary::RunSummary;
use super::BatchRunner;
use crate::matcher::OntologyMatcher;
use crate::oracle::MatchOracle;

/// The stages of an iterative run. Each persists to its own sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinementPass {
    /// Label-only candidates, every item.
    Simple,
    /// Full definitions, top-N items only.
    Detailed,
    /// Pass 1 with the detailed results merged in.
    Merged,
}

impl RefinementPass {
    /// File-name prefix for this pass's output.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Simple => "pass1_",
            Self::Detailed => "pass2_",
            Self::Merged => "",
        }
    }
}

pub struct IterativeRefiner<'m, 'a, O> {
    matcher: &'m OntologyMatcher<'a, O>,
    top_n: usize,
}

impl<'m, 'a, O: MatchOracle> IterativeRefiner<'m, 'a, O> {
    pub fn new(matcher: &'m OntologyMatcher<'a, O>, top_n: usize) -> Self {
        Self { matcher, top_n }
    }

    /// Run both passes. `sink_for` supplies the sink of each pass; the
    /// merged results and their summary go to the [`RefinementPass::Merged`]
    /// sink.
    pub fn run<S, F>(
        &self,
        items: &[PackageRecord],
        batch_size: usize,
        mut sink_for: F,
    ) -> BatchResult<Vec<PackageRecord>>
    where
        S: BatchSink,
        F: FnMut(RefinementPass) -> S,
    {
        tracing::info!(items = items.len(), top_n = self.top_n, "iterative pass 1: simple mode");
        let mut first = BatchRunner::new(self.matcher, sink_for(RefinementPass::Simple))
            .with_simple_mode(true);
        let mut merged = first.run(items, batch_size)?;
        let skipped = first.skipped();

        let picks = top_by_confidence(&merged, self.top_n);
        let subset: Vec<PackageRecord> = picks.iter().map(|&i| merged[i].clone()).collect();

        tracing::info!(items = subset.len(), "iterative pass 2: full definitions");
        let refined = BatchRunner::new(self.matcher, sink_for(RefinementPass::Detailed))
            .with_simple_mode(false)
            .run(&subset, batch_size)?;

        for (&i, record) in picks.iter().zip(refined) {
            merged[i] = record;
        }

        let mut sink = sink_for(RefinementPass::Merged);
        sink.write_consolidated(&merged)?;
        let summary = RunSummary::from_records(
            &merged,
            skipped,
            self.matcher.config().confidence_threshold,
        );
        sink.write_summary(&summary)?;
        tracing::info!(
            refined = picks.len(),
            matched = summary.matched,
            "iterative run complete"
        );
        Ok(merged)
    }
}

/// Positions of the `n` highest-confidence records, highest first; ties keep
/// input order.
fn top_by_confidence(records: &[PackageRecord], n: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, f64)> = records
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.edam_match().map(|m| (i, m.confidence_score)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.into_iter().take(n).map(|(i, _)| i).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::OntologyMatch;
    use crate::batch::JsonDirSink;
    use crate::config::MatcherConfig;
    use crate::oracle::{OracleRequest, OracleResult, RawMatchResult};
    use crate::vocab::{VocabularyOptions, VocabularyStore, VocabularyTerm};

    /// Confidence comes from the package name; detailed prompts (with
    /// definitions) score a fixed 0.99.
    struct ByName;

    impl MatchOracle for ByName {
        fn query(&self, request: &OracleRequest) -> OracleResult<RawMatchResult> {
            let detailed = request.candidate_terms_block.contains(": ");
            let confidence = if detailed {
                0.99
            } else {
                request.item_name.trim_start_matches('p').parse::<f64>().unwrap_or(0.0) / 10.0
            };
            Ok(RawMatchResult {
                id: "http://edamontology.org/topic_0203".into(),
                label: "Gene expression".into(),
                confidence,
                reasoning: String::new(),
            })
        }
    }

    fn with_confidence(confidence: f64) -> PackageRecord {
        PackageRecord::new("p", "d")
            .annotated(&OntologyMatch {
                confidence_score: confidence,
                ..OntologyMatch::fallback()
            })
            .unwrap()
    }

    #[test]
    fn top_n_orders_by_confidence_then_position() {
        let records = vec![
            with_confidence(0.4),
            with_confidence(0.9),
            PackageRecord::new("unmatched", "d"),
            with_confidence(0.4),
            with_confidence(0.7),
        ];
        assert_eq!(top_by_confidence(&records, 3), [1, 4, 0]);
        assert_eq!(top_by_confidence(&records, 10).len(), 4);
    }

    #[test]
    fn refines_top_results_and_keeps_order() {
        let store = VocabularyStore::from_terms(
            vec![VocabularyTerm::new("http://edamontology.org/topic_0203", "Gene expression")
                .with_definition("Expression of genes.")],
            &VocabularyOptions::default(),
        )
        .unwrap();
        let matcher = OntologyMatcher::new(&store, ByName, &MatcherConfig::default());
        let items: Vec<_> = ["p2", "p8", "p5", "p1"]
            .iter()
            .map(|n| PackageRecord::new(n, "gene expression"))
            .collect();

        let dir = tempfile::TempDir::new().unwrap();
        let base = JsonDirSink::create(dir.path()).unwrap();
        let out = IterativeRefiner::new(&matcher, 2)
            .run(&items, 3, |pass| base.with_prefix(pass.prefix()))
            .unwrap();

        let scores: Vec<f64> = out
            .iter()
            .map(|r| r.edam_match().unwrap().confidence_score)
            .collect();
        assert_eq!(scores, [0.2, 0.99, 0.99, 0.1]);
        assert_eq!(out[1].name(), Some("p8"));

        assert!(base.with_prefix("pass1_").batch_path(2).exists());
        assert!(base.with_prefix("pass2_").batch_path(1).exists());
        assert!(base.consolidated_path().exists());
        assert!(base.summary_path().exists());
    }
}
