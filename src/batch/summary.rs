//! Aggregate statistics for a finished run.

use serde::{Deserialize, Serialize};

use super::record::PackageRecord;
use crate::vocab::UNCLASSIFIED_ID;

/// Confidence at or above which a match counts as high.
pub const HIGH_CONFIDENCE: f64 = 0.8;

/// Counts over the annotated records of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_items: usize,
    pub matched: usize,
    pub skipped: usize,
    pub validated: usize,
    pub fallbacks: usize,
    /// `confidence >= 0.8`
    pub high_confidence: usize,
    /// `threshold <= confidence < 0.8`
    pub medium_confidence: usize,
    /// Below the threshold; candidates for a new vocabulary term.
    pub low_confidence: usize,
    pub average_confidence: f64,
    pub confidence_threshold: f64,
}

impl RunSummary {
    pub fn from_records(records: &[PackageRecord], skipped: usize, threshold: f64) -> Self {
        let mut summary = Self {
            total_items: records.len() + skipped,
            skipped,
            confidence_threshold: threshold,
            ..Default::default()
        };
        let mut confidence_sum = 0.0;

        for m in records.iter().filter_map(PackageRecord::edam_match) {
            summary.matched += 1;
            confidence_sum += m.confidence_score;
            if m.validated {
                summary.validated += 1;
            }
            if m.edam_id == UNCLASSIFIED_ID && !m.validated {
                summary.fallbacks += 1;
            }
            if m.confidence_score >= HIGH_CONFIDENCE {
                summary.high_confidence += 1;
            } else if m.needs_new_term(threshold) {
                summary.low_confidence += 1;
            } else {
                summary.medium_confidence += 1;
            }
        }

        if summary.matched > 0 {
            summary.average_confidence = confidence_sum / summary.matched as f64;
        }
        summary
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Packages:   {} matched, {} skipped", self.matched, self.skipped)?;
        writeln!(f, "Validated:  {}", self.validated)?;
        writeln!(f, "Fallbacks:  {}", self.fallbacks)?;
        writeln!(
            f,
            "Confidence: {} high, {} medium, {} low (avg {:.2})",
            self.high_confidence, self.medium_confidence, self.low_confidence, self.average_confidence
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::OntologyMatch;

    fn record(confidence: f64, validated: bool) -> PackageRecord {
        PackageRecord::new("p", "d")
            .annotated(&OntologyMatch {
                edam_id: "T".into(),
                edam_label: "L".into(),
                confidence_score: confidence,
                reasoning: String::new(),
                validated,
            })
            .unwrap()
    }

    #[test]
    fn buckets_by_confidence() {
        let records = vec![
            record(0.95, true),
            record(0.8, true),
            record(0.6, true),
            record(0.5, false),
            record(0.2, false),
            PackageRecord::new("p", "d")
                .annotated(&OntologyMatch::fallback())
                .unwrap(),
        ];
        let summary = RunSummary::from_records(&records, 2, 0.5);
        assert_eq!(summary.total_items, 8);
        assert_eq!(summary.matched, 6);
        assert_eq!(summary.validated, 3);
        assert_eq!(summary.fallbacks, 1);
        assert_eq!(summary.high_confidence, 2);
        assert_eq!(summary.medium_confidence, 2);
        assert_eq!(summary.low_confidence, 2);
        assert!((summary.average_confidence - 0.525).abs() < 1e-9);
    }

    #[test]
    fn empty_run() {
        let summary = RunSummary::from_records(&[], 0, 0.5);
        assert_eq!(summary.matched, 0);
        assert_eq!(summary.average_confidence, 0.0);
    }
}
