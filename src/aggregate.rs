//! Best-of-chunks reduction for one package.

use serde::{Deserialize, Serialize};

use crate::vocab::{UNCLASSIFIED_ID, UNCLASSIFIED_LABEL};

/// Confidence reported with the fallback match.
pub const FALLBACK_CONFIDENCE: f64 = 0.1;

/// The final match for one package, as persisted under `edam_match`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntologyMatch {
    pub edam_id: String,
    pub edam_label: String,
    pub confidence_score: f64,
    pub reasoning: String,
    /// Whether the id/label pair agrees with the vocabulary, directly or
    /// after repair.
    pub validated: bool,
}

impl OntologyMatch {
    /// The deterministic "unclassified" result used when no chunk produced
    /// an answer.
    pub fn fallback() -> Self {
        Self {
            edam_id: UNCLASSIFIED_ID.to_string(),
            edam_label: UNCLASSIFIED_LABEL.to_string(),
            confidence_score: FALLBACK_CONFIDENCE,
            reasoning: "No valid match was found in any chunk.".to_string(),
            validated: false,
        }
    }

    /// Whether this match is weak enough that a new vocabulary term should
    /// be considered.
    pub fn needs_new_term(&self, threshold: f64) -> bool {
        self.confidence_score < threshold
    }
}

/// Keeps the highest-confidence match seen for a single package.
#[derive(Debug, Default)]
pub struct MatchAggregator {
    best: Option<OntologyMatch>,
    offered: usize,
}

impl MatchAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a chunk's match. It replaces the current best only if its
    /// confidence is strictly higher, so ties keep the earliest.
    pub fn offer(&mut self, candidate: OntologyMatch) {
        self.offered += 1;
        let replace = match &self.best {
            Some(best) => candidate.confidence_score > best.confidence_score,
            None => true,
        };
        if replace {
            self.best = Some(candidate);
        }
    }

    /// Number of matches offered so far.
    pub fn offered(&self) -> usize {
        self.offered
    }

    pub fn best(&self) -> Option<&OntologyMatch> {
        self.best.as_ref()
    }

    /// The best match, or [`OntologyMatch::fallback`] if nothing was offered.
    pub fn finish(self) -> OntologyMatch {
        self.best.unwrap_or_else(OntologyMatch::fallback)
    }
}
