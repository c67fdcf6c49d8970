//! Per-package matching: candidate selection, chunked oracle queries,
//! validation and best-of-chunks aggregation.

use std::borrow::Cow;
use std::fmt;

use crate::aggregate::{MatchAggregator, OntologyMatch};
use crate::chunker::{CandidateFormat, Chunker, MatchCandidate};
use crate::config::{CandidateMode, MatcherConfig};
use crate::oracle::{MatchOracle, MatchOracleClient, RawMatchResult};
use crate::ranker::RelevanceRanker;
use crate::validate::Validator;
use crate::vocab::VocabularyStore;

/// Marker appended to descriptions cut at `max_description_chars`.
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated...]";

/// Where a single package is in the matching pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Pending,
    Ranking,
    Chunking,
    Querying { chunk: usize },
    Validating { chunk: usize },
    Aggregated,
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Ranking => write!(f, "ranking"),
            Self::Chunking => write!(f, "chunking"),
            Self::Querying { chunk } => write!(f, "querying[{chunk}]"),
            Self::Validating { chunk } => write!(f, "validating[{chunk}]"),
            Self::Aggregated => write!(f, "aggregated"),
        }
    }
}

/// Matches packages to vocabulary terms using an oracle.
pub struct OntologyMatcher<'a, O> {
    store: &'a VocabularyStore,
    client: MatchOracleClient<O>,
    config: MatcherConfig,
    ranker: RelevanceRanker<'a>,
    chunker: Chunker,
}

impl<'a, O: MatchOracle> OntologyMatcher<'a, O> {
    pub fn new(store: &'a VocabularyStore, oracle: O, config: &MatcherConfig) -> Self {
        let ranker = RelevanceRanker::new(
            store,
            config.candidates.scoring,
            config.candidate_format(config.simple_mode),
        );
        let chunker =
            Chunker::with_chars_per_token(config.effective_safe_tokens(), config.chars_per_token);
        Self {
            store,
            client: MatchOracleClient::new(oracle, config.retry_policy()),
            config: config.clone(),
            ranker,
            chunker,
        }
    }

    pub fn store(&self) -> &'a VocabularyStore {
        self.store
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn client(&self) -> &MatchOracleClient<O> {
        &self.client
    }

    /// Match one package using the configured candidate format.
    pub fn match_package(&self, name: &str, description: &str) -> OntologyMatch {
        self.match_package_with(name, description, self.config.simple_mode)
    }

    /// Match one package, choosing label-only (`simple_mode`) or full
    /// candidate entries. Never fails: if no chunk yields an answer the
    /// fallback match is returned.
    pub fn match_package_with(
        &self,
        name: &str,
        description: &str,
        simple_mode: bool,
    ) -> OntologyMatch {
        trace_phase(name, MatchPhase::Pending);
        let description = truncate_description(description, self.config.max_description_chars);

        trace_phase(name, MatchPhase::Ranking);
        let format = self.config.candidate_format(simple_mode);
        let candidates = self.candidates(&description, format);

        trace_phase(name, MatchPhase::Chunking);
        let chunks = self.chunker.chunk(&candidates, &description);
        let total = chunks.len();

        let validator = Validator::new(self.store);
        let mut aggregator = MatchAggregator::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let n = i + 1;
            trace_phase(name, MatchPhase::Querying { chunk: n });
            let raw = match self.client.query(name, &description, &chunk.text()) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(
                        package = name,
                        chunk = n,
                        chunks = total,
                        error = %e,
                        "chunk query failed, skipping"
                    );
                    continue;
                }
            };

            trace_phase(name, MatchPhase::Validating { chunk: n });
            aggregator.offer(resolve(&validator, name, raw));
        }

        if aggregator.offered() == 0 {
            tracing::warn!(package = name, chunks = total, "no chunk produced a match, using fallback");
        }
        let result = aggregator.finish();
        trace_phase(name, MatchPhase::Aggregated);
        tracing::debug!(
            package = name,
            edam_id = %result.edam_id,
            confidence = result.confidence_score,
            validated = result.validated,
            "package matched"
        );
        result
    }

    fn candidates(&self, description: &str, format: CandidateFormat) -> Vec<MatchCandidate> {
        match self.config.candidates.mode {
            CandidateMode::Full => self.store.active_terms().map(|t| format.format(t)).collect(),
            CandidateMode::Ranked => self.ranker.shortlist_as(
                description,
                self.config.candidates.top_k,
                self.config.candidates.fallback_sample,
                format,
            ),
        }
    }
}

/// Validate an oracle answer, repairing it once if needed.
///
/// The oracle only sees labels, so a label that names a known term decides
/// the id before validation.
fn resolve(validator: &Validator<'_>, package: &str, mut raw: RawMatchResult) -> OntologyMatch {
    if let Some((id, label)) = validator.normalize(&raw.label) {
        if id != raw.id {
            tracing::debug!(package, oracle_id = %raw.id, edam_id = %id, "id taken from label");
        }
        raw.id = id;
        raw.label = label;
    }
    let outcome = validator.validate(&raw.id, &raw.label);
    let (edam_id, edam_label, validated) = if outcome.is_valid {
        let (id, label) = validator.canonicalize(&raw.id, &raw.label);
        (id, label, true)
    } else {
        let (id, label) = validator.fix(&raw.id, &raw.label);
        let repaired = validator.validate(&id, &label);
        if repaired.is_valid {
            tracing::warn!(
                package,
                reason = %outcome.message,
                edam_id = %id,
                edam_label = %label,
                "oracle answer repaired"
            );
            (id, label, true)
        } else {
            tracing::warn!(
                package,
                reason = %outcome.message,
                "oracle answer could not be validated"
            );
            (raw.id, raw.label, false)
        }
    };
    OntologyMatch {
        edam_id,
        edam_label,
        confidence_score: raw.confidence,
        reasoning: raw.reasoning,
        validated,
    }
}

fn trace_phase(package: &str, phase: MatchPhase) {
    tracing::debug!(package, phase = %phase, "match phase");
}

/// Cut `description` to at most `max_chars` characters on a char boundary,
/// appending [`TRUNCATION_MARKER`].
pub fn truncate_description(description: &str, max_chars: usize) -> Cow<'_, str> {
    match description.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &description[..idx])),
        None => Cow::Borrowed(description),
    }
}
