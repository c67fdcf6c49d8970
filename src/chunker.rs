//! Candidate formatting and budget-bounded chunking.
//!
//! The oracle's input window cannot hold the whole vocabulary, so candidate
//! entries are packed greedily into chunks whose combined size, together
//! with the package description, stays under a token budget. Entries are
//! never split, and the chunks concatenate back to the input in order.

use serde::{Deserialize, Serialize};

use crate::vocab::VocabularyTerm;

/// A vocabulary entry formatted for an oracle prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCandidate {
    pub term_id: String,
    pub formatted_description: String,
}

/// How candidate entries are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandidateFormat {
    /// Label only, no definitions.
    pub simple_mode: bool,
    /// Append the synonym list (ignored in simple mode).
    pub include_synonyms: bool,
}

impl CandidateFormat {
    /// Render one term as `label: definition`.
    pub fn format(&self, term: &VocabularyTerm) -> MatchCandidate {
        let mut text = term.preferred_label.clone();
        if !self.simple_mode {
            if let Some(def) = &term.definition {
                text.push_str(": ");
                text.push_str(def);
            }
            if self.include_synonyms && !term.synonyms.is_empty() {
                text.push_str(" (Synonyms: ");
                text.push_str(&term.synonyms.join("|"));
                text.push(')');
            }
        }
        MatchCandidate {
            term_id: term.id.clone(),
            formatted_description: text,
        }
    }
}

/// Converts between text and an approximate token count.
///
/// Implement this to swap in a real tokenizer without touching the chunker.
pub trait TokenEstimator: Send + Sync {
    /// Estimated tokens for `text`.
    fn tokens(&self, text: &str) -> usize;

    /// Characters that fit in `tokens` tokens.
    fn chars_for(&self, tokens: usize) -> usize;
}

/// Fixed characters-per-token approximation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharsPerToken(pub usize);

impl Default for CharsPerToken {
    fn default() -> Self {
        Self(4)
    }
}

impl TokenEstimator for CharsPerToken {
    fn tokens(&self, text: &str) -> usize {
        text.chars().count() / self.0.max(1)
    }

    fn chars_for(&self, tokens: usize) -> usize {
        tokens.saturating_mul(self.0.max(1))
    }
}

/// A group of candidates sent to the oracle in one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    pub entries: Vec<MatchCandidate>,
}

impl Chunk {
    /// Newline-delimited candidate block for the oracle prompt.
    pub fn text(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.formatted_description.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Characters this chunk counts against the budget.
    pub fn budget_len(&self) -> usize {
        self.entries.iter().map(entry_cost).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Budget-bounded chunker.
pub struct Chunker<E: TokenEstimator = CharsPerToken> {
    estimator: E,
    /// Token ceiling for candidates plus description.
    safe_tokens: usize,
}

impl Chunker<CharsPerToken> {
    pub fn with_chars_per_token(safe_tokens: usize, chars_per_token: usize) -> Self {
        Self::new(CharsPerToken(chars_per_token), safe_tokens)
    }
}

impl<E: TokenEstimator> Chunker<E> {
    pub fn new(estimator: E, safe_tokens: usize) -> Self {
        Self {
            estimator,
            safe_tokens,
        }
    }

    /// Character budget left for candidates once `description` is accounted for.
    pub fn budget_for(&self, description: &str) -> usize {
        let description_tokens = self.estimator.tokens(description);
        self.estimator
            .chars_for(self.safe_tokens.saturating_sub(description_tokens))
    }

    /// Split `entries` into chunks that fit the budget left by `description`.
    pub fn chunk(&self, entries: &[MatchCandidate], description: &str) -> Vec<Chunk> {
        let budget = self.budget_for(description);
        let chunks = chunk_by_budget(entries, budget);
        tracing::debug!(
            entries = entries.len(),
            budget,
            chunks = chunks.len(),
            "candidates chunked"
        );
        chunks
    }
}

/// Cost of one entry: its length plus the joining newline.
fn entry_cost(entry: &MatchCandidate) -> usize {
    entry.formatted_description.chars().count() + 1
}

/// Greedy packing: append while `running + cost <= budget`, otherwise close
/// the chunk. An entry larger than the budget gets a chunk of its own.
pub fn chunk_by_budget(entries: &[MatchCandidate], budget: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = Chunk::default();
    let mut running = 0usize;

    for entry in entries {
        let cost = entry_cost(entry);
        if running + cost > budget && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            running = 0;
        }
        current.entries.push(entry.clone());
        running += cost;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
