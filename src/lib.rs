// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # edam-match
//!
//! Annotates software packages with terms from the EDAM ontology. An
//! external reasoning oracle proposes a term for each package; every answer
//! is checked against the authoritative vocabulary and repaired when the id
//! and label disagree.
//!
//! ## Architecture
//!
//! - **Vocabulary** (`vocab`): CSV-loaded terms indexed by id, label and synonym
//! - **Ranking** (`ranker`): lexical shortlist of candidate terms
//! - **Chunking** (`chunker`): packs candidates under the oracle's token budget
//! - **Oracle** (`oracle`): chat-completions client with rate-limit backoff
//! - **Validation** (`validate`): id/label checks and repair
//! - **Matching** (`matcher`, `aggregate`): per-package pipeline, best-of-chunks
//! - **Batching** (`batch`): durable per-batch output, resume, iterative refinement
//!
//! ## Library usage
//!
//! ```no_run
//! use std::path::Path;
//! use edam_match::config::MatcherConfig;
//! use edam_match::matcher::OntologyMatcher;
//! use edam_match::oracle::OpenAiOracle;
//! use edam_match::vocab::VocabularyStore;
//!
//! let config = MatcherConfig::default();
//! let store = VocabularyStore::load(Path::new("EDAM.csv"), &config.vocabulary_options()).unwrap();
//! let oracle = OpenAiOracle::from_config(config.oracle.clone()).unwrap();
//! let matcher = OntologyMatcher::new(&store, oracle, &config);
//! let result = matcher.match_package("limma", "Linear models for microarray data");
//! println!("{} ({:.2})", result.edam_label, result.confidence_score);
//! ```

pub mod aggregate;
pub mod batch;
pub mod chunker;
pub mod config;
pub mod error;
pub mod matcher;
pub mod oracle;
pub mod ranker;
pub mod validate;
pub mod vocab;
