//! Controlled vocabulary: term model, CSV loading and lookup indexes.
//!
//! The vocabulary is the authority every oracle answer is checked against.
//! Obsolete terms are kept in a full table for forensic lookups but never
//! take part in matching.

pub mod error;
pub mod store;
pub mod term;

pub use error::{VocabError, VocabResult};
pub use store::{SynonymCollisionPolicy, VocabularyOptions, VocabularyStore};
pub use term::{TermCategory, VocabularyTerm};

/// Id of the "unclassified" sentinel term returned when no chunk yields a
/// usable match.
pub const UNCLASSIFIED_ID: &str = "http://edamontology.org/topic_3365";

/// Label of the "unclassified" sentinel term.
pub const UNCLASSIFIED_LABEL: &str = "Data architecture, analysis and design";
