//! Rich diagnostic error types for vocabulary loading.

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while loading the controlled vocabulary.
///
/// Every variant is fatal at startup: the matcher never runs against a
/// partially loaded vocabulary.
#[derive(Debug, Error, Diagnostic)]
pub enum VocabError {
    #[error("vocabulary file not found: {path}")]
    #[diagnostic(
        code(edam::vocab::not_found),
        help("Download EDAM.csv from https://edamontology.org and pass its path with --vocab.")
    )]
    NotFound { path: String },

    #[error("failed to read vocabulary source {origin}")]
    #[diagnostic(
        code(edam::vocab::io),
        help("Check that the file is readable and not locked by another process.")
    )]
    Io {
        origin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed vocabulary CSV in {origin}: {message}")]
    #[diagnostic(
        code(edam::vocab::malformed),
        help(
            "The vocabulary must be a comma-separated file with a header row. \
             Re-export it from the ontology browser or fix the offending line."
        )
    )]
    Malformed { origin: String, message: String },

    #[error("vocabulary is missing required column \"{column}\"")]
    #[diagnostic(
        code(edam::vocab::missing_column),
        help(
            "Required columns are the term identifier (\"Class ID\" or \"id\") \
             and the preferred label (\"Preferred Label\" or \"label\")."
        )
    )]
    MissingColumn { column: String },

    #[error("duplicate term id \"{id}\" among active terms")]
    #[diagnostic(
        code(edam::vocab::duplicate_id),
        help("Each non-obsolete term must have a unique identifier. Remove or obsolete the duplicate row.")
    )]
    DuplicateId { id: String },

    #[error("vocabulary {origin} contains no active terms")]
    #[diagnostic(
        code(edam::vocab::empty),
        help("Every row is either obsolete or lacks an id/label. Check the Obsolete column.")
    )]
    Empty { origin: String },
}

/// Convenience alias for vocabulary results.
pub type VocabResult<T> = std::result::Result<T, VocabError>;
