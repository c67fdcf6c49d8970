//! Error types for batch processing and persistence.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum BatchError {
    #[error("failed to persist {path}")]
    #[diagnostic(
        code(edam::batch::persist),
        help(
            "Check free disk space and write permissions for the output directory. \
             Completed batch files are kept; rerun with --resume to continue."
        )
    )]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {what}: {message}")]
    #[diagnostic(code(edam::batch::serialize))]
    Serialize { what: String, message: String },

    #[error("failed to read input {path}: {message}")]
    #[diagnostic(
        code(edam::batch::input),
        help("The input must be a JSON array of objects with \"name\" and \"description\" fields.")
    )]
    Input { path: String, message: String },

    #[error("item {index} is missing field \"{field}\"")]
    #[diagnostic(
        code(edam::batch::missing_field),
        help("Items need a non-empty string \"name\" and a string \"description\".")
    )]
    MissingField { index: usize, field: String },
}

pub type BatchResult<T> = std::result::Result<T, BatchError>;
