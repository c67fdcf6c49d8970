//! Top-level error type for edam-match.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives. [`EdamError`] wraps them transparently so error codes and help
//! text reach the user unchanged.

use miette::Diagnostic;
use thiserror::Error;

use crate::batch::BatchError;
use crate::config::ConfigError;
use crate::oracle::OracleError;
use crate::vocab::VocabError;

#[derive(Debug, Error, Diagnostic)]
pub enum EdamError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Vocab(#[from] VocabError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Convenience alias for functions returning [`EdamError`].
pub type EdamResult<T> = std::result::Result<T, EdamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_pass_through() {
        let err: EdamError = VocabError::NotFound {
            path: "EDAM.csv".into(),
        }
        .into();
        assert_eq!(err.to_string(), "vocabulary file not found: EDAM.csv");
        assert_eq!(
            err.code().map(|c| c.to_string()).as_deref(),
            Some("edam::vocab::not_found")
        );
        assert!(err.help().is_some());
    }

    #[test]
    fn config_errors_convert() {
        let err: EdamError = ConfigError::Invalid {
            field: "batch_size".into(),
            message: "must be at least 1".into(),
        }
        .into();
        assert!(matches!(err, EdamError::Config(_)));
    }
}
