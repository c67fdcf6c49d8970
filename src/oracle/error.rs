//! Rich diagnostic error types for oracle calls.

use miette::Diagnostic;
use thiserror::Error;

/// Errors from the semantic-reasoning oracle.
///
/// Only [`OracleError::RateLimited`] is transient; the client retries it with
/// backoff. Everything else skips the chunk that produced it.
#[derive(Debug, Error, Diagnostic)]
pub enum OracleError {
    #[error("oracle rate limit or quota reached: {message}")]
    #[diagnostic(
        code(edam::oracle::rate_limited),
        help("The request will be retried with backoff. Lower the request rate or raise the account quota.")
    )]
    RateLimited { message: String },

    #[error("oracle request failed: {message}")]
    #[diagnostic(
        code(edam::oracle::request_failed),
        help("Check the oracle base URL, network connectivity and that the model name is valid.")
    )]
    RequestFailed { message: String },

    #[error("oracle returned an invalid response: {message}")]
    #[diagnostic(
        code(edam::oracle::invalid_response),
        help(
            "The oracle must answer with a JSON object containing edam_id, edam_label, \
             confidence_score and reasoning."
        )
    )]
    InvalidResponse { message: String },

    #[error("API key environment variable {var} is not set")]
    #[diagnostic(
        code(edam::oracle::missing_api_key),
        help("Export the key, e.g. `export {var}=...`, or point `oracle.api_key_env` at another variable.")
    )]
    MissingApiKey { var: String },

    #[error("oracle still rate limited after {attempts} attempts: {message}")]
    #[diagnostic(
        code(edam::oracle::attempts_exhausted),
        help("The chunk is skipped. Increase max_retries or backoff_step_secs if this happens often.")
    )]
    AttemptsExhausted { attempts: u32, message: String },
}

impl OracleError {
    /// Whether the failure is a transient capacity signal worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Convenience alias for oracle results.
pub type OracleResult<T> = std::result::Result<T, OracleError>;
