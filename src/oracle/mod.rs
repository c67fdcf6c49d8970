//! Semantic-reasoning oracle: request/response contract and retrying client.
//!
//! The oracle is an external service that, given a package description and
//! a block of candidate terms, picks one term and reports a confidence. Its
//! answers are untrusted: they are parsed into [`RawMatchResult`] at the
//! boundary and checked against the vocabulary downstream.

pub mod error;
pub mod openai;

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

pub use error::{OracleError, OracleResult};
pub use openai::{OpenAiOracle, OracleConfig};

/// One oracle call: a package and one chunk of candidate terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRequest {
    pub item_name: String,
    pub item_description: String,
    /// Newline-delimited `label: definition` entries.
    pub candidate_terms_block: String,
}

/// The oracle's answer, shape-checked but not yet validated against the
/// vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMatchResult {
    #[serde(rename = "edam_id", alias = "id")]
    pub id: String,
    #[serde(rename = "edam_label", alias = "label")]
    pub label: String,
    #[serde(
        rename = "confidence_score",
        alias = "confidence",
        deserialize_with = "deserialize_confidence"
    )]
    pub confidence: f64,
    pub reasoning: String,
}

impl RawMatchResult {
    /// Trim fields, reject empty answers and clamp confidence into `[0, 1]`.
    pub fn sanitize(self) -> OracleResult<Self> {
        let id = self.id.trim().to_string();
        let label = self.label.trim().to_string();
        if id.is_empty() && label.is_empty() {
            return Err(OracleError::InvalidResponse {
                message: "both edam_id and edam_label are empty".into(),
            });
        }
        if !self.confidence.is_finite() {
            return Err(OracleError::InvalidResponse {
                message: format!("confidence {} is not a finite number", self.confidence),
            });
        }
        Ok(Self {
            id,
            label,
            confidence: self.confidence.clamp(0.0, 1.0),
            reasoning: self.reasoning.trim().to_string(),
        })
    }
}

fn deserialize_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("confidence \"{s}\" is not a number"))),
    }
}

/// An external semantic-reasoning service.
///
/// Implementations must be `Send + Sync` so chunk queries can later be moved
/// onto a worker pool.
pub trait MatchOracle: Send + Sync {
    /// Pick the best candidate term for the request.
    fn query(&self, request: &OracleRequest) -> OracleResult<RawMatchResult>;
}

impl<O: MatchOracle + ?Sized> MatchOracle for &O {
    fn query(&self, request: &OracleRequest) -> OracleResult<RawMatchResult> {
        (**self).query(request)
    }
}

impl<O: MatchOracle + ?Sized> MatchOracle for Box<O> {
    fn query(&self, request: &OracleRequest) -> OracleResult<RawMatchResult> {
        (**self).query(request)
    }
}

/// Retry policy for transient oracle failures: linear backoff of
/// `backoff_step * attempt` between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per chunk, the first one included.
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }
}

/// Wraps an oracle with retry/backoff on rate limits and response
/// sanitizing.
pub struct MatchOracleClient<O> {
    oracle: O,
    policy: RetryPolicy,
}

impl<O: MatchOracle> MatchOracleClient<O> {
    pub fn new(oracle: O, policy: RetryPolicy) -> Self {
        Self { oracle, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The wrapped oracle.
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Query one chunk. Rate limits are retried; any other failure returns
    /// immediately.
    pub fn query(
        &self,
        name: &str,
        description: &str,
        candidate_terms_block: &str,
    ) -> OracleResult<RawMatchResult> {
        let request = OracleRequest {
            item_name: name.to_string(),
            item_description: description.to_string(),
            candidate_terms_block: candidate_terms_block.to_string(),
        };
        let max_attempts = self.policy.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            match self.oracle.query(&request) {
                Ok(raw) => return raw.sanitize(),
                Err(e) if e.is_transient() => {
                    if attempt >= max_attempts {
                        return Err(OracleError::AttemptsExhausted {
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }
                    let delay = self.policy.delay_for_attempt(attempt);
                    tracing::warn!(
                        package = name,
                        attempt,
                        max_attempts,
                        delay_secs = delay.as_secs_f64(),
                        error = %e,
                        "oracle rate limited, backing off"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
