//! Matcher configuration, persisted as TOML.
//!
//! Every component receives the pieces it needs from a [`MatcherConfig`]
//! at construction time; there is no process-wide configuration state.

use std::path::Path;
use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chunker::CandidateFormat;
use crate::oracle::{OracleConfig, RetryPolicy};
use crate::ranker::RankScoring;
use crate::vocab::{SynonymCollisionPolicy, VocabularyOptions};

/// Errors from configuration handling.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(edam::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(edam::config::parse),
        help("Check the TOML syntax and field names in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(edam::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config value for {field}: {message}")]
    #[diagnostic(code(edam::config::invalid))]
    Invalid { field: String, message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Where candidate terms come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateMode {
    /// Lexical shortlist, falling back to a category-balanced sample.
    #[default]
    Ranked,
    /// Every active term, chunked.
    Full,
}

/// Candidate selection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateConfig {
    #[serde(default)]
    pub mode: CandidateMode,
    /// Shortlist size in ranked mode.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Sample size used when nothing overlaps lexically.
    #[serde(default = "default_fallback_sample")]
    pub fallback_sample: usize,
    #[serde(default)]
    pub scoring: RankScoring,
}

fn default_top_k() -> usize {
    50
}
fn default_fallback_sample() -> usize {
    12
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            mode: CandidateMode::default(),
            top_k: default_top_k(),
            fallback_sample: default_fallback_sample(),
            scoring: RankScoring::default(),
        }
    }
}

/// Top-level matcher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Packages per persisted batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Index and accept synonyms.
    #[serde(default)]
    pub use_synonyms: bool,
    #[serde(default)]
    pub synonym_collisions: SynonymCollisionPolicy,
    /// Format candidates as labels only.
    #[serde(default = "default_simple_mode")]
    pub simple_mode: bool,
    /// Matches below this confidence are flagged for the new-term workflow.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Attempts per chunk when the oracle is rate limited.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff grows by this many seconds per failed attempt.
    #[serde(default = "default_backoff_step_secs")]
    pub backoff_step_secs: f64,
    /// Token ceiling for one prompt when synonyms are on.
    #[serde(default = "default_safe_tokens")]
    pub safe_tokens: usize,
    /// Token ceiling for one prompt when synonyms are off.
    #[serde(default = "default_safe_tokens_without_synonyms")]
    pub safe_tokens_without_synonyms: usize,
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
    /// Longer descriptions are truncated before prompting.
    #[serde(default = "default_max_description_chars")]
    pub max_description_chars: usize,
    /// Reuse batch files already on disk.
    #[serde(default)]
    pub resume: bool,
    #[serde(default)]
    pub candidates: CandidateConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
}

fn default_batch_size() -> usize {
    5000
}
fn default_simple_mode() -> bool {
    true
}
fn default_confidence_threshold() -> f64 {
    0.5
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_step_secs() -> f64 {
    10.0
}
fn default_safe_tokens() -> usize {
    25_000
}
fn default_safe_tokens_without_synonyms() -> usize {
    29_000
}
fn default_chars_per_token() -> usize {
    4
}
fn default_max_description_chars() -> usize {
    10_000
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            use_synonyms: false,
            synonym_collisions: SynonymCollisionPolicy::default(),
            simple_mode: default_simple_mode(),
            confidence_threshold: default_confidence_threshold(),
            max_retries: default_max_retries(),
            backoff_step_secs: default_backoff_step_secs(),
            safe_tokens: default_safe_tokens(),
            safe_tokens_without_synonyms: default_safe_tokens_without_synonyms(),
            chars_per_token: default_chars_per_token(),
            max_description_chars: default_max_description_chars(),
            resume: false,
            candidates: CandidateConfig::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl MatcherConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |field: &str, message: &str| {
            Err(ConfigError::Invalid {
                field: field.into(),
                message: message.into(),
            })
        };
        if self.batch_size == 0 {
            return invalid("batch_size", "must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return invalid("confidence_threshold", "must be within [0, 1]");
        }
        if self.chars_per_token == 0 {
            return invalid("chars_per_token", "must be at least 1");
        }
        if !self.backoff_step_secs.is_finite() || self.backoff_step_secs < 0.0 {
            return invalid("backoff_step_secs", "must be a non-negative number");
        }
        if self.candidates.top_k == 0 {
            return invalid("candidates.top_k", "must be at least 1");
        }
        Ok(())
    }

    pub fn vocabulary_options(&self) -> VocabularyOptions {
        VocabularyOptions {
            use_synonyms: self.use_synonyms,
            collisions: self.synonym_collisions,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            backoff_step: Duration::try_from_secs_f64(self.backoff_step_secs).unwrap_or(Duration::ZERO),
        }
    }

    /// Prompt token ceiling; synonym-free payloads are smaller, so more of
    /// the window is spent on candidates.
    pub fn effective_safe_tokens(&self) -> usize {
        if self.use_synonyms {
            self.safe_tokens
        } else {
            self.safe_tokens_without_synonyms
        }
    }

    pub fn candidate_format(&self, simple_mode: bool) -> CandidateFormat {
        CandidateFormat {
            simple_mode,
            include_synonyms: self.use_synonyms,
        }
    }
}
