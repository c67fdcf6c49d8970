//! OpenAI-compatible chat-completions oracle over sync HTTP.
//!
//! Works against api.openai.com or any server that speaks the same
//! `/chat/completions` dialect (vLLM, Ollama's OpenAI endpoint, ...).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{OracleError, OracleResult};
use super::{MatchOracle, OracleRequest, RawMatchResult};

const SYSTEM_PROMPT: &str = "You match software package descriptions to the single most \
relevant term of the EDAM ontology (topics, operations, data and formats). \
You are given the package name, its description and a list of candidate terms, \
one per line as `label: definition`. Pick exactly one candidate. \
Answer with a JSON object with the keys \
\"edam_id\" (the EDAM URI, e.g. http://edamontology.org/topic_0080), \
\"edam_label\" (the candidate's label exactly as written), \
\"confidence_score\" (a number between 0.0 and 1.0, where 1.0 is a perfect match) and \
\"reasoning\" (one or two sentences). Return only the JSON object.";

/// Connection settings for the oracle service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: f64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            temperature: 0.0,
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Oracle backed by an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiOracle {
    config: OracleConfig,
    api_key: String,
    agent: ureq::Agent,
}

impl OpenAiOracle {
    /// Build an oracle, reading the API key from `config.api_key_env`.
    pub fn from_config(config: OracleConfig) -> OracleResult<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| OracleError::MissingApiKey {
                var: config.api_key_env.clone(),
            })?;
        Ok(Self::with_api_key(config, api_key))
    }

    /// Build an oracle with an explicit API key.
    pub fn with_api_key(config: OracleConfig, api_key: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self {
            config,
            api_key: api_key.into(),
            agent,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request_body(&self, request: &OracleRequest) -> serde_json::Value {
        let user = format!(
            "Package name: {}\n\nPackage description:\n{}\n\nCandidate EDAM terms:\n{}",
            request.item_name, request.item_description, request.candidate_terms_block
        );
        serde_json::json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user },
            ],
        })
    }
}

impl MatchOracle for OpenAiOracle {
    fn query(&self, request: &OracleRequest) -> OracleResult<RawMatchResult> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = serde_json::to_string(&self.request_body(request)).map_err(|e| {
            OracleError::RequestFailed {
                message: format!("JSON serialize error: {e}"),
            }
        })?;

        let resp = match self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_string(&body)
        {
            Ok(resp) => resp,
            Err(ureq::Error::Status(code, resp)) => {
                let text = resp.into_string().unwrap_or_default();
                return Err(classify_failure(Some(code), &text));
            }
            Err(e) => return Err(classify_failure(None, &e.to_string())),
        };

        let resp_str = resp.into_string().map_err(|e| OracleError::InvalidResponse {
            message: e.to_string(),
        })?;
        parse_completion(&resp_str)
    }
}

impl std::fmt::Debug for OpenAiOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiOracle")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

/// Map a failed call to an error class. HTTP 429 and any mention of rate
/// limits or quota are transient.
pub fn classify_failure(status: Option<u16>, text: &str) -> OracleError {
    let lower = text.to_lowercase();
    let capacity = lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("ratelimit")
        || lower.contains("quota");
    if status == Some(429) || capacity {
        return OracleError::RateLimited {
            message: truncate(text, 200),
        };
    }
    let message = match status {
        Some(code) => format!("HTTP {code}: {}", truncate(text, 200)),
        None => text.to_string(),
    };
    OracleError::RequestFailed { message }
}

/// Extract the typed answer from a chat-completions response body.
pub fn parse_completion(body: &str) -> OracleResult<RawMatchResult> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| OracleError::InvalidResponse {
            message: format!("completion envelope: {e}"),
        })?;
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| OracleError::InvalidResponse {
            message: "completion has no message content".into(),
        })?;

    // Models sometimes wrap the object in prose or a code fence.
    let trimmed = content.trim();
    let json = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(s), Some(e)) if e > s => &trimmed[s..=e],
        _ => {
            return Err(OracleError::InvalidResponse {
                message: "no JSON object in completion".into(),
            });
        }
    };
    serde_json::from_str(json).map_err(|e| OracleError::InvalidResponse {
        message: format!("match schema: {e}"),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(content: &str) -> String {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
        .to_string()
    }

    #[test]
    fn default_config_values() {
        let config = OracleConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn parses_plain_and_fenced_content() {
        let content = r#"{"edam_id":"http://edamontology.org/topic_0203","edam_label":"Gene expression","confidence_score":0.9,"reasoning":"RNA-seq"}"#;
        let parsed = parse_completion(&envelope(content)).unwrap();
        assert_eq!(parsed.label, "Gene expression");
        assert_eq!(parsed.confidence, 0.9);

        let fenced = format!("```json\n{content}\n```");
        let parsed = parse_completion(&envelope(&fenced)).unwrap();
        assert_eq!(parsed.id, "http://edamontology.org/topic_0203");
    }

    #[test]
    fn malformed_completions_are_invalid() {
        assert!(matches!(
            parse_completion("not json"),
            Err(OracleError::InvalidResponse { .. })
        ));
        assert!(matches!(
            parse_completion(&envelope("I cannot decide.")),
            Err(OracleError::InvalidResponse { .. })
        ));
        assert!(matches!(
            parse_completion(&envelope(r#"{"edam_label":"X"}"#)),
            Err(OracleError::InvalidResponse { .. })
        ));
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(OracleError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn classifies_capacity_failures_as_transient() {
        assert!(classify_failure(Some(429), "slow down").is_transient());
        assert!(classify_failure(Some(403), "You exceeded your current quota").is_transient());
        assert!(classify_failure(None, "RateLimitError: too many requests").is_transient());
        assert!(!classify_failure(Some(500), "internal error").is_transient());
        assert!(!classify_failure(None, "connection refused").is_transient());
    }

    #[test]
    fn missing_api_key_is_reported() {
        let config = OracleConfig {
            api_key_env: "EDAM_MATCH_TEST_UNSET_KEY_7f3a".into(),
            ..Default::default()
        };
        let err = OpenAiOracle::from_config(config).unwrap_err();
        assert!(matches!(err, OracleError::MissingApiKey { .. }));
    }

    #[test]
    fn unreachable_server_is_a_request_failure() {
        let config = OracleConfig {
            base_url: "http://127.0.0.1:1".into(), // unreachable port
            timeout_secs: 2,
            ..Default::default()
        };
        let oracle = OpenAiOracle::with_api_key(config, "test");
        let err = oracle
            .query(&OracleRequest {
                item_name: "pkg".into(),
                item_description: "desc".into(),
                candidate_terms_block: "Gene expression".into(),
            })
            .unwrap_err();
        assert!(matches!(err, OracleError::RequestFailed { .. }));
    }

    #[test]
    fn request_body_carries_candidates() {
        let oracle = OpenAiOracle::with_api_key(OracleConfig::default(), "k");
        let body = oracle.request_body(&OracleRequest {
            item_name: "limma".into(),
            item_description: "Linear models for microarray data".into(),
            candidate_terms_block: "Gene expression\nProteomics".into(),
        });
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["response_format"]["type"], "json_object");
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("limma"));
        assert!(user.contains("Gene expression\nProteomics"));
    }
}
