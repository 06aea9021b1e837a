//! Completion client for the narration language model.
//!
//! Two wire shapes are supported behind one interface: a bare local
//! text-generation server (`api_type = ""`) and OpenAI-compatible chat
//! completion endpoints (`api_type = "openai-compatible"`). The request
//! body starts from the configured base parameters so sampling settings
//! ride along unchanged.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use skald_core::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("llm request failed: {0}")]
    Transport(String),

    #[error("llm response malformed: {0}")]
    Parse(String),
}

/// Which request/response shape the configured endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVariant {
    LocalGeneration,
    ChatCompletion,
}

impl ApiVariant {
    pub fn from_api_type(api_type: &str) -> Self {
        match api_type.trim().to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" => Self::ChatCompletion,
            _ => Self::LocalGeneration,
        }
    }
}

/// A model that turns prompt segments into one completion string.
/// Segments are joined in order with newlines between them.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, segments: &[String]) -> Result<String, LlmError>;
}

pub struct LlmGateway {
    client: reqwest::Client,
    url: String,
    variant: ApiVariant,
    headers: Vec<(String, String)>,
    model: String,
    api_key: String,
    base_body: serde_json::Map<String, Value>,
    prompt_keyname: String,
}

#[derive(Deserialize, Default)]
struct LocalResponse {
    #[serde(default)]
    results: Vec<LocalResult>,
}

#[derive(Deserialize, Default)]
struct LocalResult {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Default)]
struct ChatChoice {
    #[serde(default)]
    message: ChatMessage,
}

#[derive(Deserialize, Default)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

impl LlmGateway {
    /// `timeout` is the hard cap on one request; callers race the whole
    /// narration against their own deadline on top of it.
    pub fn new(cfg: &LlmConfig, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            url: format!("{}{}", cfg.host.trim_end_matches('/'), cfg.path),
            variant: ApiVariant::from_api_type(&cfg.api_type),
            headers: cfg
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            base_body: cfg.request_body.clone(),
            prompt_keyname: cfg.prompt_keyname.clone(),
        }
    }

    pub fn variant(&self) -> ApiVariant {
        self.variant
    }

    fn build_body(&self, prompt: &str) -> Value {
        let mut body = self.base_body.clone();
        match self.variant {
            ApiVariant::LocalGeneration => {
                body.insert(self.prompt_keyname.clone(), Value::String(prompt.to_string()));
            }
            ApiVariant::ChatCompletion => {
                body.insert("model".to_string(), Value::String(self.model.clone()));
                body.insert(
                    "messages".to_string(),
                    json!([{ "role": "user", "content": prompt }]),
                );
            }
        }
        Value::Object(body)
    }

    fn extract_text(&self, raw: &str) -> Result<String, LlmError> {
        match self.variant {
            ApiVariant::LocalGeneration => {
                let parsed: LocalResponse =
                    serde_json::from_str(raw).map_err(|e| LlmError::Parse(e.to_string()))?;
                Ok(parsed
                    .results
                    .into_iter()
                    .next()
                    .map(|r| r.text)
                    .unwrap_or_default())
            }
            ApiVariant::ChatCompletion => {
                let parsed: ChatResponse =
                    serde_json::from_str(raw).map_err(|e| LlmError::Parse(e.to_string()))?;
                Ok(parsed
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .unwrap_or_default())
            }
        }
    }
}

#[async_trait]
impl Completion for LlmGateway {
    async fn complete(&self, segments: &[String]) -> Result<String, LlmError> {
        let prompt = segments.join("\n");
        let body = self.build_body(&prompt);

        let mut request = self.client.post(&self.url).json(&body);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if self.variant == ApiVariant::ChatCompletion && !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        tracing::debug!(url = %self.url, variant = ?self.variant, "sending completion request");
        let response = request
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(LlmError::Server {
                status: status.as_u16(),
                body: raw,
            });
        }
        self.extract_text(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_gateway() -> LlmGateway {
        LlmGateway::new(&LlmConfig::default(), Duration::from_secs(5))
    }

    fn chat_gateway() -> LlmGateway {
        let cfg = LlmConfig {
            api_type: "openai-compatible".to_string(),
            host: "https://api.example.com".to_string(),
            path: "/v1/chat/completions".to_string(),
            api_key: "secret".to_string(),
            ..LlmConfig::default()
        };
        LlmGateway::new(&cfg, Duration::from_secs(5))
    }

    #[test]
    fn local_body_carries_prompt_under_configured_key() {
        let gateway = local_gateway();
        let body = gateway.build_body("describe the strike");
        assert_eq!(body["prompt"], "describe the strike");
        // base parameters ride along
        assert_eq!(body["max_new_tokens"], 250);
    }

    #[test]
    fn chat_body_wraps_prompt_in_user_message() {
        let gateway = chat_gateway();
        let body = gateway.build_body("describe the strike");
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "describe the strike");
    }

    #[test]
    fn local_response_text_is_extracted() {
        let gateway = local_gateway();
        let text = gateway
            .extract_text(r#"{"results":[{"text":"a fierce blow"}]}"#)
            .unwrap();
        assert_eq!(text, "a fierce blow");
    }

    #[test]
    fn chat_response_content_is_extracted() {
        let gateway = chat_gateway();
        let text = gateway
            .extract_text(r#"{"choices":[{"message":{"role":"assistant","content":"a fierce blow"}}]}"#)
            .unwrap();
        assert_eq!(text, "a fierce blow");
    }

    #[test]
    fn missing_fields_in_success_response_yield_empty_string() {
        assert_eq!(local_gateway().extract_text("{}").unwrap(), "");
        assert_eq!(chat_gateway().extract_text(r#"{"choices":[]}"#).unwrap(), "");
        assert_eq!(
            chat_gateway()
                .extract_text(r#"{"choices":[{"message":{}}]}"#)
                .unwrap(),
            ""
        );
    }

    #[test]
    fn non_json_response_is_a_parse_error() {
        assert!(matches!(
            local_gateway().extract_text("<html>oops</html>"),
            Err(LlmError::Parse(_))
        ));
    }

    #[test]
    fn api_type_parsing_is_forgiving() {
        assert_eq!(ApiVariant::from_api_type(""), ApiVariant::LocalGeneration);
        assert_eq!(ApiVariant::from_api_type("OpenAI"), ApiVariant::ChatCompletion);
        assert_eq!(
            ApiVariant::from_api_type(" openai-compatible "),
            ApiVariant::ChatCompletion
        );
    }
}
