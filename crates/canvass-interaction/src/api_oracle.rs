//! ApiOracle - Direct REST implementation of the oracle boundary.
//!
//! Calls an OpenAI-compatible chat-completions endpoint without any
//! CLI dependency. Configuration priority:
//! ~/.config/canvass/secret.json > environment variables

use crate::prompts::render_user_prompt;
use crate::secret::load_secret_config;
use async_trait::async_trait;
use canvass_core::oracle::{Oracle, OracleError, OracleRequest};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use tracing::debug;

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Oracle implementation that talks to an OpenAI-compatible HTTP API.
#[derive(Clone)]
pub struct ApiOracle {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: Option<u32>,
}

impl ApiOracle {
    /// Creates a new oracle with the provided API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: None,
        }
    }

    /// Loads configuration from ~/.config/canvass/secret.json or
    /// environment variables.
    ///
    /// Priority:
    /// 1. ~/.config/canvass/secret.json
    /// 2. Environment variables (OPENAI_API_KEY, OPENAI_MODEL_NAME)
    ///
    /// Model name defaults to `gpt-4o` if not specified.
    pub fn try_from_env() -> Result<Self, OracleError> {
        if let Ok(secret_config) = load_secret_config() {
            if let Some(openai) = secret_config.openai {
                let model = openai.model_name.unwrap_or_else(|| DEFAULT_MODEL.into());
                let mut oracle = Self::new(openai.api_key, model);
                if let Some(base_url) = openai.base_url {
                    oracle.base_url = base_url;
                }
                return Ok(oracle);
            }
        }

        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            OracleError::provider(
                "OPENAI_API_KEY not found in ~/.config/canvass/secret.json or environment variables",
                false,
            )
        })?;
        let model = env::var("OPENAI_MODEL_NAME").unwrap_or_else(|_| DEFAULT_MODEL.into());
        Ok(Self::new(api_key, model))
    }

    /// Overrides the model after construction.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the endpoint, e.g. for a local inference server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    async fn send_request(&self, body: &ChatCompletionRequest) -> Result<String, OracleError> {
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    OracleError::Timeout
                } else {
                    OracleError::Provider {
                        status_code: None,
                        message: format!("oracle request failed: {err}"),
                        is_retryable: err.is_connect(),
                    }
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(map_http_error(status, body_text));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|err| {
            OracleError::malformed(format!("failed to parse provider response: {err}"))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| OracleError::malformed("provider returned no choices"))
    }
}

#[async_trait]
impl Oracle for ApiOracle {
    async fn infer(&self, request: OracleRequest) -> Result<Value, OracleError> {
        let user_prompt = render_user_prompt(&request)?;
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system",
                    content: request.system_instructions.clone(),
                },
                Message {
                    role: "user",
                    content: user_prompt,
                },
            ],
            response_format: ResponseFormat { r#type: "json_object" },
            max_tokens: self.max_tokens,
        };

        debug!(schema = request.expected_schema.name, model = %self.model, "oracle inference call");
        let content = self.send_request(&body).await?;
        parse_json_payload(&content)
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Parses the model's text as JSON, tolerating a markdown code fence
/// despite the instructions.
fn parse_json_payload(content: &str) -> Result<Value, OracleError> {
    let trimmed = content.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);
    serde_json::from_str(stripped)
        .map_err(|err| OracleError::malformed(format!("response is not valid JSON: {err}")))
}

fn map_http_error(status: StatusCode, body: String) -> OracleError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or(body);

    let is_retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    OracleError::Provider {
        status_code: Some(status.as_u16()),
        message,
        is_retryable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_and_fenced_json() {
        let bare = parse_json_payload(r#"{"question": "What?"}"#).unwrap();
        assert_eq!(bare, json!({"question": "What?"}));

        let fenced = parse_json_payload("```json\n{\"question\": \"What?\"}\n```").unwrap();
        assert_eq!(fenced, json!({"question": "What?"}));

        assert!(parse_json_payload("not json at all").is_err());
    }

    #[test]
    fn rate_limit_is_retryable_bad_request_is_not() {
        let err = map_http_error(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error": {"message": "slow down"}}"#.to_string(),
        );
        match err {
            OracleError::Provider {
                status_code,
                message,
                is_retryable,
            } => {
                assert_eq!(status_code, Some(429));
                assert_eq!(message, "slow down");
                assert!(is_retryable);
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = map_http_error(StatusCode::BAD_REQUEST, "oops".to_string());
        assert!(matches!(
            err,
            OracleError::Provider {
                is_retryable: false,
                ..
            }
        ));
    }
}
