use crate::types::{ChatMessage, MessageRole};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Overrides the backend's configured model when set.
    pub model: Option<String>,
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub message: ChatMessage,
}

impl ModelResponse {
    pub fn text(&self) -> String {
        self.message.render()
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("model provider returned invalid response: {0}")]
    InvalidResponse(String),
    #[error("environment variable '{0}' holding the API key is not set")]
    MissingApiKey(String),
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;
}

#[async_trait]
impl<P: ModelProvider + ?Sized> ModelProvider for std::sync::Arc<P> {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        (**self).chat(request).await
    }
}

/// `generateContent` client for the Gemini REST API.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::with_client(base_url, model, api_key, Client::new())
    }

    pub fn with_client(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            http: client,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Reads the API key from `key_var`.
    pub fn from_env(
        base_url: impl Into<String>,
        model: impl Into<String>,
        key_var: &str,
    ) -> Result<Self, ModelError> {
        let api_key = env::var(key_var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ModelError::MissingApiKey(key_var.to_string()))?;
        Ok(Self::new(base_url, model, api_key))
    }

    fn endpoint(&self, model: &str) -> String {
        let trimmed = self.base_url.trim_end_matches('/');
        format!("{trimmed}/models/{model}:generateContent")
    }
}

#[async_trait]
impl ModelProvider for GeminiClient {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let url = self.endpoint(model);
        let payload = GeminiRequest::from(&request);
        info!(
            model,
            messages = request.messages.len(),
            "Sending request to model provider"
        );
        let response: GeminiResponse = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("Received response from model provider");

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("no candidates returned".into()))?;
        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        if text.trim().is_empty() {
            return Err(ModelError::InvalidResponse("candidate has no text".into()));
        }

        Ok(ModelResponse {
            message: ChatMessage::model(text),
        })
    }
}

impl ModelError {
    pub fn user_message(&self) -> String {
        match self {
            ModelError::Network(err) => {
                if err.is_connect() {
                    "Could not reach the model service. Check the network connection.".to_string()
                } else if err.is_timeout() {
                    "The model service timed out. Try again shortly.".to_string()
                } else if let Some(status) = err.status() {
                    match status {
                        StatusCode::NOT_FOUND => {
                            "Model endpoint not found (404). Check the configured model id."
                                .to_string()
                        }
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            "The model service rejected the API key.".to_string()
                        }
                        StatusCode::TOO_MANY_REQUESTS => {
                            "The model service is rate limiting requests. Try again later."
                                .to_string()
                        }
                        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                            "The model service is unavailable. Try again later.".to_string()
                        }
                        _ => format!(
                            "The model request failed with status {}. Try again later.",
                            status.as_u16()
                        ),
                    }
                } else {
                    "A network error occurred while contacting the model service.".to_string()
                }
            }
            ModelError::InvalidResponse(_) => {
                "The model service returned a response that could not be processed.".to_string()
            }
            ModelError::MissingApiKey(var) => {
                format!("Set {var} (for example in config/.env) to use the model service.")
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
}

impl From<&ModelRequest> for GeminiRequest {
    fn from(value: &ModelRequest) -> Self {
        let system_instruction = (!value.system_prompt.trim().is_empty()).then(|| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: Some(value.system_prompt.clone()),
            }],
        });
        Self {
            system_instruction,
            contents: value
                .messages
                .iter()
                .map(|msg| GeminiContent {
                    role: Some(gemini_role(msg.role).to_string()),
                    parts: vec![GeminiPart {
                        text: Some(msg.render()),
                    }],
                })
                .collect(),
        }
    }
}

// Gemini only accepts `user` and `model` turns; observations go back as user input.
fn gemini_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::Model => "model",
        MessageRole::User | MessageRole::Tool => "user",
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_joins_paths_correctly() {
        let client = GeminiClient::new("https://example.test/v1beta/", "gemini-x", "key");
        assert_eq!(
            client.endpoint("gemini-x"),
            "https://example.test/v1beta/models/gemini-x:generateContent"
        );
    }

    #[test]
    fn request_conversion_maps_tool_turns_to_user() {
        let request = ModelRequest {
            model: None,
            system_prompt: "stay concise".into(),
            messages: vec![
                ChatMessage::user("hi"),
                ChatMessage::model("calling"),
                ChatMessage::observation("weather", "sunny"),
            ],
        };
        let payload = serde_json::to_value(GeminiRequest::from(&request)).expect("serialize");
        assert_eq!(
            payload["systemInstruction"],
            json!({"parts": [{"text": "stay concise"}]})
        );
        let roles: Vec<_> = payload["contents"]
            .as_array()
            .expect("contents")
            .iter()
            .map(|content| content["role"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(payload["contents"][2]["parts"][0]["text"], "sunny");
    }

    #[test]
    fn blank_system_prompt_is_omitted() {
        let request = ModelRequest {
            model: None,
            system_prompt: "  ".into(),
            messages: vec![ChatMessage::user("hi")],
        };
        let payload = serde_json::to_value(GeminiRequest::from(&request)).expect("serialize");
        assert!(payload.get("systemInstruction").is_none());
    }

    #[test]
    fn missing_key_variable_is_reported() {
        let err = GeminiClient::from_env(
            DEFAULT_GEMINI_ENDPOINT,
            DEFAULT_MODEL,
            "UNISON_AGENT_TEST_KEY_THAT_IS_NEVER_SET",
        )
        .err()
        .expect("missing key");
        assert!(matches!(err, ModelError::MissingApiKey(_)));
        assert!(err.user_message().contains("UNISON_AGENT_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
