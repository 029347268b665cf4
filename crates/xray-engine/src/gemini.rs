use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client as HttpClient, Response};
use serde_json::{json, Value};
use tracing::debug;

use crate::client::{ContentPart, ModelClient, Turn};
use crate::config::GeminiConfig;
use crate::error::ModelError;

const PROVIDER: &str = "gemini";
const ERROR_BODY_CHARS: usize = 512;

/// Google Gemini `generateContent` client. The full turn history is sent on
/// every call.
pub struct GeminiClient {
    config: GeminiConfig,
    http: HttpClient,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> anyhow::Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        endpoint_for_model(&self.config.api_base, &self.config.model)
    }
}

fn endpoint_for_model(api_base: &str, model: &str) -> String {
    let trimmed = model.trim();
    let model_path = if trimmed.starts_with("models/") {
        trimmed.to_string()
    } else {
        format!("models/{trimmed}")
    };
    format!("{api_base}/{model_path}:generateContent")
}

fn build_contents(history: &[Turn], turn: &Turn) -> Vec<Value> {
    history
        .iter()
        .chain(std::iter::once(turn))
        .map(|turn| {
            let parts = turn
                .parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text(text) => json!({ "text": text }),
                    ContentPart::Image(image) => json!({
                        "inlineData": {
                            "mimeType": image.mime_type,
                            "data": image.data,
                        }
                    }),
                })
                .collect::<Vec<_>>();
            json!({
                "role": turn.role.as_str(),
                "parts": parts,
            })
        })
        .collect()
}

fn extract_text(payload: &Value) -> Result<String, ModelError> {
    let text = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();
    if !text.trim().is_empty() {
        return Ok(text);
    }
    let reason = payload
        .get("promptFeedback")
        .and_then(|feedback| feedback.get("blockReason"))
        .and_then(Value::as_str)
        .map(|reason| format!("no text returned (blocked: {reason})"))
        .unwrap_or_else(|| "no text returned".to_string());
    Err(ModelError::InvalidResponse {
        provider: PROVIDER.to_string(),
        message: reason,
    })
}

async fn response_json_or_error(response: Response) -> Result<Value, ModelError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| transport_error(&err))?;
    if !status.is_success() {
        return Err(ModelError::Http {
            provider: PROVIDER.to_string(),
            status: status.as_u16(),
            body: truncate_text(&body, ERROR_BODY_CHARS),
        });
    }
    serde_json::from_str(&body).map_err(|err| ModelError::InvalidResponse {
        provider: PROVIDER.to_string(),
        message: format!("invalid JSON payload: {err}"),
    })
}

fn transport_error(err: &reqwest::Error) -> ModelError {
    ModelError::Transport {
        provider: PROVIDER.to_string(),
        message: truncate_text(&err.to_string(), ERROR_BODY_CHARS),
        retryable: is_retryable_transport_error(err),
    }
}

fn is_retryable_transport_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn send_turn(&self, history: &[Turn], turn: &Turn) -> Result<String, ModelError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(ModelError::MissingCredentials(
                "GEMINI_API_KEY or GOOGLE_API_KEY not set".to_string(),
            ));
        };
        let endpoint = self.endpoint();
        let payload = json!({ "contents": build_contents(history, turn) });
        debug!(
            endpoint = %endpoint,
            history = history.len(),
            images = turn.image_count(),
            "sending Gemini turn"
        );
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key)])
            .json(&payload)
            .send()
            .await
            .map_err(|err| transport_error(&err))?;
        let parsed = response_json_or_error(response).await?;
        extract_text(&parsed)
    }
}
