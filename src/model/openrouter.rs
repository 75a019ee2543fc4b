//! OpenRouter chat-completions backend.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ModelInvoker, RemoteServiceError};
use crate::config::ModelConfig;

/// Blocking client for OpenRouter-compatible chat endpoints.
#[derive(Clone, Default)]
pub struct OpenRouterInvoker {
    client: Client,
}

impl OpenRouterInvoker {
    /// Builds an invoker with a fresh HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an invoker around an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn headers(&self, config: &ModelConfig) -> Result<HeaderMap, RemoteServiceError> {
        let key = config.api_key.as_deref().unwrap_or_default().trim();
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| RemoteServiceError::transport("invalid API key characters"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(referer) = HeaderValue::from_str(&config.referer) {
            headers.insert("HTTP-Referer", referer);
        }
        if let Ok(title) = HeaderValue::from_str(&config.app_title) {
            headers.insert("X-Title", title);
        }
        Ok(headers)
    }
}

impl ModelInvoker for OpenRouterInvoker {
    fn invoke(&self, prompt: &str, config: &ModelConfig) -> Result<String, RemoteServiceError> {
        let body = ChatRequest {
            model: &config.model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let url = config.completions_url();
        info!(model = %config.model, prompt_bytes = prompt.len(), "calling model");

        let resp = self
            .client
            .post(&url)
            .headers(self.headers(config)?)
            .timeout(config.timeout)
            .json(&body)
            .send()
            .map_err(|err| {
                warn!(error = %err, "model request failed");
                RemoteServiceError::transport(format!("failed to reach {url}: {err}"))
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        debug!(status = status.as_u16(), bytes = text.len(), "model responded");

        if !status.is_success() {
            let message = provider_message(&text).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            warn!(status = status.as_u16(), %message, "model returned an error");
            return Err(RemoteServiceError::from_status(status.as_u16(), message));
        }
        reply_content(&text).map_err(|err| {
            RemoteServiceError::from_status(
                status.as_u16(),
                format!("unreadable completion body: {err}"),
            )
        })
    }
}

/// Reads `error.message` from an error body.
fn provider_message(body: &str) -> Option<String> {
    let parsed: ErrorEnvelope = serde_json::from_str(body).ok()?;
    parsed
        .error
        .and_then(|error| error.message)
        .filter(|message| !message.trim().is_empty())
}

/// First choice's content. Null or missing content is an empty reply.
fn reply_content(body: &str) -> Result<String, serde_json::Error> {
    let parsed: ChatResponse = serde_json::from_str(body)?;
    Ok(parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .unwrap_or_default())
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<AssistantMessage>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RemoteErrorKind;
    use std::time::Duration;

    #[test]
    fn reads_first_choice_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"sku\":\"A1\"}"}},{"message":{"content":"ignored"}}]}"#;
        assert_eq!(reply_content(body).expect("body"), "{\"sku\":\"A1\"}");
    }

    #[test]
    fn null_or_missing_content_is_empty() {
        assert_eq!(reply_content(r#"{"choices":[{"message":{"content":null}}]}"#).expect("body"), "");
        assert_eq!(reply_content(r#"{"choices":[]}"#).expect("body"), "");
        assert_eq!(reply_content(r#"{}"#).expect("body"), "");
        assert!(reply_content("<html>").is_err());
    }

    #[test]
    fn extracts_provider_error_message() {
        let body = r#"{"error":{"message":"No auth credentials found","code":401}}"#;
        assert_eq!(provider_message(body).as_deref(), Some("No auth credentials found"));
        assert_eq!(provider_message("Bad Gateway"), None);
        assert_eq!(provider_message(r#"{"error":{"message":"  "}}"#), None);
    }

    #[test]
    fn unreachable_endpoint_is_a_transport_error() {
        let config = ModelConfig {
            base_url: "http://127.0.0.1:1/api/v1".to_string(),
            timeout: Duration::from_secs(2),
            ..ModelConfig::with_api_key("sk-or-test")
        };
        let err = OpenRouterInvoker::new()
            .invoke("hola", &config)
            .expect_err("nothing listens on port 1");
        assert_eq!(err.kind, RemoteErrorKind::Transport);
        assert_eq!(err.status, None);
    }
}
