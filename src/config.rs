//! Model invocation settings.

use std::time::Duration;

/// Default OpenRouter API root.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
/// Default model id.
pub const DEFAULT_MODEL: &str = "mistralai/mistral-small-3.2-24b-instruct:free";
/// Sampling temperature; kept low so the reply follows the JSON shape.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
/// Completion token ceiling.
pub const DEFAULT_MAX_TOKENS: usize = 800;
/// Value sent as `HTTP-Referer`.
pub const DEFAULT_REFERER: &str = "http://localhost";
/// Value sent as `X-Title`.
pub const DEFAULT_APP_TITLE: &str = "cartlens";

/// Model ids offered for selection.
pub const AVAILABLE_MODELS: &[&str] = &[
    DEFAULT_MODEL,
    "anthropic/claude-3.5-sonnet",
    "anthropic/claude-3-haiku",
    "openai/gpt-4o",
    "openai/gpt-3.5-turbo",
    "meta-llama/llama-3.1-8b-instruct",
    "google/gemini-pro",
];

/// Credential and request parameters, passed explicitly to every model call.
#[derive(Clone)]
pub struct ModelConfig {
    /// OpenRouter API key.
    pub api_key: Option<String>,
    /// Model id, e.g. one of [`AVAILABLE_MODELS`].
    pub model: String,
    /// API root without a trailing slash.
    pub base_url: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token ceiling.
    pub max_tokens: usize,
    /// HTTP client timeout.
    pub timeout: Duration,
    /// `HTTP-Referer` header value.
    pub referer: String,
    /// `X-Title` header value.
    pub app_title: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(60),
            referer: DEFAULT_REFERER.to_string(),
            app_title: DEFAULT_APP_TITLE.to_string(),
        }
    }
}

impl ModelConfig {
    /// Convenience constructor with a credential and the remaining defaults.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// True when a non-blank credential is present.
    pub fn is_configured(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false)
    }

    /// Chat completions endpoint under [`ModelConfig::base_url`].
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}
