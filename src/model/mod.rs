//! Language-model invocation behind a narrow trait.

mod openrouter;

pub use openrouter::OpenRouterInvoker;

use std::fmt;
use thiserror::Error;

use crate::config::ModelConfig;

/// Trait implemented by concrete model backends.
///
/// Implementations make exactly one attempt per call.
pub trait ModelInvoker {
    /// Sends `prompt` and returns the model's raw reply text.
    fn invoke(&self, prompt: &str, config: &ModelConfig) -> Result<String, RemoteServiceError>;
}

impl<T: ModelInvoker + ?Sized> ModelInvoker for &T {
    fn invoke(&self, prompt: &str, config: &ModelConfig) -> Result<String, RemoteServiceError> {
        (**self).invoke(prompt, config)
    }
}

/// Coarse classification of a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// The request never produced an HTTP response.
    Transport,
    /// Credential rejected (401/403).
    Unauthenticated,
    /// Quota or rate limit hit (429).
    RateLimited,
    /// The provider rejected the request body (400/422).
    MalformedRequest,
    /// Any other non-success status, or an unreadable success body.
    Status,
}

impl RemoteErrorKind {
    /// Classifies an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Unauthenticated,
            429 => Self::RateLimited,
            400 | 422 => Self::MalformedRequest,
            _ => Self::Status,
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Transport => "transport failure",
            Self::Unauthenticated => "unauthenticated",
            Self::RateLimited => "rate limited",
            Self::MalformedRequest => "malformed request",
            Self::Status => "unexpected status",
        };
        f.write_str(label)
    }
}

/// Failure reported by the model service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("model service error ({kind}{}): {message}", status_suffix(.status))]
pub struct RemoteServiceError {
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Failure class.
    pub kind: RemoteErrorKind,
    /// Provider message, or a generic transport message.
    pub message: String,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(", status {s}")).unwrap_or_default()
}

impl RemoteServiceError {
    /// Error for a non-success HTTP response.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            kind: RemoteErrorKind::from_status(status),
            message: message.into(),
        }
    }

    /// Error for a request that never got a response.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            kind: RemoteErrorKind::Transport,
            message: message.into(),
        }
    }
}
