mod openai;
mod resilient;
mod scripted;

use crate::config::ConfigError;
use crate::prompt::PromptPayload;
use crate::util::is_http_retryable;
use futures::future::BoxFuture;
use std::time::Duration;

pub use openai::OpenAiCompatibleGenerator;
pub use resilient::{Reply, ResilientGenerator, FALLBACK_GENERIC, FALLBACK_TIMEOUT};
pub use scripted::ScriptedGenerator;

#[derive(thiserror::Error, Debug)]
pub enum GenerationError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("rate limited by provider: {0}")]
    RateLimited(String),
    #[error("provider server error {0}: {1}")]
    Server(u16, String),
    #[error("provider rejected request {0}: {1}")]
    Api(u16, String),
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("generator misconfigured: {0}")]
    Config(#[from] ConfigError),
}

impl GenerationError {
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => GenerationError::RateLimited(body),
            s if is_http_retryable(s) => GenerationError::Server(s, body),
            s => GenerationError::Api(s, body),
        }
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Timeout(_)
            | GenerationError::RateLimited(_)
            | GenerationError::Server(..)
            | GenerationError::Network(_) => true,
            GenerationError::Api(..)
            | GenerationError::InvalidResponse(_)
            | GenerationError::Config(_) => false,
        }
    }
}

/// Produces the companion's reply for a composed prompt.
pub trait ResponseGenerator: Send + Sync {
    fn generate(&self, prompt: PromptPayload) -> BoxFuture<'_, Result<String, GenerationError>>;
}
