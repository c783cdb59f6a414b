use crate::config::{parse_base_url, ApiKey, LlmConfig};
use crate::generate::{GenerationError, ResponseGenerator};
use crate::prompt::{ChatMessage, PromptPayload};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const LOG_TARGET: &str = "generate::openai";

/// Chat-completions client for OpenAI-compatible providers (Groq by default).
#[derive(Clone)]
pub struct OpenAiCompatibleGenerator {
    client: Client,
    api_key: ApiKey,
    endpoint: Url,
    request_timeout: Duration,
}

impl OpenAiCompatibleGenerator {
    pub fn new(llm: &LlmConfig, api_key: ApiKey) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(llm.attempt_timeout)
            .build()
            .map_err(GenerationError::Network)?;
        let endpoint = chat_completions_url(&llm.base_url)?;

        Ok(Self {
            client,
            api_key,
            endpoint,
            request_timeout: llm.attempt_timeout,
        })
    }

}

fn chat_completions_url(base: &Url) -> Result<Url, GenerationError> {
    let joined = format!("{}/chat/completions", base.as_str().trim_end_matches('/'));
    Ok(parse_base_url(&joined)?)
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionResponseMessage,
}

#[derive(Deserialize)]
struct ChatCompletionResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ResponseGenerator for OpenAiCompatibleGenerator {
    fn generate(&self, prompt: PromptPayload) -> BoxFuture<'_, Result<String, GenerationError>> {
        async move {
            let request = ChatCompletionRequest {
                model: &prompt.model,
                messages: &prompt.messages,
                temperature: prompt.temperature,
                max_tokens: prompt.max_tokens,
            };

            tracing::debug!(
                target: LOG_TARGET,
                model = %prompt.model,
                messages = prompt.messages.len(),
                mood = %prompt.mood,
                "requesting completion"
            );

            let response = self
                .client
                .post(self.endpoint.clone())
                .bearer_auth(self.api_key.expose())
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        GenerationError::Timeout(self.request_timeout)
                    } else {
                        GenerationError::Network(e)
                    }
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                tracing::warn!(target: LOG_TARGET, status = status.as_u16(), "completion request failed");
                return Err(GenerationError::from_status(status.as_u16(), body));
            }

            let parsed: ChatCompletionResponse = response
                .json()
                .await
                .map_err(|e| GenerationError::InvalidResponse(format!("failed to parse JSON: {e}")))?;

            let text = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .map(|content| content.trim().to_owned())
                .filter(|content| !content.is_empty())
                .ok_or_else(|| GenerationError::InvalidResponse("no completion text".to_owned()))?;

            Ok(text)
        }
        .boxed()
    }
}
