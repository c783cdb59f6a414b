use crate::generate::{GenerationError, ResponseGenerator};
use crate::prompt::PromptPayload;
use crate::util::{retry_with_backoff, RetryConfig};
use std::time::Duration;

const LOG_TARGET: &str = "generate::resilient";

pub const FALLBACK_TIMEOUT: &str = "Perdona, me quedé pensando un momentito. ¿Qué me decías?";
pub const FALLBACK_GENERIC: &str =
    "Ay, creo que se me cruzaron los cables. ¿Me lo repites, por favor?";

/// What the user hears: either the model's words or a scripted stand-in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Generated(String),
    Fallback(String),
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Generated(t) | Reply::Fallback(t) => t,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Reply::Fallback(_))
    }
}

/// Wraps a [`ResponseGenerator`] with a per-attempt timeout, retries with
/// backoff and a scripted fallback. `generate` never fails.
#[derive(Clone)]
pub struct ResilientGenerator<G> {
    inner: G,
    retry: RetryConfig,
    attempt_timeout: Duration,
}

impl<G> ResilientGenerator<G>
where
    G: ResponseGenerator,
{
    /// `turn_budget` bounds the whole call, retries included.
    pub fn new(inner: G, attempt_timeout: Duration, turn_budget: Duration) -> Self {
        Self {
            inner,
            retry: RetryConfig::default().with_deadline(turn_budget),
            attempt_timeout,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub async fn generate(&self, prompt: PromptPayload) -> Reply {
        let result = retry_with_backoff(
            &self.retry,
            self.attempt_timeout,
            || self.attempt(prompt.clone()),
            GenerationError::is_retryable,
        )
        .await;

        match result {
            Ok(text) => Reply::Generated(text),
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, error = %e, "generation exhausted, using fallback reply");
                Reply::Fallback(fallback_for(&e).to_owned())
            }
        }
    }

    async fn attempt(&self, prompt: PromptPayload) -> Result<String, GenerationError> {
        match tokio::time::timeout(self.attempt_timeout, self.inner.generate(prompt)).await {
            Ok(Ok(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    Err(GenerationError::InvalidResponse("empty completion".to_owned()))
                } else {
                    Ok(text.to_owned())
                }
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(GenerationError::Timeout(self.attempt_timeout)),
        }
    }
}

fn fallback_for(err: &GenerationError) -> &'static str {
    match err {
        GenerationError::Timeout(_) => FALLBACK_TIMEOUT,
        _ => FALLBACK_GENERIC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::UserProfile;
    use crate::mood::MoodLabel;
    use crate::prompt::PromptComposer;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct FlakyGenerator {
        failures_before_success: u32,
        calls: Arc<AtomicU32>,
    }

    impl ResponseGenerator for FlakyGenerator {
        fn generate(&self, _prompt: PromptPayload) -> BoxFuture<'_, Result<String, GenerationError>> {
            async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n < self.failures_before_success {
                    Err(GenerationError::Server(503, "busy".into()))
                } else {
                    Ok("Ay, mija, ven cuéntame qué pasó…".to_owned())
                }
            }
            .boxed()
        }
    }

    #[derive(Clone, Default)]
    struct RejectingGenerator {
        calls: Arc<AtomicU32>,
    }

    impl ResponseGenerator for RejectingGenerator {
        fn generate(&self, _prompt: PromptPayload) -> BoxFuture<'_, Result<String, GenerationError>> {
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Err(GenerationError::Api(401, "bad key".into()))
            }
            .boxed()
        }
    }

    struct HangingGenerator;

    impl ResponseGenerator for HangingGenerator {
        fn generate(&self, _prompt: PromptPayload) -> BoxFuture<'_, Result<String, GenerationError>> {
            async {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok("too late".to_owned())
            }
            .boxed()
        }
    }

    struct BlankGenerator;

    impl ResponseGenerator for BlankGenerator {
        fn generate(&self, _prompt: PromptPayload) -> BoxFuture<'_, Result<String, GenerationError>> {
            async { Ok("   ".to_owned()) }.boxed()
        }
    }

    fn prompt() -> PromptPayload {
        PromptComposer::default().compose(&UserProfile::new("u"), MoodLabel::Lonely, "me siento muy sola hoy")
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig::new(3, Duration::from_millis(10))
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let inner = FlakyGenerator {
            failures_before_success: 2,
            ..Default::default()
        };
        let calls = inner.calls.clone();
        let generator = ResilientGenerator::new(inner, Duration::from_secs(1), Duration::from_secs(8))
            .with_retry(fast_retry());

        let reply = generator.generate(prompt()).await;
        assert_eq!(reply, Reply::Generated("Ay, mija, ven cuéntame qué pasó…".to_owned()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_when_retries_exhausted() {
        let inner = FlakyGenerator {
            failures_before_success: u32::MAX,
            ..Default::default()
        };
        let calls = inner.calls.clone();
        let generator = ResilientGenerator::new(inner, Duration::from_secs(1), Duration::from_secs(8))
            .with_retry(fast_retry());

        let reply = generator.generate(prompt()).await;
        assert!(reply.is_fallback());
        assert_eq!(reply.text(), FALLBACK_GENERIC);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_rejected_requests() {
        let inner = RejectingGenerator::default();
        let calls = inner.calls.clone();
        let generator = ResilientGenerator::new(inner, Duration::from_secs(1), Duration::from_secs(8))
            .with_retry(fast_retry());

        assert!(generator.generate(prompt()).await.is_fallback());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_yields_timeout_phrase_within_budget() {
        let generator =
            ResilientGenerator::new(HangingGenerator, Duration::from_secs(2), Duration::from_secs(8))
                .with_retry(fast_retry().with_deadline(Duration::from_secs(8)));

        let started = tokio::time::Instant::now();
        let reply = generator.generate(prompt()).await;
        assert_eq!(reply, Reply::Fallback(FALLBACK_TIMEOUT.to_owned()));
        assert!(started.elapsed() <= Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn blank_completion_is_replaced() {
        let generator = ResilientGenerator::new(BlankGenerator, Duration::from_secs(1), Duration::from_secs(8));
        let reply = generator.generate(prompt()).await;
        assert!(reply.is_fallback());
        assert!(!reply.text().is_empty());
    }
}
