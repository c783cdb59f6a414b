pub mod bounded;
pub mod retry;

pub use bounded::BoundedLog;
pub use retry::{is_http_retryable, retry_with_backoff, RetryConfig};
