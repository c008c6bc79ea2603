use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Add jitter to delay
fn add_jitter(delay: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return delay;
    }

    use rand::Rng;
    let mut rng = rand::thread_rng();
    let jitter_ms = (delay.as_millis() as f64 * jitter_factor) as u64;
    let jitter = rng.gen_range(0..=jitter_ms);

    delay + Duration::from_millis(jitter)
}

/// Error classes a caller may opt into retrying, per the discovery coordinator's
/// `retry_on_kinds` contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RateLimit,
    Timeout,
    Network,
    ApiError,
    NotFound,
    InvalidInput,
    Unknown,
}

/// Classify an error into the coarse kinds the retry wrapper reasons about.
/// `NotFound` and `InvalidInput` are never worth retrying regardless of what
/// the caller passes in `retry_on_kinds` — they indicate the request itself
/// cannot succeed, not a transient condition.
#[must_use]
pub fn classify_error_kind(error: &Error) -> ErrorKind {
    match error {
        Error::RateLimitExceeded { .. } => ErrorKind::RateLimit,
        Error::Timeout { .. } | Error::NetworkTimeout { .. } => ErrorKind::Timeout,
        Error::Http(_) | Error::ConnectionRefused { .. } | Error::DnsFailure { .. } | Error::Io(_) => {
            ErrorKind::Network
        }
        Error::ServiceUnavailable { .. } | Error::InternalServerError(_) | Error::ServiceOverloaded { .. } => {
            ErrorKind::ApiError
        }
        Error::NotFound(_) => ErrorKind::NotFound,
        Error::InvalidInput { .. } | Error::Validation { .. } | Error::AuthenticationFailed(_) => {
            ErrorKind::InvalidInput
        }
        _ => ErrorKind::Unknown,
    }
}

/// Thin retry wrapper: classify the error, skip retrying `NotFound`/`InvalidInput`
/// unconditionally, and otherwise retry up to `max_retries` times with capped
/// exponential backoff and jitter — honoring a rate-limit `retry_after` hint when
/// the provider supplied one.
///
/// `retry_on_kinds` restricts which of the remaining classes are retried; pass
/// every relevant kind to retry on anything but `NotFound`/`InvalidInput`.
pub async fn retry<T, F, Fut>(
    mut operation: F,
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    retry_on_kinds: &[ErrorKind],
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let kind = classify_error_kind(&error);
                let retryable = !matches!(kind, ErrorKind::NotFound | ErrorKind::InvalidInput)
                    && retry_on_kinds.contains(&kind);

                if !retryable || attempt >= max_retries {
                    if attempt >= max_retries && retryable {
                        warn!("retry exhausted after {max_retries} attempts: {error}");
                    }
                    return Err(error);
                }

                let delay = match error.retry_after() {
                    Some(hint) => hint.min(max_delay),
                    None => add_jitter(
                        Duration::from_millis(
                            ((base_delay.as_millis() as f64) * 2f64.powi(attempt as i32))
                                .min(max_delay.as_millis() as f64) as u64,
                        ),
                        0.25,
                    ),
                };

                debug!("retry attempt {attempt} failed ({kind:?}), sleeping {delay:?}: {error}");
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
