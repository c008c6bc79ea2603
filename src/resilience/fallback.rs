use super::retry::{retry, ErrorKind};
use crate::{Error, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Running counters exposed by [`FallbackChain::stats`].
#[derive(Debug, Clone, Default)]
pub struct FallbackStats {
    pub total_calls: u64,
    pub fallback_used: u64,
    pub success_by_source: HashMap<String, u64>,
}

/// Ordered chain of strategies for producing the same result from different
/// sources. `execute` tries each strategy in priority order, wrapping every
/// attempt in [`retry`]; the first success wins. If every strategy is
/// exhausted, `execute` raises [`Error::FallbackExhausted`] carrying the
/// concatenated per-strategy failure messages.
pub struct FallbackChain {
    base_delay: Duration,
    max_delay: Duration,
    retry_on_kinds: Vec<ErrorKind>,
    total_calls: AtomicU64,
    fallback_used: AtomicU64,
    success_by_source: Mutex<HashMap<String, u64>>,
}

impl FallbackChain {
    pub fn new(base_delay: Duration, max_delay: Duration, retry_on_kinds: Vec<ErrorKind>) -> Self {
        Self {
            base_delay,
            max_delay,
            retry_on_kinds,
            total_calls: AtomicU64::new(0),
            fallback_used: AtomicU64::new(0),
            success_by_source: Mutex::new(HashMap::new()),
        }
    }

    /// Run `strategies` in priority order (ascending). Each element is
    /// `(name, priority, max_retries, operation)`. The first strategy whose
    /// retried call succeeds wins; the chain records whether a non-primary
    /// strategy had to be used.
    pub async fn execute<T, F, Fut>(&self, mut strategies: Vec<(String, u32, u32, F)>) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        strategies.sort_by_key(|(_, priority, _, _)| *priority);

        let mut errors: Vec<String> = Vec::new();
        for (index, (name, _priority, max_retries, mut operation)) in strategies.into_iter().enumerate() {
            debug!("fallback chain trying strategy '{name}'");
            let result = retry(
                || operation(),
                max_retries,
                self.base_delay,
                self.max_delay,
                &self.retry_on_kinds,
            )
            .await;

            match result {
                Ok(value) => {
                    if index > 0 {
                        self.fallback_used.fetch_add(1, Ordering::Relaxed);
                    }
                    let mut success_by_source = self.success_by_source.lock().unwrap();
                    *success_by_source.entry(name).or_insert(0) += 1;
                    return Ok(value);
                }
                Err(error) => {
                    warn!("fallback strategy '{name}' failed: {error}");
                    errors.push(format!("{name}: {error}"));
                }
            }
        }

        let count = errors.len();
        Err(Error::FallbackExhausted(count, errors.join("; ")))
    }

    pub fn stats(&self) -> FallbackStats {
        FallbackStats {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            fallback_used: self.fallback_used.load(Ordering::Relaxed),
            success_by_source: self.success_by_source.lock().unwrap().clone(),
        }
    }
}
