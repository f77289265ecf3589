//! Retry harness (C4): attempt-counted retry with backoff and a pluggable
//! `retryOn` predicate, wrapping calls made through the C1 semaphore.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::executor::ExecResult;
use crate::semaphore::Semaphore;

/// Upper bound on the linear backoff, per the open-question resolution in
/// the design notes: bounded and finite, deterministic for tests.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// `retryOn(result) -> bool`, exposed as a trait object so callers can pass
/// either the default or a custom predicate; the judge in `bestOf` always
/// ignores whatever the caller supplied and falls back to `default_retry_on`
/// (enforced at the call site in `swarm::best_of`, not by convention).
pub type RetryPredicate = Arc<dyn Fn(&ExecResult) -> bool + Send + Sync>;

/// `onRetry(attempt, result)`, called after a failed attempt that will be
/// retried — never after the final attempt.
pub type RetryHook = Arc<dyn Fn(u32, &ExecResult) + Send + Sync>;

/// Default predicate: retry iff the attempt's status was `error`.
pub fn default_retry_on() -> RetryPredicate {
    Arc::new(|result: &ExecResult| !result.is_success())
}

#[derive(Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Base delay in milliseconds; actual delay is `attempt * backoff_ms`,
    /// capped at `MAX_BACKOFF`.
    pub backoff_ms: u64,
    pub retry_on: RetryPredicate,
    pub on_retry: Option<RetryHook>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 200,
            retry_on: default_retry_on(),
            on_retry: None,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_ms,
            ..Default::default()
        }
    }

    pub fn with_retry_on(mut self, predicate: RetryPredicate) -> Self {
        self.retry_on = predicate;
        self
    }

    pub fn with_on_retry(mut self, hook: RetryHook) -> Self {
        self.on_retry = Some(hook);
        self
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let millis = (attempt as u64).saturating_mul(self.backoff_ms);
        Duration::from_millis(millis).min(MAX_BACKOFF)
    }
}

/// Outcome of a full retry loop: the last attempt's result, and how many
/// attempts (1-indexed) were actually made.
pub struct RetryOutcome {
    pub result: ExecResult,
    pub attempts_made: u32,
}

/// Runs `make_attempt` through `sem`'s permit pool, once per attempt,
/// retrying per `config`. The thunk receives the 1-indexed attempt number so
/// the caller can derive the `-er{k}` tag suffix itself (§4.4.6) — the retry
/// harness has no opinion on tag naming.
///
/// The permit is released during backoff (`sem.use_permit` returns before
/// we sleep) and re-acquired for the next attempt, per §4.3/§5.
pub async fn execute_with_retry<F, Fut>(sem: &Semaphore, config: &RetryConfig, mut make_attempt: F) -> RetryOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ExecResult>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        let result = sem.use_permit(|| make_attempt(attempt)).await;

        let is_last = attempt >= max_attempts;
        let should_retry = !is_last && (config.retry_on)(&result);

        if !should_retry {
            return RetryOutcome {
                result,
                attempts_made: attempt,
            };
        }

        if let Some(hook) = &config.on_retry {
            hook(attempt, &result);
        }
        tokio::time::sleep(config.backoff_for(attempt)).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{FileMap, Status};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn result(status: Status) -> ExecResult {
        ExecResult {
            status,
            data: None,
            files: FileMap::new(),
            tag: "t".to_string(),
            sandbox_id: "sbx".to_string(),
            error: None,
        }
    }

    #[tokio::test]
    async fn returns_last_attempt_regardless_of_status() {
        let sem = Semaphore::new(1).unwrap();
        let config = RetryConfig::new(2, 1);
        let calls = AtomicU32::new(0);
        let outcome = execute_with_retry(&sem, &config, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { result(Status::Error) }
        })
        .await;
        assert_eq!(outcome.attempts_made, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!outcome.result.is_success());
    }

    #[tokio::test]
    async fn stops_retrying_once_predicate_says_no() {
        let sem = Semaphore::new(1).unwrap();
        let config = RetryConfig::new(5, 1);
        let outcome = execute_with_retry(&sem, &config, |attempt| async move {
            if attempt == 1 {
                result(Status::Error)
            } else {
                result(Status::Success)
            }
        })
        .await;
        assert_eq!(outcome.attempts_made, 2);
        assert!(outcome.result.is_success());
    }

    #[test]
    fn backoff_is_linear_and_capped() {
        let config = RetryConfig::new(100, 1000);
        assert_eq!(config.backoff_for(1), Duration::from_millis(1000));
        assert_eq!(config.backoff_for(50), MAX_BACKOFF);
    }
}
