//! Shared helpers for invoking the `Executor` with and without error-retry.
//! Used by `map`/`filter`/`reduce` (worker calls), `best_of` (candidate and
//! judge calls) and `verify` (worker and verifier calls) alike, so the
//! error-retry tag-chaining logic (§4.4.6) lives in exactly one place.

use std::sync::Arc;
use std::time::Duration;

use crate::executor::{ExecOptions, ExecResult, Executor, FileMap};
use crate::observability::BaseMeta;
use crate::retry::{execute_with_retry, RetryConfig};
use crate::schema::Schema;
use crate::semaphore::Semaphore;

use super::tags;

/// Per-call knobs that don't vary across retry/verify attempts.
#[derive(Clone, Default)]
pub struct WorkerOptions {
    pub timeout: Duration,
    pub schema: Option<Schema>,
    pub system_prompt: Option<String>,
    pub skills: Vec<String>,
}

/// Invokes the executor exactly once, with no retry. Used for verifier and
/// judge calls, which always run at most once per attempt.
pub async fn invoke_once(
    executor: &Arc<dyn Executor>,
    tag_prefix: String,
    context: FileMap,
    prompt: String,
    opts: &WorkerOptions,
    meta: BaseMeta,
) -> ExecResult {
    let exec_opts = ExecOptions {
        tag_prefix,
        timeout: opts.timeout,
        schema: opts.schema.clone(),
        system_prompt: opts.system_prompt.clone(),
        skills: opts.skills.clone(),
        observability: meta,
    };
    executor.execute(context, &prompt, exec_opts).await
}

/// Outcome of an error-retry-wrapped worker invocation: the final result,
/// the tag prefix that produced it (needed by the caller to derive the
/// verifier tag), and how many attempts were made.
pub struct WorkerOutcome {
    pub result: ExecResult,
    pub final_tag_prefix: String,
    pub attempts_made: u32,
}

/// Runs one worker through the C4 retry harness, deriving each attempt's
/// tag prefix via the `-er{k}` chain (§4.4.6) and stamping `errorRetry` on
/// the observability metadata from the second attempt on.
pub async fn invoke_with_retry(
    executor: &Arc<dyn Executor>,
    sem: &Semaphore,
    base_tag_prefix: &str,
    context: FileMap,
    prompt: String,
    opts: &WorkerOptions,
    retry: Option<&RetryConfig>,
    meta_template: &BaseMeta,
) -> WorkerOutcome {
    let default_retry = RetryConfig::default();
    let retry = retry.unwrap_or(&default_retry);

    let outcome = execute_with_retry(sem, retry, |attempt| {
        let tag_prefix = if attempt == 1 {
            base_tag_prefix.to_string()
        } else {
            tags::with_error_retry(base_tag_prefix, attempt - 1)
        };
        let mut meta = meta_template.clone();
        if attempt > 1 {
            meta = meta.with_error_retry(attempt - 1);
        }
        let context = context.clone();
        let prompt = prompt.clone();
        let executor = executor.clone();
        let opts = opts.clone();
        async move { invoke_once(&executor, tag_prefix, context, prompt, &opts, meta).await }
    })
    .await;

    let final_tag_prefix = if outcome.attempts_made == 1 {
        base_tag_prefix.to_string()
    } else {
        tags::with_error_retry(base_tag_prefix, outcome.attempts_made - 1)
    };

    WorkerOutcome {
        result: outcome.result,
        final_tag_prefix,
        attempts_made: outcome.attempts_made,
    }
}
