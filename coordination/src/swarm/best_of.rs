//! `bestOf` wrapper (§4.4.4): N concurrent candidates, then one judge that
//! picks a winner once every candidate has finished.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::error::{Error, Result};
use crate::executor::{Executor, FileMap, JudgeDecision, Status};
use crate::observability::{BaseMeta, Role};
use crate::retry::RetryConfig;
use crate::semaphore::Semaphore;

use super::exec::{invoke_once, invoke_with_retry, WorkerOptions};
use super::tags;
use crate::executor::{BestOfInfo, SwarmResult};

/// `bestOf` configuration (§4.4.4). `n` must be `>= 2`.
#[derive(Clone)]
pub struct BestOfConfig {
    pub n: usize,
    /// Applies ONLY to candidates. The judge always uses
    /// `RetryConfig::default()` regardless of what is set here — enforced
    /// here at the call site, per the design note on retry predicates.
    pub candidate_retry: Option<RetryConfig>,
}

impl BestOfConfig {
    pub fn new(n: usize) -> Self {
        Self { n: n.max(2), candidate_retry: None }
    }
}

/// Runs `n` candidates concurrently, then a single judge, returning the
/// winning candidate's `SwarmResult` annotated with `bestOf` info.
///
/// `base` is the map/filter item's base tag (`T-map-0`) or `None` for a
/// standalone `bestOf` call, per the tag-naming contract's handling of the
/// omitted `-{op}-{i}` segment.
#[allow(clippy::too_many_arguments)]
pub async fn run_best_of(
    executor: &Arc<dyn Executor>,
    sem: &Semaphore,
    base: Option<&str>,
    context: FileMap,
    prompt: String,
    worker_opts: &WorkerOptions,
    cfg: &BestOfConfig,
    meta_template: &BaseMeta,
) -> Result<SwarmResult> {
    let mut join_set: JoinSet<(usize, crate::executor::ExecResult, BaseMeta)> = JoinSet::new();

    for k in 0..cfg.n {
        let tag = tags::bestof_candidate_tag(base, k);
        let mut meta = meta_template.clone();
        meta.role = Role::Candidate;
        meta = meta.with_candidate_index(k);

        let executor = executor.clone();
        let sem = sem.clone();
        let context = context.clone();
        let prompt = prompt.clone();
        let worker_opts = worker_opts.clone();
        let retry = cfg.candidate_retry.clone();

        join_set.spawn(async move {
            let outcome = invoke_with_retry(&executor, &sem, &tag, context, prompt, &worker_opts, retry.as_ref(), &meta).await;
            let mut final_meta = meta;
            if outcome.attempts_made > 1 {
                final_meta = final_meta.with_error_retry(outcome.attempts_made - 1);
            }
            (k, outcome.result, final_meta)
        });
    }

    let mut candidates: Vec<Option<(crate::executor::ExecResult, BaseMeta)>> = (0..cfg.n).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        let (k, result, meta) = joined.expect("candidate task panicked");
        candidates[k] = Some((result, meta));
    }
    let candidates: Vec<SwarmResult> = candidates
        .into_iter()
        .map(|c| {
            let (result, meta) = c.expect("every candidate index was spawned exactly once");
            SwarmResult::new(result, meta)
        })
        .collect();

    // Judge launches only after every candidate has completed.
    let judge_tag = tags::bestof_judge_tag(base);
    let mut judge_meta = meta_template.clone();
    judge_meta.role = Role::Judge;

    let mut judge_context = FileMap::new();
    for (k, candidate) in candidates.iter().enumerate() {
        for (path, content) in &candidate.result.files {
            judge_context.insert(format!("candidates/{k}/{path}"), content.clone());
        }
    }
    let judge_prompt = format!(
        "Pick the best of {} candidates. Respond with JSON {{\"winner\": <index>, \"reasoning\": <string>}}.\n\n{}",
        cfg.n, prompt
    );

    let judge_result = invoke_once(executor, judge_tag, judge_context, judge_prompt, worker_opts, judge_meta.clone()).await;

    if judge_result.status != Status::Success {
        return Err(Error::invalid_judge_decision("judge invocation failed"));
    }
    let decision: JudgeDecision = judge_result
        .data
        .as_ref()
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .ok_or_else(|| Error::invalid_judge_decision("judge returned no parseable decision"))?;

    if decision.winner >= candidates.len() {
        return Err(Error::invalid_judge_decision(format!(
            "judge winner index {} out of range for {} candidates",
            decision.winner,
            candidates.len()
        )));
    }

    let winner = candidates[decision.winner].clone();
    let mut swarm_result = winner;
    swarm_result.best_of = Some(Box::new(BestOfInfo {
        candidates,
        judge_decision: decision,
        judge_meta,
    }));
    Ok(swarm_result)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecOptions, ExecResult};
    use crate::observability::OperationKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct CountingExecutor {
        concurrent: AtomicUsize,
        max_seen: AtomicUsize,
        start_order: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl Executor for CountingExecutor {
        async fn execute(&self, _context: FileMap, _prompt: &str, opts: ExecOptions) -> ExecResult {
            self.start_order.lock().unwrap().push(opts.tag_prefix.clone());
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.concurrent.fetch_sub(1, Ordering::SeqCst);

            if opts.tag_prefix.ends_with("-bestof-judge") {
                ExecResult {
                    status: Status::Success,
                    data: Some(serde_json::json!({"winner": 0, "reasoning": "best"})),
                    files: FileMap::new(),
                    tag: format!("{}-abc123", opts.tag_prefix),
                    sandbox_id: "sbx".to_string(),
                    error: None,
                }
            } else {
                ExecResult {
                    status: Status::Success,
                    data: Some(serde_json::json!({"ok": true})),
                    files: FileMap::new(),
                    tag: format!("{}-abc123", opts.tag_prefix),
                    sandbox_id: "sbx".to_string(),
                    error: None,
                }
            }
        }
    }

    #[tokio::test]
    async fn scenario_m2_bestof_ordering_and_cap() {
        let executor = Arc::new(CountingExecutor {
            concurrent: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
            start_order: StdMutex::new(Vec::new()),
        });
        let dyn_executor: Arc<dyn Executor> = executor.clone();
        let sem = Semaphore::new(3).unwrap();
        let cfg = BestOfConfig::new(5);
        let worker_opts = WorkerOptions { timeout: Duration::from_secs(5), ..Default::default() };
        let meta = BaseMeta::new("op1", OperationKind::Bestof, "T", Role::Candidate);

        let result = run_best_of(&dyn_executor, &sem, None, FileMap::new(), "do the task".to_string(), &worker_opts, &cfg, &meta)
            .await
            .unwrap();

        assert!(result.best_of.is_some());
        assert!(executor.max_seen.load(Ordering::SeqCst) <= 3);
        let order = executor.start_order.lock().unwrap();
        assert_eq!(order.len(), 6);
        assert_eq!(order.last().unwrap(), "bestof-judge");
    }
}
