//! `map` (§4.4.1): launches one executor per item, preserving index
//! alignment in the returned sequence.

use crate::error::{Error, Result};
use crate::executor::{FileMap, SwarmResult};
use crate::observability::{BaseMeta, OperationKind, Role};
use crate::retry::RetryConfig;
use crate::schema::Schema;

use super::best_of::BestOfConfig;
use super::exec::WorkerOptions;
use super::verify::VerifyConfig;
use super::SwarmHandle;

/// Options shared by `map` and `filter` (identical shape per §4.4.2).
#[derive(Clone, Default)]
pub struct MapOptions {
    pub name: Option<String>,
    pub timeout: std::time::Duration,
    pub schema: Option<Schema>,
    pub system_prompt: Option<String>,
    pub skills: Vec<String>,
    pub retry: Option<RetryConfig>,
    pub verify: Option<VerifyConfig>,
    pub best_of: Option<BestOfConfig>,
}

impl MapOptions {
    /// `verify` and `bestOf` are mutually exclusive (§4.4.1); validated
    /// once up front so no work starts before the conflict is caught.
    pub fn validate(&self) -> Result<()> {
        if self.verify.is_some() && self.best_of.is_some() {
            return Err(Error::invalid_argument("verify and bestOf are mutually exclusive"));
        }
        Ok(())
    }

    pub(super) fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            timeout: self.timeout,
            schema: self.schema.clone(),
            system_prompt: self.system_prompt.clone(),
            skills: self.skills.clone(),
        }
    }
}

/// Result of a `map` call: the ordered, index-aligned sequence of
/// `SwarmResult`s, plus `.success`/`.error` projections (§4.4.1).
pub struct MapResult {
    pub operation_id: String,
    pub results: Vec<SwarmResult>,
}

impl MapResult {
    pub fn success(&self) -> Vec<&SwarmResult> {
        self.results.iter().filter(|r| r.is_success()).collect()
    }

    pub fn error(&self) -> Vec<&SwarmResult> {
        self.results.iter().filter(|r| !r.is_success()).collect()
    }
}

/// Runs one item of a map-like operation (worker, possibly wrapped in
/// verify or bestOf) and returns its `SwarmResult`. Shared by `map` and
/// `filter`, which differ only in how they project the `.success` sequence.
pub(super) async fn run_map_item(swarm: &SwarmHandle, op: OperationKind, item_index: usize, context: FileMap, prompt: String, opts: &MapOptions, operation_id: &str) -> SwarmResult {
    let base_tag = super::tags::base_tag(&swarm.tag, op.as_str(), Some(item_index));
    let worker_opts = opts.worker_options();

    let mut meta = BaseMeta::new(operation_id, op, swarm.tag.clone(), Role::Worker)
        .with_operation_name(opts.name.clone().or(Some(op.as_str().to_string())))
        .with_item_index(item_index);

    if let Some(best_of_cfg) = &opts.best_of {
        meta.role = Role::Candidate;
        return super::best_of::run_best_of(&swarm.executor, &swarm.semaphore, Some(&base_tag), context, prompt, &worker_opts, best_of_cfg, &meta)
            .await
            .unwrap_or_else(|e| {
                // Contract violation: surfaced as an in-band error result so
                // one item's bestOf failure never aborts its siblings within
                // map/filter (only a standalone bestOf call propagates the
                // `Err` to its caller).
                SwarmResult::new(
                    crate::executor::ExecResult {
                        status: crate::executor::Status::Error,
                        data: None,
                        files: FileMap::new(),
                        tag: base_tag.clone(),
                        sandbox_id: String::new(),
                        error: Some(e.to_string()),
                    },
                    meta,
                )
            });
    }

    if let Some(verify_cfg) = &opts.verify {
        let outcome = super::verify::run_verified_worker(
            &swarm.executor,
            &swarm.semaphore,
            &base_tag,
            context,
            prompt,
            &worker_opts,
            opts.retry.as_ref(),
            verify_cfg,
            &meta,
        )
        .await;
        let mut swarm_result = SwarmResult::new(outcome.result, outcome.last_meta);
        swarm_result.verify = Some(outcome.verify_info);
        return swarm_result;
    }

    let outcome = super::exec::invoke_with_retry(&swarm.executor, &swarm.semaphore, &base_tag, context, prompt, &worker_opts, opts.retry.as_ref(), &meta);
    let outcome = outcome.await;
    if outcome.attempts_made > 1 {
        meta = meta.with_error_retry(outcome.attempts_made - 1);
    }
    SwarmResult::new(outcome.result, meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_verify_and_bestof_together() {
        let mut opts = MapOptions::default();
        opts.verify = Some(VerifyConfig::new("criteria", 2));
        opts.best_of = Some(BestOfConfig::new(3));
        assert!(opts.validate().is_err());
    }
}
