//! `reduce` (§4.4.3): a single executor call whose context is the
//! concatenation of every item's files, each rooted under `inputs/{i}/`.

use crate::executor::{FileMap, SwarmResult};
use crate::observability::{BaseMeta, OperationKind, Role};

use super::map::MapOptions;
use super::SwarmHandle;

/// `ReduceResult` (§4.4.3): a single `SwarmResult` plus the input-count
/// bookkeeping in `meta`.
pub struct ReduceResult {
    pub operation_id: String,
    pub result: SwarmResult,
    pub input_count: usize,
    pub input_indices: Vec<usize>,
}

/// Concatenates `items` under `inputs/{i}/...` and runs a single reduce
/// worker, with the same retry/verify wrapping as a map item (bestOf does
/// not apply to reduce — it has no per-candidate item to fan out over).
pub(super) async fn run_reduce(swarm: &SwarmHandle, items: Vec<FileMap>, prompt: String, opts: &MapOptions, operation_id: &str) -> ReduceResult {
    let input_count = items.len();
    let input_indices: Vec<usize> = (0..input_count).collect();

    let mut context = FileMap::new();
    for (i, item) in items.into_iter().enumerate() {
        for (path, content) in item {
            context.insert(format!("inputs/{i}/{path}"), content);
        }
    }

    let base_tag = super::tags::base_tag(&swarm.tag, "reduce", None);
    let worker_opts = opts.worker_options();
    let mut meta = BaseMeta::new(operation_id, OperationKind::Reduce, swarm.tag.clone(), Role::Worker)
        .with_operation_name(opts.name.clone().or_else(|| Some("reduce".to_string())));

    let swarm_result = if let Some(verify_cfg) = &opts.verify {
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
        swarm_result
    } else {
        let outcome = super::exec::invoke_with_retry(&swarm.executor, &swarm.semaphore, &base_tag, context, prompt, &worker_opts, opts.retry.as_ref(), &meta).await;
        if outcome.attempts_made > 1 {
            meta = meta.with_error_retry(outcome.attempts_made - 1);
        }
        SwarmResult::new(outcome.result, meta)
    };

    ReduceResult {
        operation_id: operation_id.to_string(),
        result: swarm_result,
        input_count,
        input_indices,
    }
}
