//! The Swarm engine (C5): `map`, `filter`, `reduce`, `bestOf`, each
//! composable with `verify` and retry, all sharing one C1 permit pool.

mod best_of;
mod config;
mod exec;
mod filter;
mod map;
mod reduce;
mod tags;
mod verify;

pub use best_of::BestOfConfig;
pub use config::{AgentDescriptor, SwarmConfig, SwarmConfigBuilder};
pub use exec::WorkerOptions;
pub use filter::{FilterCondition, FilterResult};
pub use map::{MapOptions, MapResult};
pub use reduce::ReduceResult;
pub use verify::VerifyConfig;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::error::Result;
use crate::events::{EventRegistry, LifecycleEvent};
use crate::executor::{Executor, FileMap, SwarmResult};
use crate::observability::{new_hex_id, BaseMeta, OperationKind, Role};
use crate::semaphore::Semaphore;

/// The owned, `'static`, cheaply-`Clone`-able subset of a `Swarm` that a
/// spawned item task needs: the shared executor, the shared C1 permit
/// pool, the swarm's tag, and the event registry. Kept separate from
/// `Swarm` itself (which also holds the full `SwarmConfig`) purely so
/// `map`/`filter` can clone one of these into each `tokio::spawn`ed future
/// without requiring `Swarm` itself to be `Arc`-wrapped by callers.
#[derive(Clone)]
pub(crate) struct SwarmHandle {
    executor: Arc<dyn Executor>,
    semaphore: Semaphore,
    tag: String,
    events: EventRegistry,
}

/// One configured swarm: an immutable `SwarmConfig`, a shared `Executor`,
/// and the C1 permit pool every operation launched from this swarm draws
/// from — workers, verifiers, candidates and judges alike, irrespective of
/// which public call launched them (§4.4 shared invariants).
pub struct Swarm {
    pub config: SwarmConfig,
    executor: Arc<dyn Executor>,
    semaphore: Semaphore,
    events: EventRegistry,
}

impl Swarm {
    pub fn new(config: SwarmConfig, executor: Arc<dyn Executor>) -> Result<Self> {
        let semaphore = Semaphore::new(config.concurrency)?;
        Ok(Self {
            config,
            executor,
            semaphore,
            events: EventRegistry::new(),
        })
    }

    pub fn events(&self) -> EventRegistry {
        self.events.clone()
    }

    fn handle(&self) -> SwarmHandle {
        SwarmHandle {
            executor: self.executor.clone(),
            semaphore: self.semaphore.clone(),
            tag: self.config.tag.clone(),
            events: self.events.clone(),
        }
    }

    /// `map` (§4.4.1): one executor per item, ordered and index-aligned in
    /// the result. Items are launched concurrently; the C1 semaphore is
    /// what actually bounds how many run at once (§8 scenario M1).
    pub async fn map(&self, items: Vec<FileMap>, prompt: impl Into<String>, opts: MapOptions) -> Result<MapResult> {
        opts.validate()?;
        let prompt = prompt.into();
        let operation_id = new_hex_id();
        let handle = self.handle();

        let mut join_set: JoinSet<(usize, SwarmResult)> = JoinSet::new();
        let item_count = items.len();
        for (i, context) in items.into_iter().enumerate() {
            let prompt = prompt.clone();
            let opts = opts.clone();
            let op_id = operation_id.clone();
            let handle = handle.clone();
            join_set.spawn(async move {
                let result = map::run_map_item(&handle, OperationKind::Map, i, context, prompt, &opts, &op_id).await;
                handle.events.publish(LifecycleEvent::WorkerComplete {
                    tag: result.tag().to_string(),
                    meta: result.meta.clone(),
                });
                (i, result)
            });
        }

        let results = collect_indexed(join_set, item_count, "map").await;
        Ok(MapResult { operation_id, results })
    }

    /// `filter` (§4.4.2): runs the same worker chain as `map`, then
    /// evaluates `condition` on successful results to split `.success`
    /// from `.rejected`.
    pub async fn filter(&self, items: Vec<FileMap>, prompt: impl Into<String>, condition: FilterCondition, opts: MapOptions) -> Result<FilterResult> {
        opts.validate()?;
        let prompt = prompt.into();
        let operation_id = new_hex_id();
        let handle = self.handle();

        let mut join_set: JoinSet<(usize, SwarmResult)> = JoinSet::new();
        let item_count = items.len();
        for (i, context) in items.into_iter().enumerate() {
            let prompt = prompt.clone();
            let opts = opts.clone();
            let op_id = operation_id.clone();
            let handle = handle.clone();
            join_set.spawn(async move {
                let result = map::run_map_item(&handle, OperationKind::Filter, i, context, prompt, &opts, &op_id).await;
                handle.events.publish(LifecycleEvent::WorkerComplete {
                    tag: result.tag().to_string(),
                    meta: result.meta.clone(),
                });
                (i, result)
            });
        }

        let results = collect_indexed(join_set, item_count, "filter").await;
        Ok(FilterResult { operation_id, results, condition })
    }

    /// `reduce` (§4.4.3): a single executor call over the concatenation of
    /// every item.
    pub async fn reduce(&self, items: Vec<FileMap>, prompt: impl Into<String>, opts: MapOptions) -> Result<ReduceResult> {
        opts.validate()?;
        let operation_id = new_hex_id();
        Ok(reduce::run_reduce(&self.handle(), items, prompt.into(), &opts, &operation_id).await)
    }

    /// Standalone `bestOf` (§4.4.4), not attached to a map/filter item —
    /// the tag-naming contract omits the `-{op}-{i}` segment in this case.
    pub async fn best_of(&self, context: FileMap, prompt: impl Into<String>, cfg: BestOfConfig, worker_opts: WorkerOptions) -> Result<SwarmResult> {
        let operation_id = new_hex_id();
        let meta = BaseMeta::new(operation_id, OperationKind::Bestof, self.config.tag.clone(), Role::Candidate);
        best_of::run_best_of(&self.executor, &self.semaphore, None, context, prompt.into(), &worker_opts, &cfg, &meta)
            .await
            .map_err(Into::into)
    }
}

/// Drains a `JoinSet<(index, result)>` into an index-ordered `Vec<result>`,
/// re-imposing item order after out-of-order completion (§5: "launches
/// occur in index order, but completions may be out of order; the
/// returned sequence is re-indexed back to item order").
async fn collect_indexed(mut join_set: JoinSet<(usize, SwarmResult)>, expected: usize, op_name: &str) -> Vec<SwarmResult> {
    let mut slots: Vec<Option<SwarmResult>> = (0..expected).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        let (i, result) = joined.unwrap_or_else(|e| panic!("{op_name} item task panicked: {e}"));
        slots[i] = Some(result);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(i, r)| r.unwrap_or_else(|| panic!("{op_name} item {i} never completed (expected {expected})")))
        .collect()
}

/// Default per-call timeout when none is set on `MapOptions`/`WorkerOptions`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
