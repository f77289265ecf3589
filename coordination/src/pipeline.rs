//! Pipeline (C6): fluent multi-step composition over the Swarm engine,
//! threading a `PipelineContext` through every step.
//!
//! Type-level constraint from §4.5: `reduce` is terminal, `map`/`filter`
//! are chainable. Modeled with a typestate marker rather than a runtime
//! check, so `Pipeline::new(..).reduce(..).map(..)` fails to compile.

use std::marker::PhantomData;

use crate::error::Result;
use crate::events::LifecycleEvent;
use crate::executor::FileMap;
use crate::observability::{new_hex_id, PipelineContext};
use crate::swarm::{FilterCondition, MapOptions, Swarm};

/// Typestate marker: more steps may be appended.
pub struct Open;
/// Typestate marker: a terminal step (`reduce`) has been appended; no
/// further steps may be chained.
pub struct Closed;

enum Step {
    Map { name: Option<String>, prompt: String, opts: MapOptions },
    Filter { name: Option<String>, prompt: String, condition: FilterCondition, opts: MapOptions },
    Reduce { name: Option<String>, prompt: String, opts: MapOptions },
}

impl Step {
    fn name(&self) -> Option<&str> {
        match self {
            Step::Map { name, .. } | Step::Filter { name, .. } | Step::Reduce { name, .. } => name.as_deref(),
        }
    }
}

/// Per-step outcome, carrying the `.success` sequence fed to the next step
/// plus the raw results for inspection.
pub enum StepResult {
    Map(crate::swarm::MapResult),
    Filter(crate::swarm::FilterResult),
    Reduce(crate::swarm::ReduceResult),
}

impl StepResult {
    /// The `.success` file-map sequence handed to the next step. A step
    /// with an empty `.success` sequence still lets downstream steps run —
    /// vacuously, over zero items (§4.5 failure policy).
    fn success_contexts(&self) -> Vec<FileMap> {
        match self {
            StepResult::Map(m) => m.success().into_iter().map(|r| r.result.files.clone()).collect(),
            StepResult::Filter(f) => f.success().into_iter().map(|r| r.result.files.clone()).collect(),
            StepResult::Reduce(r) => {
                if r.result.is_success() {
                    vec![r.result.result.files.clone()]
                } else {
                    Vec::new()
                }
            }
        }
    }

    pub fn meta_of_results(&self) -> Vec<&crate::observability::BaseMeta> {
        match self {
            StepResult::Map(m) => m.results.iter().map(|r| &r.meta).collect(),
            StepResult::Filter(f) => f.results.iter().map(|r| &r.meta).collect(),
            StepResult::Reduce(r) => vec![&r.result.meta],
        }
    }
}

/// The full output of `Pipeline::run` (§4.5 step 5).
pub struct PipelineRunResult {
    pub pipeline_run_id: String,
    pub steps: Vec<StepResult>,
}

/// Fluent builder over a borrowed `Swarm`. `state` is a zero-sized
/// typestate marker; it carries no runtime data.
pub struct Pipeline<'a, State = Open> {
    swarm: &'a Swarm,
    steps: Vec<Step>,
    _state: PhantomData<State>,
}

impl<'a> Pipeline<'a, Open> {
    pub fn new(swarm: &'a Swarm) -> Self {
        Self {
            swarm,
            steps: Vec::new(),
            _state: PhantomData,
        }
    }

    pub fn map(mut self, prompt: impl Into<String>, opts: MapOptions) -> Self {
        self.steps.push(Step::Map {
            name: opts.name.clone(),
            prompt: prompt.into(),
            opts,
        });
        self
    }

    pub fn filter(mut self, prompt: impl Into<String>, condition: FilterCondition, opts: MapOptions) -> Self {
        self.steps.push(Step::Filter {
            name: opts.name.clone(),
            prompt: prompt.into(),
            condition,
            opts,
        });
        self
    }

    /// Terminal step: consumes `self` and returns a `Pipeline<Closed>`,
    /// which has no further chaining methods.
    pub fn reduce(mut self, prompt: impl Into<String>, opts: MapOptions) -> Pipeline<'a, Closed> {
        self.steps.push(Step::Reduce {
            name: opts.name.clone(),
            prompt: prompt.into(),
            opts,
        });
        Pipeline {
            swarm: self.swarm,
            steps: self.steps,
            _state: PhantomData,
        }
    }
}

impl<'a, State> Pipeline<'a, State> {
    /// Runs every step in declaration order (§4.5). Available regardless
    /// of typestate: a pipeline with no terminal `reduce` is legal, it just
    /// ends after its last `map`/`filter`.
    pub async fn run(self, items: Vec<FileMap>) -> Result<PipelineRunResult> {
        let pipeline_run_id = new_hex_id();
        let events = self.swarm.events();
        let mut current_items = items;
        let mut steps = Vec::with_capacity(self.steps.len());

        for (step_index, step) in self.steps.into_iter().enumerate() {
            let step_name = step.name().unwrap_or("step").to_string();
            let ctx = PipelineContext {
                pipeline_run_id: pipeline_run_id.clone(),
                step_index,
                step_name: step_name.clone(),
                swarm_name: self.swarm.config.tag.clone(),
            };

            events.publish(LifecycleEvent::StepStart {
                pipeline_run_id: pipeline_run_id.clone(),
                step_index,
                step_name: step_name.clone(),
            });

            let outcome = match step {
                Step::Map { prompt, opts, .. } => {
                    let opts = stamp_pipeline_context(opts);
                    self.swarm.map(current_items, prompt, opts).await.map(|r| StepResult::Map(stamp_map_result(r, &ctx)))
                }
                Step::Filter { prompt, condition, opts, .. } => {
                    let opts = stamp_pipeline_context(opts);
                    self.swarm
                        .filter(current_items, prompt, condition, opts)
                        .await
                        .map(|r| StepResult::Filter(stamp_filter_result(r, &ctx)))
                }
                Step::Reduce { prompt, opts, .. } => {
                    let opts = stamp_pipeline_context(opts);
                    self.swarm.reduce(current_items, prompt, opts).await.map(|mut r| {
                        r.result.meta = r.result.meta.with_pipeline_context(&ctx);
                        StepResult::Reduce(r)
                    })
                }
            };

            let step_result = match outcome {
                Ok(result) => result,
                Err(err) => {
                    events.publish(LifecycleEvent::StepError {
                        pipeline_run_id: pipeline_run_id.clone(),
                        step_index,
                        step_name,
                        message: err.to_string(),
                    });
                    return Err(err);
                }
            };

            events.publish(LifecycleEvent::StepComplete {
                pipeline_run_id: pipeline_run_id.clone(),
                step_index,
                step_name,
            });

            current_items = step_result.success_contexts();
            steps.push(step_result);
        }

        Ok(PipelineRunResult { pipeline_run_id, steps })
    }
}

fn stamp_pipeline_context(opts: MapOptions) -> MapOptions {
    // The step name is already carried on `opts.name`; `stepIndex`/
    // `pipelineRunId` are stamped onto each result's `meta` after the
    // operation returns (`stamp_map_result`/`stamp_filter_result`), since
    // `Swarm::map`/`filter` mint their own `BaseMeta` unaware of pipelines.
    opts
}

fn stamp_map_result(mut result: crate::swarm::MapResult, ctx: &PipelineContext) -> crate::swarm::MapResult {
    for r in &mut result.results {
        r.meta = r.meta.clone().with_pipeline_context(ctx);
    }
    result
}

fn stamp_filter_result(mut result: crate::swarm::FilterResult, ctx: &PipelineContext) -> crate::swarm::FilterResult {
    for r in &mut result.results {
        r.meta = r.meta.clone().with_pipeline_context(ctx);
    }
    result
}
