//! Bounded-concurrency swarm engine.
//!
//! `coordination` is the sandbox-agnostic half of the SDK: a C1 permit pool,
//! a C4 retry harness, the C5 swarm engine (`map`/`filter`/`reduce`/`bestOf`,
//! each composable with `verify`), the C6 pipeline builder, and the C9
//! observability metadata stamped onto every result. It depends on nothing
//! sandbox- or checkpoint-shaped — those live in `swarm_agents`, which
//! depends on this crate for `Executor`, `SwarmConfig`, and the result types.

#![allow(clippy::uninlined_format_args)]

pub mod error;
pub mod events;
pub mod executor;
pub mod observability;
pub mod pipeline;
pub mod retry;
pub mod schema;
pub mod semaphore;
pub mod swarm;

pub use error::{Error, Result};
pub use events::{EventRegistry, LifecycleEvent};
pub use executor::{
    BestOfInfo, ExecOptions, ExecResult, Executor, FileContent, FileMap, JudgeDecision, Status,
    SwarmResult, VerifyInfo,
};
pub use observability::{new_hex_id, BaseMeta, OperationKind, PipelineContext, Role};
pub use pipeline::{Pipeline, PipelineRunResult, StepResult};
pub use retry::{default_retry_on, RetryConfig, RetryHook, RetryPredicate};
pub use schema::Schema;
pub use semaphore::Semaphore;
pub use swarm::{
    AgentDescriptor, BestOfConfig, FilterCondition, FilterResult, MapOptions, MapResult,
    ReduceResult, Swarm, SwarmConfig, SwarmConfigBuilder, VerifyConfig, WorkerOptions,
};
