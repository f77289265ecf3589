//! Observability metadata (C9): operation-id/pipeline-id generation and the
//! `BaseMeta`/`PipelineContext` records stamped onto every result.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// The role an executor invocation played within its operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Worker,
    Verifier,
    Candidate,
    Judge,
}

/// The public operation that minted an `operationId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Map,
    Filter,
    Reduce,
    Bestof,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Map => "map",
            OperationKind::Filter => "filter",
            OperationKind::Reduce => "reduce",
            OperationKind::Bestof => "bestof",
        }
    }
}

/// Generates a 16-hex-char random id, used for both `operationId` and
/// `pipelineRunId`. 64 bits of randomness is enough to make collisions
/// within a single process run practically impossible.
pub fn new_hex_id() -> String {
    let bits: u64 = rand::thread_rng().gen();
    format!("{bits:016x}")
}

/// Observability record attached to every `SwarmResult`.
///
/// Mirrors §4.8 of the design: all fields are always present in the struct,
/// but the optional ones are only ever `Some` in the circumstances the table
/// describes (e.g. `errorRetry` stays `None` on first attempts, never
/// `Some(0)`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseMeta {
    pub operation_id: String,
    pub operation: String,
    pub swarm_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_index: Option<usize>,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_retry: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_retry: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_step_index: Option<usize>,
}

impl BaseMeta {
    pub fn new(operation_id: impl Into<String>, operation: OperationKind, swarm_name: impl Into<String>, role: Role) -> Self {
        Self {
            operation_id: operation_id.into(),
            operation: operation.as_str().to_string(),
            swarm_name: swarm_name.into(),
            operation_name: None,
            item_index: None,
            role,
            error_retry: None,
            verify_retry: None,
            candidate_index: None,
            pipeline_run_id: None,
            pipeline_step_index: None,
        }
    }

    pub fn with_operation_name(mut self, name: Option<String>) -> Self {
        self.operation_name = name;
        self
    }

    pub fn with_item_index(mut self, i: usize) -> Self {
        self.item_index = Some(i);
        self
    }

    pub fn with_candidate_index(mut self, k: usize) -> Self {
        self.candidate_index = Some(k);
        self
    }

    pub fn with_error_retry(mut self, k: u32) -> Self {
        self.error_retry = Some(k);
        self
    }

    pub fn with_verify_retry(mut self, v: u32) -> Self {
        self.verify_retry = Some(v);
        self
    }

    pub fn with_pipeline_context(mut self, ctx: &PipelineContext) -> Self {
        self.pipeline_run_id = Some(ctx.pipeline_run_id.clone());
        self.pipeline_step_index = Some(ctx.step_index);
        self.operation_name = Some(ctx.step_name.clone());
        self
    }
}

/// Threaded through every step of a `Pipeline::run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineContext {
    pub pipeline_run_id: String,
    pub step_index: usize,
    pub step_name: String,
    pub swarm_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_hex_id_is_16_lowercase_hex_chars() {
        let id = new_hex_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn first_attempt_has_no_error_retry() {
        let meta = BaseMeta::new("op1", OperationKind::Map, "swarm", Role::Worker);
        assert!(meta.error_retry.is_none());
    }

    #[test]
    fn kth_retry_sets_one_indexed_error_retry() {
        let meta = BaseMeta::new("op1", OperationKind::Map, "swarm", Role::Worker).with_error_retry(1);
        assert_eq!(meta.error_retry, Some(1));
    }
}
