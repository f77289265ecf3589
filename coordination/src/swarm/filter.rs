//! `filter` (§4.4.2): identical to `map`, but a `condition(data) -> bool`
//! routes successful-but-rejected items to `.rejected` instead of
//! `.success`.

use std::sync::Arc;

use crate::executor::SwarmResult;

/// `condition(data) -> bool`, evaluated only on `status=success` results.
pub type FilterCondition = Arc<dyn Fn(&serde_json::Value) -> bool + Send + Sync>;

pub struct FilterResult {
    pub operation_id: String,
    pub results: Vec<SwarmResult>,
    pub condition: FilterCondition,
}

impl FilterResult {
    /// Items with both `status=success` and `condition(data) = true`.
    pub fn success(&self) -> Vec<&SwarmResult> {
        self.results
            .iter()
            .filter(|r| r.is_success() && r.result.data.as_ref().is_some_and(|d| (self.condition)(d)))
            .collect()
    }

    /// Items that failed the condition, per §4.4.2: "still produced but
    /// routed to `.rejected`" — this includes both condition=false
    /// successes and `status=error` results, mirroring the source's
    /// behavior of always producing a result for every item.
    pub fn rejected(&self) -> Vec<&SwarmResult> {
        self.results
            .iter()
            .filter(|r| !r.is_success() || !r.result.data.as_ref().is_some_and(|d| (self.condition)(d)))
            .collect()
    }

    pub fn error(&self) -> Vec<&SwarmResult> {
        self.results.iter().filter(|r| !r.is_success()).collect()
    }
}

pub(super) fn default_condition() -> FilterCondition {
    Arc::new(|_| true)
}
