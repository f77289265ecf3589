//! Lifecycle event fan-out (design note: "From callback-rich event emitters
//! to message passing"). Replaces the source SDK's `EventEmitter` surface
//! with a `tokio::sync::broadcast` channel: any number of listeners can
//! subscribe or drop at any time, including mid-run, without the publisher
//! needing to track listener identity.

use serde::Serialize;

use crate::observability::BaseMeta;

/// One observable moment in a swarm or pipeline run. Delivery is ordered
/// within a single operation and best-effort across operations (§4.5 step
/// 4) — a lagging subscriber simply misses the oldest buffered events,
/// which `tokio::sync::broadcast` surfaces as a `Lagged` receiver error
/// rather than silently dropping without signal.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LifecycleEvent {
    StepStart {
        pipeline_run_id: String,
        step_index: usize,
        step_name: String,
    },
    StepComplete {
        pipeline_run_id: String,
        step_index: usize,
        step_name: String,
    },
    StepError {
        pipeline_run_id: String,
        step_index: usize,
        step_name: String,
        message: String,
    },
    ItemRetry {
        tag: String,
        attempt: u32,
        meta: BaseMeta,
    },
    WorkerComplete {
        tag: String,
        meta: BaseMeta,
    },
    VerifierComplete {
        tag: String,
        passed: bool,
        meta: BaseMeta,
    },
    CandidateComplete {
        tag: String,
        candidate_index: usize,
        meta: BaseMeta,
    },
    JudgeComplete {
        tag: String,
        winner: usize,
        meta: BaseMeta,
    },
}

/// Default channel capacity, matching the teacher's event bus; large enough
/// that a subscriber processing events synchronously under normal load
/// never lags behind a single swarm call.
pub const DEFAULT_CAPACITY: usize = 256;

/// Registry of lifecycle-event subscribers for one `Swarm`/`Pipeline`.
///
/// Cloning an `EventRegistry` clones the sender handle, not the channel —
/// all clones publish to and can subscribe from the same underlying bus.
#[derive(Clone)]
pub struct EventRegistry {
    sender: tokio::sync::broadcast::Sender<LifecycleEvent>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _receiver) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Registers a new listener. May be called at any point, including
    /// while events are actively being published.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event to every currently-subscribed listener. A publish
    /// with zero subscribers is not an error — it simply has no effect.
    pub fn publish(&self, event: LifecycleEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_all_subscribers() {
        let registry = EventRegistry::new();
        let mut a = registry.subscribe();
        let mut b = registry.subscribe();

        registry.publish(LifecycleEvent::StepStart {
            pipeline_run_id: "run1".to_string(),
            step_index: 0,
            step_name: "analyze".to_string(),
        });

        let ev_a = a.recv().await.unwrap();
        let ev_b = b.recv().await.unwrap();
        assert!(matches!(ev_a, LifecycleEvent::StepStart { step_index: 0, .. }));
        assert!(matches!(ev_b, LifecycleEvent::StepStart { step_index: 0, .. }));
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let registry = EventRegistry::new();
        registry.publish(LifecycleEvent::StepStart {
            pipeline_run_id: "run1".to_string(),
            step_index: 0,
            step_name: "analyze".to_string(),
        });
        let mut late = registry.subscribe();
        registry.publish(LifecycleEvent::StepComplete {
            pipeline_run_id: "run1".to_string(),
            step_index: 0,
            step_name: "analyze".to_string(),
        });
        let ev = late.recv().await.unwrap();
        assert!(matches!(ev, LifecycleEvent::StepComplete { .. }));
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let registry = EventRegistry::new();
        registry.publish(LifecycleEvent::StepStart {
            pipeline_run_id: "run1".to_string(),
            step_index: 0,
            step_name: "analyze".to_string(),
        });
    }
}
