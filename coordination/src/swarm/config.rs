//! `SwarmConfig` (§3): immutable description of one swarm of agent
//! invocations. Follows the `SwarmConfig`/`EnsembleConfig` convention
//! elsewhere in this codebase — a plain struct built through a small
//! builder, validated once at construction, never mutated after.

use crate::error::{Error, Result};

/// Identifies which agent CLI family a swarm invokes. Output parsing and
/// CLI-argument construction for each family are out of scope (non-goal);
/// this only needs to be a stable label for tagging and environment
/// injection downstream in `swarm-agents`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub name: String,
    pub model: Option<String>,
}

impl AgentDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Immutable swarm configuration (§3). The sandbox provider itself is not
/// held here — it is baked into whichever `Executor` impl the caller
/// constructs the `Swarm` with, since this crate has no sandbox knowledge
/// (that lives in `swarm-agents`).
#[derive(Debug, Clone)]
pub struct SwarmConfig {
    pub agent: AgentDescriptor,
    /// `N`, the shared concurrency budget (C1). Must be `>= 1`.
    pub concurrency: usize,
    /// Stable tag prefix (`SwarmConfig.tag` in §4.8's `swarmName` field).
    pub tag: String,
    pub default_skills: Vec<String>,
    /// Whether observability metadata is attached even when the caller
    /// doesn't explicitly ask for it — the design always attaches it
    /// (§4.8 says "always"), so this mainly controls whether it is also
    /// emitted via the lifecycle event bus.
    pub default_observability: bool,
}

pub struct SwarmConfigBuilder {
    agent: AgentDescriptor,
    concurrency: usize,
    tag: String,
    default_skills: Vec<String>,
    default_observability: bool,
}

impl SwarmConfig {
    pub fn builder(agent: AgentDescriptor, tag: impl Into<String>) -> SwarmConfigBuilder {
        SwarmConfigBuilder {
            agent,
            concurrency: 4,
            tag: tag.into(),
            default_skills: Vec::new(),
            default_observability: true,
        }
    }
}

impl SwarmConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn default_skills(mut self, skills: Vec<String>) -> Self {
        self.default_skills = skills;
        self
    }

    pub fn default_observability(mut self, enabled: bool) -> Self {
        self.default_observability = enabled;
        self
    }

    pub fn build(self) -> Result<SwarmConfig> {
        if self.concurrency < 1 {
            return Err(Error::invalid_argument("SwarmConfig.concurrency must be >= 1"));
        }
        if self.tag.is_empty() {
            return Err(Error::invalid_argument("SwarmConfig.tag must not be empty"));
        }
        Ok(SwarmConfig {
            agent: self.agent,
            concurrency: self.concurrency,
            tag: self.tag,
            default_skills: self.default_skills,
            default_observability: self.default_observability,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_concurrency() {
        let err = SwarmConfig::builder(AgentDescriptor::new("claude"), "T").concurrency(0).build();
        assert!(err.is_err());
    }

    #[test]
    fn rejects_empty_tag() {
        let err = SwarmConfig::builder(AgentDescriptor::new("claude"), "").build();
        assert!(err.is_err());
    }

    #[test]
    fn builds_with_defaults() {
        let cfg = SwarmConfig::builder(AgentDescriptor::new("claude"), "T").build().unwrap();
        assert_eq!(cfg.concurrency, 4);
        assert_eq!(cfg.tag, "T");
    }
}
