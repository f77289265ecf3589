//! CLI smoke-test harness for the swarm engine.
//!
//! `coordination` has no sandbox of its own — this binary exists so the
//! engine's concurrency/tag-naming/observability behavior can be exercised
//! and eyeballed without wiring up `swarm_agents`' real executor. It wires a
//! trivial in-process echo `Executor` into a `Swarm` and runs `map` over
//! `--items` synthetic items, printing one JSON line per result.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use coordination::{
    AgentDescriptor, ExecOptions, ExecResult, Executor, FileMap, MapOptions, Status, Swarm,
    SwarmConfig,
};
use tracing::info;

/// Run a synthetic `map` over an in-process echo executor.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Shared concurrency budget (C1 permit pool size).
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Number of synthetic items to map over.
    #[arg(long, default_value_t = 10)]
    items: usize,

    /// Simulated per-item work duration, in milliseconds.
    #[arg(long, default_value_t = 50)]
    sleep_ms: u64,
}

/// Echoes back `{"item": i}` after sleeping `sleep_ms`, with no sandbox.
struct EchoExecutor {
    sleep_ms: u64,
}

#[async_trait]
impl Executor for EchoExecutor {
    async fn execute(&self, _context: FileMap, _prompt: &str, opts: ExecOptions) -> ExecResult {
        tokio::time::sleep(Duration::from_millis(self.sleep_ms)).await;
        ExecResult {
            status: Status::Success,
            data: Some(serde_json::json!({"itemIndex": opts.observability.item_index})),
            files: FileMap::new(),
            tag: format!("{}-000000", opts.tag_prefix),
            sandbox_id: "demo-sandbox".to_string(),
            error: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = SwarmConfig::builder(AgentDescriptor::new("demo"), "demo")
        .concurrency(args.concurrency)
        .build()?;
    let executor: Arc<dyn Executor> = Arc::new(EchoExecutor { sleep_ms: args.sleep_ms });
    let swarm = Swarm::new(config, executor)?;

    let items: Vec<FileMap> = (0..args.items).map(|_| FileMap::new()).collect();
    info!(concurrency = args.concurrency, items = args.items, "starting demo map");

    let result = swarm.map(items, "demo prompt", MapOptions::default()).await?;
    for r in &result.results {
        println!("{}", serde_json::to_string(&r.result)?);
    }
    info!(operation_id = %result.operation_id, successes = result.success().len(), "demo map complete");
    Ok(())
}
