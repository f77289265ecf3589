//! CLI smoke-test harness for the checkpoint engine.
//!
//! There is no production `Sandbox` implementation in this crate (per §1,
//! how a provider implements remote exec is out of scope) — this binary
//! wires a trivial local-process `Sandbox` (plain `sh -c` against a temp
//! directory standing in for `/home/user`) and an in-memory
//! `CheckpointStore` so `createCheckpoint`/`listCheckpoints` can be
//! exercised and eyeballed without real cloud credentials.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use swarm_agents::checkpoint::{
    create_checkpoint, list_checkpoints, CheckpointRecord, CheckpointStore, CreateCheckpointOptions, PresignedUpload,
};
use swarm_agents::sandbox::{CommandOutput, RunningCommand, Sandbox};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a checkpoint of a scratch workspace and print its metadata.
    Create {
        #[arg(long, default_value = "demo")]
        tag: String,
    },
    /// List checkpoints recorded so far in this process's in-memory store.
    List {
        #[arg(long)]
        limit: Option<u32>,
    },
}

/// Runs shell commands against a real temp directory on the local machine.
/// Stands in for a remote sandbox provider in this demo binary only.
struct LocalProcessSandbox {
    root: PathBuf,
}

#[async_trait]
impl Sandbox for LocalProcessSandbox {
    fn id(&self) -> &str {
        "local-demo-sandbox"
    }

    async fn run(&self, command: &str) -> swarm_agents::Result<CommandOutput> {
        let output = tokio::process::Command::new("sh").arg("-c").arg(command).current_dir(&self.root).output().await?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn spawn(&self, command: &str) -> swarm_agents::Result<Box<dyn RunningCommand>> {
        let output = self.run(command).await?;
        Ok(Box::new(ImmediateCommand(output)))
    }

    async fn read_file(&self, path: &str) -> swarm_agents::Result<Vec<u8>> {
        Ok(tokio::fs::read(self.root.join(path.trim_start_matches('/'))).await?)
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> swarm_agents::Result<()> {
        let full = self.root.join(path.trim_start_matches('/'));
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(tokio::fs::write(full, content).await?)
    }

    async fn list_files(&self, dir: &str) -> swarm_agents::Result<Vec<String>> {
        let mut out = Vec::new();
        let root = self.root.join(dir.trim_start_matches('/'));
        if root.exists() {
            collect_files(&root, &root, &mut out)?;
        }
        Ok(out)
    }

    async fn make_dir(&self, path: &str) -> swarm_agents::Result<()> {
        Ok(tokio::fs::create_dir_all(self.root.join(path.trim_start_matches('/'))).await?)
    }

    async fn kill(&self) -> swarm_agents::Result<()> {
        Ok(())
    }

    async fn pause(&self) -> swarm_agents::Result<()> {
        Ok(())
    }

    async fn resume(&self) -> swarm_agents::Result<()> {
        Ok(())
    }
}

fn collect_files(root: &std::path::Path, dir: &std::path::Path, out: &mut Vec<String>) -> swarm_agents::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else {
            out.push(path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

struct ImmediateCommand(CommandOutput);

#[async_trait]
impl RunningCommand for ImmediateCommand {
    async fn interrupt(&self) -> swarm_agents::Result<()> {
        Ok(())
    }

    async fn wait(&self) -> swarm_agents::Result<CommandOutput> {
        Ok(self.0.clone())
    }
}

/// Process-local, non-persistent checkpoint store for the demo binary.
#[derive(Default)]
struct InMemoryStore {
    records: Mutex<BTreeMap<String, CheckpointRecord>>,
    uploaded_hashes: Mutex<std::collections::BTreeSet<String>>,
}

#[async_trait]
impl CheckpointStore for InMemoryStore {
    async fn presign_upload(&self, hash: &str, _size_bytes: Option<u64>) -> swarm_agents::Result<PresignedUpload> {
        let mut uploaded = self.uploaded_hashes.lock().unwrap();
        if uploaded.contains(hash) {
            return Ok(PresignedUpload { url: String::new(), already_exists: true });
        }
        uploaded.insert(hash.to_string());
        Ok(PresignedUpload { url: "file:///dev/null".to_string(), already_exists: false })
    }

    async fn presign_download(&self, _hash: &str) -> swarm_agents::Result<String> {
        Ok("file:///dev/null".to_string())
    }

    async fn verify_uploaded(&self, hash: &str) -> swarm_agents::Result<bool> {
        Ok(self.uploaded_hashes.lock().unwrap().contains(hash))
    }

    async fn put_record(&self, record: &CheckpointRecord) -> swarm_agents::Result<()> {
        self.records.lock().unwrap().insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_record(&self, id: &str) -> swarm_agents::Result<CheckpointRecord> {
        self.records
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| swarm_agents::Error::NotFound(id.to_string()))
    }

    async fn list_records(&self, tag: Option<&str>, limit: u32) -> swarm_agents::Result<Vec<CheckpointRecord>> {
        let mut records: Vec<CheckpointRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| tag.is_none() || tag == r.tag.as_deref())
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit as usize);
        Ok(records)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryStore::default());

    match args.command {
        Command::Create { tag } => {
            let temp = tempfile::tempdir()?;
            let workspace = temp.path().join("home/user/project");
            tokio::fs::create_dir_all(&workspace).await?;
            tokio::fs::write(workspace.join("notes.txt"), b"hello from the demo workspace\n").await?;

            let sandbox = LocalProcessSandbox { root: temp.path().to_path_buf() };
            let opts = CreateCheckpointOptions { tag: Some(tag), model: None, parent_id: None, comment: None };
            let info = create_checkpoint(&sandbox, store.as_ref(), "demo-agent", "/home/user/project", &[], opts).await?;
            info!(id = %info.id, hash = %info.hash, "checkpoint created");
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "id": info.id,
                "hash": info.hash,
                "tag": info.tag,
                "sizeBytes": info.size_bytes,
            }))?);
        }
        Command::List { limit } => {
            let checkpoints = list_checkpoints(store.as_ref(), limit, None).await?;
            for c in checkpoints {
                println!("{} {} {}", c.id, c.hash, c.tag.unwrap_or_default());
            }
        }
    }

    Ok(())
}
