//! The sandbox façade (C2): a provider-agnostic abstraction over remote
//! command execution and file I/O.
//!
//! Per §1's non-goals, how a sandbox provider implements its remote-exec
//! transport is out of scope for this spec — this trait exists only so C3
//! (the executor) and C7 (the checkpoint engine) have something to call.
//! Real provider drivers (e.g. a Firecracker or gVisor-backed implementation)
//! live outside this crate; tests substitute an in-memory fake.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;

/// Outcome of one `commands.run` call.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Handle to a running background command started via `commands.spawn`.
#[async_trait]
pub trait RunningCommand: Send + Sync {
    /// Sends an interrupt signal to the process without tearing down the
    /// sandbox itself (§5 "Cancellation": `interrupt` cancels the currently
    /// active agent process, queued work continues).
    async fn interrupt(&self) -> Result<()>;

    /// Blocks until the process exits, returning its final output.
    async fn wait(&self) -> Result<CommandOutput>;
}

/// A provider-agnostic remote execution environment (C2).
///
/// One `Sandbox` instance is owned by the fiber that created or connected to
/// it (§5 "Shared resources"); the underlying provider connection it wraps
/// must be safe to invoke concurrently since multiple executor calls against
/// the same session may interleave.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Stable identifier for this sandbox, echoed in `ExecResult::sandbox_id`.
    fn id(&self) -> &str;

    /// Runs a command to completion, blocking the caller.
    async fn run(&self, command: &str) -> Result<CommandOutput>;

    /// Starts a command in the background, returning a handle the caller can
    /// `wait` on or `interrupt`.
    async fn spawn(&self, command: &str) -> Result<Box<dyn RunningCommand>>;

    /// Reads one file's bytes.
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Writes one file's bytes, creating parent directories as needed.
    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()>;

    /// Recursively lists files under `dir`, returning paths relative to
    /// `dir` (forward-slash, no leading slash) — used to collect
    /// `ExecResult::files` from the conventional `output/` directory.
    async fn list_files(&self, dir: &str) -> Result<Vec<String>>;

    /// Creates a directory (and its parents) inside the sandbox.
    async fn make_dir(&self, path: &str) -> Result<()>;

    /// Terminates the sandbox entirely. Per §5, this resets checkpoint
    /// lineage (`lastCheckpointId`) in the caller that owns this sandbox —
    /// enforced by `SandboxSession`, not by the trait itself.
    async fn kill(&self) -> Result<()>;

    /// Suspends the sandbox (e.g. to save compute between turns).
    async fn pause(&self) -> Result<()>;

    /// Resumes a paused sandbox.
    async fn resume(&self) -> Result<()>;
}

/// Convenience bundle mirroring the source SDK's `files.read/write/makeDir`
/// grouping, for callers that want to pass "the files half" of a sandbox
/// around without the command-execution methods.
pub async fn read_file_map(sandbox: &dyn Sandbox, dir: &str) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut out = BTreeMap::new();
    for path in sandbox.list_files(dir).await? {
        let full = format!("{}/{}", dir.trim_end_matches('/'), path);
        let bytes = sandbox.read_file(&full).await?;
        out.insert(path, bytes);
    }
    Ok(out)
}
