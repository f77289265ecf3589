//! Sandbox session ownership (§5 "Cancellation"/"Shared resources"): the
//! thing that actually owns `lastCheckpointId` lineage across a sandbox's
//! lifetime, since the checkpoint engine itself (`checkpoint::engine`) is
//! deliberately stateless — every one of its functions takes its inputs as
//! plain arguments and returns a value, with no notion of "the current
//! session".
//!
//! Lineage rules, straight from §4.6.2 step 5 / §4.6.3 / §5:
//! - restoring a checkpoint makes its id the new `lastCheckpointId`.
//! - a successful auto-checkpoint after a run makes *its* id the new
//!   `lastCheckpointId` (so the next auto-checkpoint chains off it as
//!   `parentId`).
//! - `kill` terminates the sandbox and resets `lastCheckpointId` to `None`
//!   — lineage does not cross sandboxes.
//! - `set_session` (reconnecting to a different sandbox) also resets
//!   lineage, for the same reason.

use std::sync::{Arc, Mutex};

use crate::checkpoint::{self, CheckpointInfo, CheckpointStore, LATEST};
use crate::error::Result;
use crate::sandbox::Sandbox;

struct State {
    sandbox: Arc<dyn Sandbox>,
    last_checkpoint_id: Option<String>,
}

/// Owns one sandbox connection plus the checkpoint lineage threaded through
/// it. Shared by reference across the fibers driving one logical run —
/// `Mutex` rather than requiring `&mut self` because `kill`/`set_session`/
/// auto-checkpointing can all be invoked from concurrent callers (e.g. a
/// caller-visible `interrupt` racing an in-flight auto-checkpoint).
pub struct SandboxSession {
    store: Option<Arc<dyn CheckpointStore>>,
    state: Mutex<State>,
}

impl SandboxSession {
    pub fn new(sandbox: Arc<dyn Sandbox>, store: Option<Arc<dyn CheckpointStore>>) -> Self {
        Self {
            store,
            state: Mutex::new(State {
                sandbox,
                last_checkpoint_id: None,
            }),
        }
    }

    /// The sandbox currently backing this session.
    pub fn sandbox(&self) -> Arc<dyn Sandbox> {
        self.state.lock().unwrap().sandbox.clone()
    }

    /// The lineage root the next auto-checkpoint will chain off of as
    /// `parentId`, or `None` if this session has no checkpoint history yet.
    pub fn last_checkpoint_id(&self) -> Option<String> {
        self.state.lock().unwrap().last_checkpoint_id.clone()
    }

    /// Restores `checkpoint_id` (or [`checkpoint::LATEST`]) into this
    /// session's sandbox and records it as the new lineage root (§4.6.2
    /// step 5).
    pub async fn restore_checkpoint(&self, checkpoint_id: &str) -> Result<String> {
        let store = self.store_or_not_found()?;
        let sandbox = self.sandbox();
        let resolved = checkpoint::restore_checkpoint(sandbox.as_ref(), store.as_ref(), checkpoint_id).await?;
        self.state.lock().unwrap().last_checkpoint_id = Some(resolved.clone());
        Ok(resolved)
    }

    /// Restores whichever checkpoint is currently newest.
    pub async fn restore_latest(&self) -> Result<String> {
        self.restore_checkpoint(LATEST).await
    }

    /// Runs [`checkpoint::auto_checkpoint_after_run`] using this session's
    /// current lineage root as `parentId`, and — on success — advances the
    /// lineage root to the new checkpoint's id (§4.6.3). Non-fatal: a
    /// failure inside checkpoint creation is swallowed by the underlying
    /// call and simply leaves lineage unchanged.
    pub async fn auto_checkpoint_after_run(
        &self,
        agent_type: &str,
        workspace_dir: &str,
        settings_dirs: &[String],
        exit_code: i32,
        is_background: bool,
        comment: Option<String>,
    ) -> Option<CheckpointInfo> {
        let store = self.store.clone()?;
        let sandbox = self.sandbox();
        let parent = self.last_checkpoint_id();
        let info = checkpoint::auto_checkpoint_after_run(
            sandbox.as_ref(),
            store.as_ref(),
            agent_type,
            workspace_dir,
            settings_dirs,
            exit_code,
            is_background,
            parent,
            comment,
        )
        .await;
        if let Some(info) = &info {
            self.state.lock().unwrap().last_checkpoint_id = Some(info.id.clone());
        }
        info
    }

    /// Terminates the underlying sandbox. Lineage does not cross sandboxes
    /// (§5), so `lastCheckpointId` resets to `None` regardless of what it
    /// was before.
    pub async fn kill(&self) -> Result<()> {
        let sandbox = self.sandbox();
        sandbox.kill().await?;
        self.state.lock().unwrap().last_checkpoint_id = None;
        Ok(())
    }

    /// Reconnects this session to a different sandbox. Per §5, switching
    /// sessions resets checkpoint lineage just like `kill` does — the new
    /// sandbox has no relationship to whatever was checkpointed under the
    /// old one.
    pub fn set_session(&self, sandbox: Arc<dyn Sandbox>) {
        let mut state = self.state.lock().unwrap();
        state.sandbox = sandbox;
        state.last_checkpoint_id = None;
    }

    fn store_or_not_found(&self) -> Result<Arc<dyn CheckpointStore>> {
        self.store
            .clone()
            .ok_or_else(|| crate::error::Error::NotFound("no checkpoint store configured for this session".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::checkpoint::{CheckpointRecord, PresignedUpload};
    use crate::sandbox::{CommandOutput, RunningCommand};

    struct NoopSandbox {
        id: String,
        killed: AtomicBool,
    }

    #[async_trait]
    impl Sandbox for NoopSandbox {
        fn id(&self) -> &str {
            &self.id
        }
        async fn run(&self, _command: &str) -> Result<CommandOutput> {
            Ok(CommandOutput { stdout: "0".repeat(64), stderr: String::new(), exit_code: 0 })
        }
        async fn spawn(&self, _command: &str) -> Result<Box<dyn RunningCommand>> {
            unimplemented!()
        }
        async fn read_file(&self, _path: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn write_file(&self, _path: &str, _content: &[u8]) -> Result<()> {
            Ok(())
        }
        async fn list_files(&self, _dir: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn make_dir(&self, _path: &str) -> Result<()> {
            Ok(())
        }
        async fn kill(&self) -> Result<()> {
            self.killed.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn pause(&self) -> Result<()> {
            Ok(())
        }
        async fn resume(&self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeStore {
        records: Mutex<BTreeMap<String, CheckpointRecord>>,
    }

    #[async_trait]
    impl CheckpointStore for FakeStore {
        async fn presign_upload(&self, _hash: &str, _size_bytes: Option<u64>) -> Result<PresignedUpload> {
            Ok(PresignedUpload { url: "file:///dev/null".to_string(), already_exists: false })
        }
        async fn presign_download(&self, _hash: &str) -> Result<String> {
            Ok("file:///dev/null".to_string())
        }
        async fn verify_uploaded(&self, _hash: &str) -> Result<bool> {
            Ok(true)
        }
        async fn put_record(&self, record: &CheckpointRecord) -> Result<()> {
            self.records.lock().unwrap().insert(record.id.clone(), record.clone());
            Ok(())
        }
        async fn get_record(&self, id: &str) -> Result<CheckpointRecord> {
            self.records.lock().unwrap().get(id).cloned().ok_or_else(|| crate::error::Error::NotFound(id.to_string()))
        }
        async fn list_records(&self, _tag: Option<&str>, _limit: u32) -> Result<Vec<CheckpointRecord>> {
            Ok(self.records.lock().unwrap().values().cloned().collect())
        }
    }

    #[tokio::test]
    async fn kill_resets_lineage() {
        let sandbox = Arc::new(NoopSandbox { id: "sbx-1".to_string(), killed: AtomicBool::new(false) });
        let session = SandboxSession::new(sandbox.clone(), None);
        session.state.lock().unwrap().last_checkpoint_id = Some("ckpt_deadbeef".to_string());

        session.kill().await.unwrap();

        assert!(sandbox.killed.load(Ordering::SeqCst));
        assert!(session.last_checkpoint_id().is_none());
    }

    #[tokio::test]
    async fn set_session_resets_lineage() {
        let sandbox_a = Arc::new(NoopSandbox { id: "sbx-a".to_string(), killed: AtomicBool::new(false) });
        let sandbox_b = Arc::new(NoopSandbox { id: "sbx-b".to_string(), killed: AtomicBool::new(false) });
        let session = SandboxSession::new(sandbox_a, None);
        session.state.lock().unwrap().last_checkpoint_id = Some("ckpt_deadbeef".to_string());

        session.set_session(sandbox_b.clone());

        assert!(session.last_checkpoint_id().is_none());
        assert_eq!(session.sandbox().id(), "sbx-b");
    }

    #[tokio::test]
    async fn auto_checkpoint_chains_parent_across_calls() {
        let sandbox = Arc::new(NoopSandbox { id: "sbx-1".to_string(), killed: AtomicBool::new(false) });
        let store: Arc<dyn CheckpointStore> = Arc::new(FakeStore::default());
        let session = SandboxSession::new(sandbox, Some(store.clone()));

        assert!(session.last_checkpoint_id().is_none());

        let first = session
            .auto_checkpoint_after_run("demo-agent", "/home/user/project", &[], 0, false, None)
            .await
            .unwrap();
        assert_eq!(session.last_checkpoint_id(), Some(first.id.clone()));

        let second = session
            .auto_checkpoint_after_run("demo-agent", "/home/user/project", &[], 0, false, None)
            .await
            .unwrap();
        assert_eq!(second.parent_id, Some(first.id));
        assert_eq!(session.last_checkpoint_id(), Some(second.id));
    }

    #[tokio::test]
    async fn background_run_never_auto_checkpoints() {
        let sandbox = Arc::new(NoopSandbox { id: "sbx-1".to_string(), killed: AtomicBool::new(false) });
        let store: Arc<dyn CheckpointStore> = Arc::new(FakeStore::default());
        let session = SandboxSession::new(sandbox, Some(store));

        let info = session.auto_checkpoint_after_run("demo-agent", "/home/user/project", &[], 0, true, None).await;
        assert!(info.is_none());
        assert!(session.last_checkpoint_id().is_none());
    }
}
