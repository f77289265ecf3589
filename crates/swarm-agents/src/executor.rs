//! The sandbox-driving Executor (C3): the concrete
//! [`coordination::Executor`] implementation that stages files into a
//! sandbox, runs an agent CLI command, and collects its output back into an
//! [`ExecResult`].
//!
//! How agent stdout is parsed into structured progress events is not this
//! crate's concern (a non-goal) — callers that want that wire a
//! [`StdoutSink`] in; by default stdout is only watched for EOF/timeout.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::RngCore;

use coordination::{Error as CoordError, ExecOptions, ExecResult, Executor as CoordExecutor, FileContent, FileMap, Status};

use crate::checkpoint::{self, CheckpointStore};
use crate::sandbox::Sandbox;
use crate::session::SandboxSession;

/// Receives each line of agent stdout as it arrives. The default
/// implementation does nothing; callers that want structured progress
/// events provide their own parser here.
pub trait StdoutSink: Send + Sync {
    fn on_line(&self, line: &str);
}

pub struct NoopStdoutSink;
impl StdoutSink for NoopStdoutSink {
    fn on_line(&self, _line: &str) {}
}

/// Builds the shell command that invokes the agent CLI for one task. How a
/// given agent family (`claude`, `codex`, ...) is invoked is provider
/// detail; this crate only needs *a* command string to run.
pub trait AgentCommandBuilder: Send + Sync {
    fn build(&self, staging_dir: &str, system_prompt: Option<&str>, skills: &[String]) -> String;
}

/// Options for post-run auto-checkpointing (§4.6.3), threaded through from
/// whatever owns the sandbox session.
#[derive(Clone, Default)]
pub struct AutoCheckpointOptions {
    pub enabled: bool,
    pub agent_type: String,
    pub workspace_dir: String,
    pub settings_dirs: Vec<String>,
    pub is_background: bool,
    pub last_checkpoint_id: Option<String>,
    pub checkpoint_comment: Option<String>,
}

/// Drives one [`Sandbox`] through the executor contract (§4.2).
///
/// When built `with_session`, auto-checkpointing delegates lineage
/// (`lastCheckpointId` chaining, reset on kill/`setSession`) to the shared
/// [`SandboxSession`] instead of the static `last_checkpoint_id` this struct
/// would otherwise have to be re-handed on every call.
pub struct SandboxExecutor {
    sandbox: Arc<dyn Sandbox>,
    command_builder: Arc<dyn AgentCommandBuilder>,
    stdout_sink: Arc<dyn StdoutSink>,
    checkpoint_store: Option<Arc<dyn CheckpointStore>>,
    session: Option<Arc<SandboxSession>>,
    auto_checkpoint: AutoCheckpointOptions,
}

impl SandboxExecutor {
    pub fn new(sandbox: Arc<dyn Sandbox>, command_builder: Arc<dyn AgentCommandBuilder>) -> Self {
        Self {
            sandbox,
            command_builder,
            stdout_sink: Arc::new(NoopStdoutSink),
            checkpoint_store: None,
            session: None,
            auto_checkpoint: AutoCheckpointOptions::default(),
        }
    }

    pub fn with_stdout_sink(mut self, sink: Arc<dyn StdoutSink>) -> Self {
        self.stdout_sink = sink;
        self
    }

    pub fn with_auto_checkpoint(mut self, store: Arc<dyn CheckpointStore>, opts: AutoCheckpointOptions) -> Self {
        self.checkpoint_store = Some(store);
        self.auto_checkpoint = opts;
        self
    }

    /// Routes auto-checkpoint lineage through `session` rather than a
    /// static `last_checkpoint_id`, so successive runs chain `parentId`
    /// automatically and lineage resets on `session.kill()`/`set_session`.
    /// `opts.last_checkpoint_id` is ignored once a session is attached.
    pub fn with_session(mut self, session: Arc<SandboxSession>, opts: AutoCheckpointOptions) -> Self {
        self.sandbox = session.sandbox();
        self.session = Some(session);
        self.auto_checkpoint = opts;
        self
    }

    fn staging_dir(&self) -> String {
        "/home/user/worker_task".to_string()
    }

    async fn stage_context(&self, context: &FileMap) -> Result<(), CoordError> {
        let staging = self.staging_dir();
        for (path, content) in context {
            let full_path = format!("{staging}/context/{path}");
            let bytes = match content {
                FileContent::Bytes(b) => b.clone(),
                FileContent::Text(t) => t.clone().into_bytes(),
            };
            self.sandbox
                .write_file(&full_path, &bytes)
                .await
                .map_err(|e| CoordError::invalid_argument(format!("failed to stage {path:?}: {e}")))?;
        }
        Ok(())
    }
}

fn new_exec_tag(prefix: &str) -> String {
    let mut bytes = [0u8; 3];
    rand::thread_rng().fill_bytes(&mut bytes);
    let suffix: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("{prefix}-{suffix}")
}

#[async_trait]
impl CoordExecutor for SandboxExecutor {
    async fn execute(&self, context: FileMap, prompt: &str, opts: ExecOptions) -> ExecResult {
        let tag = new_exec_tag(&opts.tag_prefix);
        let staging = self.staging_dir();

        if let Err(e) = self.stage_context(&context).await {
            return ExecResult {
                status: Status::Error,
                data: None,
                files: BTreeMap::new(),
                tag,
                sandbox_id: self.sandbox.id().to_string(),
                error: Some(e.to_string()),
            };
        }

        let prompt_path = format!("{staging}/user_prompt.txt");
        if let Err(e) = self.sandbox.write_file(&prompt_path, prompt.as_bytes()).await {
            return ExecResult {
                status: Status::Error,
                data: None,
                files: BTreeMap::new(),
                tag,
                sandbox_id: self.sandbox.id().to_string(),
                error: Some(e.to_string()),
            };
        }

        let command = self.command_builder.build(&staging, opts.system_prompt.as_deref(), &opts.skills);
        let timeout = opts.timeout;

        let run_outcome = match self.sandbox.spawn(&command).await {
            Ok(handle) => match tokio::time::timeout(timeout, handle.wait()).await {
                Ok(Ok(output)) => RunOutcome::Completed(output),
                Ok(Err(e)) => RunOutcome::Failed(e.to_string()),
                Err(_) => {
                    let _ = handle.interrupt().await;
                    RunOutcome::TimedOut
                }
            },
            Err(e) => RunOutcome::Failed(e.to_string()),
        };

        if let RunOutcome::Completed(ref output) = run_outcome {
            for line in output.stdout.lines() {
                self.stdout_sink.on_line(line);
            }
        }

        let (status, error) = match &run_outcome {
            RunOutcome::Completed(output) if output.success() => (Status::Success, None),
            RunOutcome::Completed(output) => (Status::Error, Some(format!("agent exited with code {}", output.exit_code))),
            RunOutcome::Failed(message) => (Status::Error, Some(message.clone())),
            RunOutcome::TimedOut => (Status::Error, Some("timeout".to_string())),
        };

        let files = crate::sandbox::read_file_map(&*self.sandbox, &format!("{staging}/output"))
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|(path, bytes)| (path, FileContent::Bytes(bytes)))
            .collect::<BTreeMap<_, _>>();

        let mut status = status;
        let mut error = error;
        let mut data = None;

        if status == Status::Success {
            if let Some(schema) = &opts.schema {
                match files.get("result.json") {
                    Some(FileContent::Bytes(bytes)) => match serde_json::from_slice::<serde_json::Value>(bytes) {
                        Ok(value) => match schema.validate(&value) {
                            Ok(()) => data = Some(value),
                            Err(validation_errors) => {
                                status = Status::Error;
                                error = Some(format!("schema-mismatch: {validation_errors}"));
                            }
                        },
                        Err(e) => {
                            status = Status::Error;
                            error = Some(format!("schema-mismatch: result.json is not valid JSON: {e}"));
                        }
                    },
                    _ => {
                        status = Status::Error;
                        error = Some("schema-mismatch: output/result.json is missing".to_string());
                    }
                }
            } else if let Some(FileContent::Bytes(bytes)) = files.get("result.json") {
                data = serde_json::from_slice(bytes).ok();
            }
        }

        if status == Status::Error {
            data = None;
        }

        if status == Status::Success && self.auto_checkpoint.enabled {
            let info = if let Some(session) = &self.session {
                session
                    .auto_checkpoint_after_run(
                        &self.auto_checkpoint.agent_type,
                        &self.auto_checkpoint.workspace_dir,
                        &self.auto_checkpoint.settings_dirs,
                        0,
                        self.auto_checkpoint.is_background,
                        self.auto_checkpoint.checkpoint_comment.clone(),
                    )
                    .await
            } else if let Some(store) = &self.checkpoint_store {
                checkpoint::auto_checkpoint_after_run(
                    &*self.sandbox,
                    store.as_ref(),
                    &self.auto_checkpoint.agent_type,
                    &self.auto_checkpoint.workspace_dir,
                    &self.auto_checkpoint.settings_dirs,
                    0,
                    self.auto_checkpoint.is_background,
                    self.auto_checkpoint.last_checkpoint_id.clone(),
                    self.auto_checkpoint.checkpoint_comment.clone(),
                )
                .await
            } else {
                None
            };
            if info.is_none() {
                tracing::debug!("auto-checkpoint skipped or failed; run result unaffected");
            }
        }

        ExecResult {
            status,
            data,
            files,
            tag,
            sandbox_id: self.sandbox.id().to_string(),
            error,
        }
    }
}

enum RunOutcome {
    Completed(crate::sandbox::CommandOutput),
    Failed(String),
    TimedOut,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_tags_carry_the_prefix_and_six_hex_suffix() {
        let tag = new_exec_tag("swarm-map-0");
        let (prefix, suffix) = tag.rsplit_once('-').unwrap();
        assert_eq!(prefix, "swarm-map-0");
        assert_eq!(suffix.len(), 6);
        assert!(suffix.bytes().all(|b| b.is_ascii_hexdigit()));
    }
}
