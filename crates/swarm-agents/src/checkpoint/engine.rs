//! The checkpoint engine (C7): content-addressed snapshot/restore of a
//! sandbox's workspace, against either a [`S3Store`] or a [`GatewayStore`].
//!
//! State machine per sandbox: `idle -> archiving -> uploading -> recording
//! -> idle` for create; `idle -> fetching_meta -> downloading -> verifying
//! -> extracting -> idle` for restore.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sandbox::Sandbox;

use super::backend::{CheckpointRecord, CheckpointStore};
use super::paths::validate_workspace_dir;
use super::tar_cmd;

/// One checkpoint's metadata, as returned to callers (§4 "CheckpointInfo").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub id: String,
    pub hash: String,
    pub tag: Option<String>,
    pub timestamp: String,
    pub size_bytes: Option<u64>,
    pub agent_type: String,
    pub model: Option<String>,
    pub parent_id: Option<String>,
    pub comment: Option<String>,
}

impl From<CheckpointRecord> for CheckpointInfo {
    fn from(r: CheckpointRecord) -> Self {
        Self {
            id: r.id,
            hash: r.hash,
            tag: r.tag,
            timestamp: r.created_at,
            size_bytes: r.size_bytes,
            agent_type: r.agent_type.unwrap_or_default(),
            model: r.model,
            parent_id: r.parent_id,
            comment: r.comment,
        }
    }
}

/// Caller-supplied options for [`create_checkpoint`].
#[derive(Debug, Clone, Default)]
pub struct CreateCheckpointOptions {
    pub tag: Option<String>,
    pub model: Option<String>,
    pub parent_id: Option<String>,
    pub comment: Option<String>,
}

fn new_checkpoint_id() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("ckpt_{}", hex_encode(&bytes))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit() && !(b as char).is_ascii_uppercase())
}

/// Creates a checkpoint of `workspace_dir` plus `settings_dirs` inside
/// `sandbox`, uploading to `store` with content-addressed dedup (§4.6.1).
pub async fn create_checkpoint(
    sandbox: &dyn Sandbox,
    store: &dyn CheckpointStore,
    agent_type: &str,
    workspace_dir: &str,
    settings_dirs: &[String],
    opts: CreateCheckpointOptions,
) -> Result<CheckpointInfo> {
    validate_workspace_dir(workspace_dir)?;

    // archiving
    let hash_output = sandbox.run(&tar_cmd::build_create_command(workspace_dir, settings_dirs)).await?;
    if !hash_output.success() {
        return Err(Error::UploadFailed(format!("tar command failed: {}", hash_output.stderr)));
    }
    let hash = hash_output.stdout.trim().to_string();
    if !is_valid_hash(&hash) {
        return Err(Error::InvalidCheckpointHash(hash));
    }

    let size_output = sandbox.run(&tar_cmd::build_stat_size_command()).await?;
    let size_bytes = size_output.stdout.trim().parse::<u64>().ok();

    // uploading (deduplicating)
    let presigned = store.presign_upload(&hash, size_bytes).await?;
    if !presigned.already_exists {
        let upload_cmd = format!(
            "curl -sf -X PUT --upload-file {} {}",
            super::paths::shell_single_quote(tar_cmd::ARCHIVE_STAGING_PATH),
            super::paths::shell_single_quote(&presigned.url),
        );
        let upload_result = sandbox.run(&upload_cmd).await?;
        if !upload_result.success() {
            sandbox.run(&tar_cmd::build_cleanup_command()).await.ok();
            return Err(Error::UploadFailed(format!("curl PUT failed: {}", upload_result.stderr)));
        }

        if !store.verify_uploaded(&hash).await? {
            sandbox.run(&tar_cmd::build_cleanup_command()).await.ok();
            return Err(Error::VerificationFailed(format!(
                "archive for hash {hash:?} not found after upload"
            )));
        }
    }

    // recording
    let id = new_checkpoint_id();
    let record = CheckpointRecord {
        id: id.clone(),
        hash: hash.clone(),
        parent_id: opts.parent_id.clone(),
        tag: opts.tag.clone(),
        size_bytes,
        created_at: chrono::Utc::now().to_rfc3339(),
        agent_type: Some(agent_type.to_string()),
        model: opts.model.clone(),
        comment: opts.comment.clone(),
        sandbox_id: Some(sandbox.id().to_string()),
    };
    if let Err(err) = store.put_record(&record).await {
        sandbox.run(&tar_cmd::build_cleanup_command()).await.ok();
        return Err(err);
    }

    sandbox.run(&tar_cmd::build_cleanup_command()).await.ok();

    Ok(CheckpointInfo {
        id,
        hash,
        tag: opts.tag,
        timestamp: record.created_at,
        size_bytes,
        agent_type: agent_type.to_string(),
        model: opts.model,
        parent_id: opts.parent_id,
        comment: opts.comment,
    })
}

/// Sentinel checkpoint id meaning "the newest checkpoint" (§4.6.2).
pub const LATEST: &str = "latest";

/// Restores `checkpoint_id` (or [`LATEST`]) into `sandbox` from `store`
/// (§4.6.2). Returns the id that was actually restored, for the caller to
/// record as the new `lastCheckpointId`.
pub async fn restore_checkpoint(sandbox: &dyn Sandbox, store: &dyn CheckpointStore, checkpoint_id: &str) -> Result<String> {
    let resolved_id = if checkpoint_id == LATEST {
        let latest = get_latest_checkpoint(store, None).await?.ok_or_else(|| Error::NotFound("no checkpoints exist".to_string()))?;
        latest.id
    } else {
        checkpoint_id.to_string()
    };

    // fetching_meta
    let record = store.get_record(&resolved_id).await?;

    // downloading
    let download_url = store.presign_download(&record.hash).await?;
    let download_cmd = format!(
        "curl -sf -o {} {}",
        super::paths::shell_single_quote(tar_cmd::RESTORE_STAGING_PATH),
        super::paths::shell_single_quote(&download_url),
    );
    let download_result = sandbox.run(&download_cmd).await?;
    if !download_result.success() {
        return Err(Error::NotFound(format!("could not download archive for checkpoint {resolved_id:?}")));
    }

    // verifying
    let hash_output = sandbox.run(&tar_cmd::build_hash_command()).await?;
    let actual_hash = hash_output.stdout.trim().to_string();
    if actual_hash != record.hash {
        sandbox.run(&tar_cmd::build_restore_cleanup_command()).await.ok();
        return Err(Error::IntegrityCheckFailed { expected: record.hash, actual: actual_hash });
    }

    // extracting
    let extract_result = sandbox.run(&tar_cmd::build_extract_command()).await?;
    sandbox.run(&tar_cmd::build_restore_cleanup_command()).await.ok();
    if !extract_result.success() {
        return Err(Error::Other(format!("tar extract failed: {}", extract_result.stderr)));
    }

    Ok(resolved_id)
}

/// `limit` normalization shared by [`list_checkpoints`] and
/// [`get_latest_checkpoint`] (§4.6.4): `<= 0` (or absent) becomes 100;
/// anything above 500 is capped at 500.
fn normalize_limit(limit: Option<u32>) -> u32 {
    match limit {
        None => 100,
        Some(0) => 100,
        Some(n) if n > 500 => 500,
        Some(n) => n,
    }
}

/// Lists checkpoints newest-first, optionally filtered by tag (§4.6.4).
pub async fn list_checkpoints(store: &dyn CheckpointStore, limit: Option<u32>, tag: Option<&str>) -> Result<Vec<CheckpointInfo>> {
    let records = store.list_records(tag, normalize_limit(limit)).await?;
    Ok(records.into_iter().map(CheckpointInfo::from).collect())
}

/// The single newest checkpoint, optionally filtered by tag. Globally
/// scoped — never implicitly restricted to the calling session.
pub async fn get_latest_checkpoint(store: &dyn CheckpointStore, tag: Option<&str>) -> Result<Option<CheckpointInfo>> {
    let mut results = list_checkpoints(store, Some(1), tag).await?;
    Ok(if results.is_empty() { None } else { Some(results.remove(0)) })
}

/// Runs [`create_checkpoint`] as a post-run side effect, per §4.6.3:
/// failures are swallowed and logged rather than propagated, since a
/// checkpoint failure must never turn a successful agent run into a
/// reported failure.
pub async fn auto_checkpoint_after_run(
    sandbox: &dyn Sandbox,
    store: &dyn CheckpointStore,
    agent_type: &str,
    workspace_dir: &str,
    settings_dirs: &[String],
    exit_code: i32,
    is_background: bool,
    last_checkpoint_id: Option<String>,
    checkpoint_comment: Option<String>,
) -> Option<CheckpointInfo> {
    if exit_code != 0 || is_background {
        return None;
    }
    let opts = CreateCheckpointOptions {
        tag: None,
        model: None,
        parent_id: last_checkpoint_id,
        comment: checkpoint_comment,
    };
    match create_checkpoint(sandbox, store, agent_type, workspace_dir, settings_dirs, opts).await {
        Ok(info) => Some(info),
        Err(err) => {
            tracing::warn!(error = %err, "auto-checkpoint failed after successful run");
            None
        }
    }
}
