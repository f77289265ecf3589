//! The `Executor` contract (C3) and the data model shared by every result
//! the swarm engine produces (§3).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::observability::BaseMeta;
use crate::schema::Schema;

/// One file's content, either raw bytes or UTF-8 text. Kept as a sum type
/// rather than always-`Vec<u8>` so callers that build text prompts/files
/// don't pay for a UTF-8 round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Bytes(Vec<u8>),
    Text(String),
}

impl FileContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContent::Bytes(b) => b,
            FileContent::Text(s) => s.as_bytes(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            FileContent::Bytes(b) => b,
            FileContent::Text(s) => s.into_bytes(),
        }
    }
}

/// A mapping from logical, relative, forward-slash path to file content.
///
/// `BTreeMap` rather than `HashMap` so iteration order (and therefore tar
/// archive order and test fixtures) is deterministic.
pub type FileMap = BTreeMap<String, FileContent>;

/// Validates a path per §3: relative, forward-slash, no leading slash.
pub fn validate_item_path(path: &str) -> Result<(), String> {
    if path.starts_with('/') {
        return Err(format!("path `{path}` must not start with `/`"));
    }
    if path.contains('\\') {
        return Err(format!("path `{path}` must use forward slashes"));
    }
    if path.split('/').any(|seg| seg == "..") {
        return Err(format!("path `{path}` must not contain `..`"));
    }
    Ok(())
}

/// Execution status of one agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// The immutable result of one executor invocation (§3).
///
/// `data` is kept as `serde_json::Value` rather than a generic `T`: the
/// schema abstraction (native closure or JSON Schema) already validates
/// structure at the boundary, and callers that want a concrete type
/// `serde_json::from_value` it out of the result themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecResult {
    pub status: Status,
    pub data: Option<serde_json::Value>,
    pub files: FileMap,
    pub tag: String,
    pub sandbox_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, Status::Success)
    }
}

// `BTreeMap<String, FileContent>` doesn't derive Serialize/Deserialize for
// free in a way serde can see through `FileContent`'s hand-written variants,
// so give it manual impls that mirror the JS SDK's `{path: base64 | utf8}`
// wire shape closely enough for tests and logs.
impl Serialize for FileContent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            FileContent::Text(s) => serializer.serialize_str(s),
            FileContent::Bytes(b) => {
                use serde::Serialize as _;
                base64_lite::encode(b).serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for FileContent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(FileContent::Text(s))
    }
}

/// Minimal base64 encoder, used only for rendering `FileContent::Bytes` in
/// JSON logs/tests; not a general-purpose codec.
mod base64_lite {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    pub fn encode(input: &[u8]) -> String {
        let mut out = String::with_capacity(input.len().div_ceil(3) * 4);
        for chunk in input.chunks(3) {
            let b0 = chunk[0];
            let b1 = *chunk.get(1).unwrap_or(&0);
            let b2 = *chunk.get(2).unwrap_or(&0);
            let n = ((b0 as u32) << 16) | ((b1 as u32) << 8) | (b2 as u32);
            out.push(ALPHABET[((n >> 18) & 0x3f) as usize] as char);
            out.push(ALPHABET[((n >> 12) & 0x3f) as usize] as char);
            out.push(if chunk.len() > 1 { ALPHABET[((n >> 6) & 0x3f) as usize] as char } else { '=' });
            out.push(if chunk.len() > 2 { ALPHABET[(n & 0x3f) as usize] as char } else { '=' });
        }
        out
    }
}

/// Outcome of a `verify` wrapper on one item (§3, §4.4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyInfo {
    pub passed: bool,
    /// Number of worker attempts made, 1-indexed. Invariant: `attempts >= 1`.
    pub attempts: u32,
    pub verify_meta: BaseMeta,
}

/// The judge's raw decision (§4.4.4 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeDecision {
    pub winner: usize,
    pub reasoning: String,
}

/// Outcome of a `bestOf` wrapper (§3, §4.4.4). Invariant:
/// `candidates.len() == n`.
#[derive(Debug, Clone)]
pub struct BestOfInfo {
    pub candidates: Vec<SwarmResult>,
    pub judge_decision: JudgeDecision,
    pub judge_meta: BaseMeta,
}

/// `ExecResult` extended with the observability/verify/bestOf metadata the
/// swarm engine attaches (§3).
#[derive(Debug, Clone)]
pub struct SwarmResult {
    pub result: ExecResult,
    pub meta: BaseMeta,
    pub verify: Option<VerifyInfo>,
    pub best_of: Option<Box<BestOfInfo>>,
}

impl SwarmResult {
    pub fn new(result: ExecResult, meta: BaseMeta) -> Self {
        Self {
            result,
            meta,
            verify: None,
            best_of: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }

    pub fn tag(&self) -> &str {
        &self.result.tag
    }
}

/// Options accepted by one `Executor::execute` call (§4.2).
#[derive(Clone)]
pub struct ExecOptions {
    pub tag_prefix: String,
    pub timeout: Duration,
    pub schema: Option<Schema>,
    pub system_prompt: Option<String>,
    pub skills: Vec<String>,
    pub observability: BaseMeta,
}

/// One agent invocation: acquire a sandbox, stage files, spawn the CLI,
/// stream output, collect artifacts, return a typed `ExecResult` (C3).
///
/// Deliberately the only trait the swarm engine (`coordination`) depends on
/// for actually running work — everything upstream of it (C1 scheduling, C4
/// retry, C5 map/filter/reduce/bestOf/verify, C6 pipelines) is generic over
/// any `Executor` impl, so tests substitute a fake one with no sandbox at
/// all.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, context: FileMap, prompt: &str, opts: ExecOptions) -> ExecResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_absolute_paths() {
        assert!(validate_item_path("/etc/passwd").is_err());
    }

    #[test]
    fn rejects_parent_traversal() {
        assert!(validate_item_path("a/../b").is_err());
    }

    #[test]
    fn accepts_relative_forward_slash_path() {
        assert!(validate_item_path("inputs/0/notes.txt").is_ok());
    }
}
