//! Error taxonomy for the sandbox-facing half of the SDK (§7).
//!
//! Fatal contract violations are `Result::Err` returns — never panics. The
//! in-band agent-level errors (`agent-failure`, `timeout`, `schema-mismatch`,
//! `verify-exhausted`) belong to `coordination::ExecResult`/`SwarmResult`,
//! not here; this enum only covers what §7's table marks "fatal, thrown".

use thiserror::Error;

/// Result type alias for `swarm_agents` operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid checkpoint hash: expected 64 lowercase hex chars, got {0:?}")]
    InvalidCheckpointHash(String),

    #[error("checkpoint upload failed: {0}")]
    UploadFailed(String),

    #[error("checkpoint upload could not be verified: {0}")]
    VerificationFailed(String),

    #[error("checkpoint integrity check failed: expected hash {expected}, got {actual}")]
    IntegrityCheckFailed { expected: String, actual: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("archive contains an unsupported entry type at {0:?} (only regular files and directories are allowed)")]
    UnsupportedEntryType(String),

    #[error("archive entry {0:?} resolves outside the extraction root")]
    UnsafePath(String),

    #[error("no API key configured for agent family {0:?}")]
    NoApiKey(String),

    #[error("no sandbox provider configured")]
    NoSandboxProvider,

    #[error("no-bucket-in-path: {0:?} has no bucket segment")]
    NoBucketInPath(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("toml serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Whether this kind of failure is ever worth a caller retrying verbatim.
    /// Matches §7: everything in this enum is a fatal/thrown contract
    /// violation, so none of it is retryable — the caller must fix the
    /// input (bad hash, missing credentials, bad path) before trying again.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
