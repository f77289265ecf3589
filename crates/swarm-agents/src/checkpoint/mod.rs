//! Content-addressed checkpoint engine (C7).

pub mod backend;
mod engine;
pub mod paths;
pub mod storage_config;
mod tar_cmd;

pub use backend::{CheckpointRecord, CheckpointStore, GatewayStore, PresignedUpload, S3Store};
pub use engine::{
    auto_checkpoint_after_run, create_checkpoint, get_latest_checkpoint, list_checkpoints, restore_checkpoint, CheckpointInfo,
    CreateCheckpointOptions, LATEST,
};
pub use storage_config::{resolve_storage_config, S3Credentials, StorageConfig};
