//! Standalone checkpoint browsing/downloading (C8), independent of any live
//! sandbox.

pub mod archive;
mod client;

pub use client::{DownloadCheckpointOptions, DownloadFilesOptions, StorageClient};
