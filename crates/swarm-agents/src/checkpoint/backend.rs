//! Object-store backends: one trait, two implementations — direct
//! S3-compatible access (BYOK) and an HTTP gateway proxy.
//!
//! The checkpoint engine (`engine.rs`) is written against [`CheckpointStore`]
//! alone, so swapping `resolve_storage_config`'s outcome between
//! [`super::storage_config::StorageConfig::Byok`] and `::Gateway` never
//! touches the state machine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::storage_config::{S3Credentials, StorageConfig};

/// One checkpoint's metadata record, as persisted alongside its archive.
///
/// `agent_type`/`model`/`comment`/`sandbox_id` default on deserialize so
/// older records written before a field existed still round-trip (§9
/// "Checkpoint-metadata evolution").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub id: String,
    pub hash: String,
    pub parent_id: Option<String>,
    pub tag: Option<String>,
    pub size_bytes: Option<u64>,
    pub created_at: String,
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub sandbox_id: Option<String>,
}

/// Presigned-URL pair for an upload that the engine still has to perform
/// (the backend hands back a URL; the engine's sandbox does the actual PUT
/// from inside the sandbox, since the archive never leaves it otherwise).
#[derive(Debug, Clone)]
pub struct PresignedUpload {
    pub url: String,
    pub already_exists: bool,
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Returns a presigned PUT URL for `hash`, or reports that an object
    /// with this content hash is already stored (dedup — §4.6.1 step 4).
    /// `size_bytes` is passed through to the gateway's presign body
    /// (`{hash, sizeBytes}`); `S3Store` has no use for it since a presigned
    /// PUT URL doesn't need the size up front.
    async fn presign_upload(&self, hash: &str, size_bytes: Option<u64>) -> Result<PresignedUpload>;

    /// Returns a presigned GET URL for `hash`.
    async fn presign_download(&self, hash: &str) -> Result<String>;

    /// Re-checks, after the sandbox's `curl -X PUT` has run, that the
    /// archive actually landed (§4.6.1 step 4: `HeadObject` again to verify
    /// existence). Returns `false` rather than erroring so the caller can
    /// attach its own `VerificationFailed` message.
    async fn verify_uploaded(&self, hash: &str) -> Result<bool>;

    /// Records a checkpoint's metadata after its archive is confirmed
    /// uploaded.
    async fn put_record(&self, record: &CheckpointRecord) -> Result<()>;

    /// Fetches one checkpoint's metadata by id.
    async fn get_record(&self, id: &str) -> Result<CheckpointRecord>;

    /// Lists checkpoint metadata, newest first, optionally filtered by tag,
    /// capped at `limit`.
    async fn list_records(&self, tag: Option<&str>, limit: u32) -> Result<Vec<CheckpointRecord>>;
}

/// Direct S3-compatible backend.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    pub async fn new(bucket: String, prefix: String, region: String, endpoint: Option<String>, credentials: Option<S3Credentials>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).region(aws_sdk_s3::config::Region::new(region));
        if let Some(endpoint) = &endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(creds) = credentials {
            loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
                creds.access_key_id,
                creds.secret_access_key,
                creds.session_token,
                None,
                "swarm-agents-byok",
            ));
        }
        let config = loader.load().await;
        let client = aws_sdk_s3::Client::new(&config);
        Self { client, bucket, prefix }
    }

    pub fn from_config(cfg: StorageConfig) -> impl std::future::Future<Output = Self> {
        async move {
            match cfg {
                StorageConfig::Byok { bucket, prefix, region, endpoint, credentials } => {
                    Self::new(bucket, prefix, region, endpoint, credentials).await
                }
                StorageConfig::Gateway { .. } => unreachable!("caller must dispatch Gateway to GatewayStore"),
            }
        }
    }

    fn archive_key(&self, hash: &str) -> String {
        format!("{}/data/{}/archive.tar.gz", self.prefix.trim_end_matches('/'), hash)
    }

    fn record_key(&self, id: &str) -> String {
        format!("{}/checkpoints/{}.json", self.prefix.trim_end_matches('/'), id)
    }
}

#[async_trait]
impl CheckpointStore for S3Store {
    async fn presign_upload(&self, hash: &str, _size_bytes: Option<u64>) -> Result<PresignedUpload> {
        let key = self.archive_key(hash);

        let head = self.client.head_object().bucket(&self.bucket).key(&key).send().await;
        if head.is_ok() {
            return Ok(PresignedUpload { url: String::new(), already_exists: true });
        }

        let expires = aws_sdk_s3::presigning::PresigningConfig::expires_in(std::time::Duration::from_secs(15 * 60))
            .map_err(|e| Error::UploadFailed(e.to_string()))?;
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(expires)
            .await
            .map_err(|e| Error::UploadFailed(e.to_string()))?;

        Ok(PresignedUpload { url: presigned.uri().to_string(), already_exists: false })
    }

    async fn presign_download(&self, hash: &str) -> Result<String> {
        let key = self.archive_key(hash);
        let expires = aws_sdk_s3::presigning::PresigningConfig::expires_in(std::time::Duration::from_secs(15 * 60))
            .map_err(|e| Error::Other(format!("could not build presigning config: {e}")))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(expires)
            .await
            .map_err(|e| Error::NotFound(format!("archive for hash {hash:?}: {e}")))?;
        Ok(presigned.uri().to_string())
    }

    async fn verify_uploaded(&self, hash: &str) -> Result<bool> {
        let key = self.archive_key(hash);
        Ok(self.client.head_object().bucket(&self.bucket).key(&key).send().await.is_ok())
    }

    async fn put_record(&self, record: &CheckpointRecord) -> Result<()> {
        let body = serde_json::to_vec(record)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.record_key(&record.id))
            .body(body.into())
            .send()
            .await
            .map_err(|e| Error::UploadFailed(e.to_string()))?;
        Ok(())
    }

    async fn get_record(&self, id: &str) -> Result<CheckpointRecord> {
        let out = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.record_key(id))
            .send()
            .await
            .map_err(|_| Error::NotFound(format!("checkpoint {id:?}")))?;
        let bytes = out.body.collect().await.map_err(|e| Error::Other(e.to_string()))?.into_bytes();
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn list_records(&self, tag: Option<&str>, limit: u32) -> Result<Vec<CheckpointRecord>> {
        let mut dated: Vec<(aws_sdk_s3::primitives::DateTime, CheckpointRecord)> = Vec::new();
        let mut continuation: Option<String> = None;
        let prefix = format!("{}/checkpoints/", self.prefix.trim_end_matches('/'));

        loop {
            let mut req = self.client.list_objects_v2().bucket(&self.bucket).prefix(&prefix);
            if let Some(token) = &continuation {
                req = req.continuation_token(token);
            }
            let resp = req.send().await.map_err(|e| Error::Other(e.to_string()))?;
            for obj in resp.contents() {
                let (Some(key), Some(last_modified)) = (obj.key(), obj.last_modified()) else {
                    continue;
                };
                let id = key.trim_start_matches(&prefix).trim_end_matches(".json");
                if let Ok(record) = self.get_record(id).await {
                    if tag.is_none() || tag == record.tag.as_deref() {
                        dated.push((*last_modified, record));
                    }
                }
            }
            continuation = resp.next_continuation_token().map(str::to_string);
            if continuation.is_none() {
                break;
            }
        }

        dated.sort_by(|a, b| b.0.cmp(&a.0));
        let mut records: Vec<CheckpointRecord> = dated.into_iter().map(|(_, r)| r).collect();
        records.truncate(limit as usize);
        Ok(records)
    }
}

/// HTTP-gateway-proxied backend, for sandboxes without direct bucket access.
pub struct GatewayStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GatewayStore {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url, api_key }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[derive(Serialize)]
struct PresignRequest<'a> {
    hash: &'a str,
    #[serde(rename = "sizeBytes", skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
}

#[derive(Deserialize)]
struct PresignResponse {
    url: Option<String>,
    already_exists: bool,
}

#[async_trait]
impl CheckpointStore for GatewayStore {
    async fn presign_upload(&self, hash: &str, size_bytes: Option<u64>) -> Result<PresignedUpload> {
        let req = self
            .client
            .post(format!("{}/api/checkpoints/presign", self.base_url))
            .json(&PresignRequest { hash, size_bytes });
        let resp = self.authed(req).send().await?.error_for_status().map_err(|e| Error::UploadFailed(e.to_string()))?;
        let body: PresignResponse = resp.json().await?;
        Ok(PresignedUpload { url: body.url.unwrap_or_default(), already_exists: body.already_exists })
    }

    async fn presign_download(&self, hash: &str) -> Result<String> {
        let req = self.client.get(format!("{}/api/checkpoints/download/{hash}", self.base_url));
        let resp = self.authed(req).send().await?.error_for_status().map_err(|_| Error::NotFound(format!("archive for hash {hash:?}")))?;
        #[derive(Deserialize)]
        struct DownloadResponse {
            url: String,
        }
        let body: DownloadResponse = resp.json().await?;
        Ok(body.url)
    }

    /// The gateway has no dedicated "does this hash exist" endpoint — reuse
    /// the presign endpoint's `alreadyExists` flag as the post-upload
    /// existence check (§4.6.1 step 4).
    async fn verify_uploaded(&self, hash: &str) -> Result<bool> {
        let req = self
            .client
            .post(format!("{}/api/checkpoints/presign", self.base_url))
            .json(&PresignRequest { hash, size_bytes: None });
        let resp = self.authed(req).send().await?.error_for_status().map_err(|e| Error::VerificationFailed(e.to_string()))?;
        let body: PresignResponse = resp.json().await?;
        Ok(body.already_exists)
    }

    async fn put_record(&self, record: &CheckpointRecord) -> Result<()> {
        let req = self.client.post(format!("{}/api/checkpoints", self.base_url)).json(record);
        self.authed(req).send().await?.error_for_status().map_err(|e| Error::UploadFailed(e.to_string()))?;
        Ok(())
    }

    async fn get_record(&self, id: &str) -> Result<CheckpointRecord> {
        let req = self.client.get(format!("{}/api/checkpoints/{id}", self.base_url));
        let resp = self.authed(req).send().await?.error_for_status().map_err(|_| Error::NotFound(format!("checkpoint {id:?}")))?;
        Ok(resp.json().await?)
    }

    async fn list_records(&self, tag: Option<&str>, limit: u32) -> Result<Vec<CheckpointRecord>> {
        let mut req = self.client.get(format!("{}/api/checkpoints", self.base_url)).query(&[("limit", limit.to_string())]);
        if let Some(tag) = tag {
            req = req.query(&[("tag", tag)]);
        }
        let resp = self.authed(req).send().await?.error_for_status().map_err(|e| Error::Other(e.to_string()))?;
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_store_builds_without_an_api_key() {
        let store = GatewayStore::new("https://gateway.example.com".to_string(), None);
        assert!(store.api_key.is_none());
        assert_eq!(store.base_url, "https://gateway.example.com");
    }
}
