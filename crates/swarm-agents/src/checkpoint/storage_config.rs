//! Storage configuration resolution (§6 "resolveStorageConfig").
//!
//! A sandbox carries one `storageUrl` string that determines whether the
//! checkpoint engine talks directly to an S3-compatible bucket (BYOK) or
//! proxies through an HTTP gateway. This module turns that string (plus
//! optional credentials/gateway key) into a typed [`StorageConfig`].

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Resolved storage backend for one sandbox.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Direct object-store access, bring-your-own-key.
    Byok {
        bucket: String,
        prefix: String,
        region: String,
        endpoint: Option<String>,
        credentials: Option<S3Credentials>,
    },
    /// Proxied through an HTTP checkpoint gateway.
    Gateway { gateway_url: String, gateway_api_key: Option<String> },
}

const DEFAULT_REGION: &str = "us-east-1";

/// Resolves a sandbox's storage configuration from its `storageUrl`.
///
/// Recognized forms:
/// - `s3://bucket/prefix` — BYOK, region from `explicit_region` >
///   `AWS_REGION` env > `"us-east-1"`.
/// - `https://{bucket}.s3.{region}.amazonaws.com/prefix` — BYOK,
///   virtual-hosted style; region is read off the host.
/// - `https://{endpoint}/{bucket}/prefix` — BYOK, path-style, for
///   S3-compatible custom endpoints; `endpoint` is the scheme+host.
/// - anything else starting with `http://`/`https://` when `gateway_api_key`
///   is provided — treated as a gateway URL.
///
/// A bucket-less `s3://` URL (no host component) is an error: the checkpoint
/// engine has nowhere to write without a bucket name.
pub fn resolve_storage_config(
    storage_url: &str,
    explicit_region: Option<&str>,
    credentials: Option<S3Credentials>,
    gateway_api_key: Option<String>,
) -> Result<StorageConfig> {
    let parsed = url::Url::parse(storage_url).map_err(|e| Error::invalid_argument(format!("invalid storage url {storage_url:?}: {e}")))?;

    match parsed.scheme() {
        "s3" => {
            let bucket = parsed.host_str().ok_or_else(|| Error::NoBucketInPath(storage_url.to_string()))?;
            let prefix = parsed.path().trim_start_matches('/').trim_end_matches('/').to_string();
            let region = resolve_region(explicit_region);
            Ok(StorageConfig::Byok {
                bucket: bucket.to_string(),
                prefix,
                region,
                endpoint: None,
                credentials,
            })
        }
        "http" | "https" => {
            if let Some(host) = parsed.host_str() {
                if let Some(rest) = host.strip_suffix(".amazonaws.com") {
                    if let Some((bucket, region_part)) = parse_virtual_hosted(rest) {
                        let prefix = parsed.path().trim_start_matches('/').trim_end_matches('/').to_string();
                        let region = explicit_region.map(str::to_string).unwrap_or(region_part);
                        return Ok(StorageConfig::Byok {
                            bucket,
                            prefix,
                            region,
                            endpoint: None,
                            credentials,
                        });
                    }
                }
            }

            if gateway_api_key.is_some() {
                return Ok(StorageConfig::Gateway {
                    gateway_url: storage_url.trim_end_matches('/').to_string(),
                    gateway_api_key,
                });
            }

            // path-style custom endpoint: https://{endpoint}/{bucket}/{prefix...}
            let mut segments = parsed.path_segments().ok_or_else(|| Error::NoBucketInPath(storage_url.to_string()))?;
            let bucket = segments
                .next()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| Error::NoBucketInPath(storage_url.to_string()))?;
            let prefix = segments.collect::<Vec<_>>().join("/").trim_end_matches('/').to_string();
            let endpoint = format!(
                "{}://{}",
                parsed.scheme(),
                parsed.host_str().unwrap_or_default()
            );
            Ok(StorageConfig::Byok {
                bucket: bucket.to_string(),
                prefix,
                region: resolve_region(explicit_region),
                endpoint: Some(endpoint),
                credentials,
            })
        }
        other => Err(Error::invalid_argument(format!("unsupported storage url scheme {other:?}"))),
    }
}

fn resolve_region(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var("AWS_REGION").ok())
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}

/// Splits `bucket.s3.{region}` (the `.amazonaws.com` suffix already removed)
/// into `(bucket, region)`.
fn parse_virtual_hosted(rest: &str) -> Option<(String, String)> {
    let idx = rest.find(".s3.")?;
    let bucket = rest[..idx].to_string();
    let region = rest[idx + 4..].to_string();
    if bucket.is_empty() || region.is_empty() {
        return None;
    }
    Some((bucket, region))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_s3_url() {
        let cfg = resolve_storage_config("s3://my-bucket/prefix/path", None, None, None).unwrap();
        match cfg {
            StorageConfig::Byok { bucket, prefix, region, endpoint, .. } => {
                assert_eq!(bucket, "my-bucket");
                assert_eq!(prefix, "prefix/path");
                assert_eq!(region, "us-east-1");
                assert!(endpoint.is_none());
            }
            _ => panic!("expected byok"),
        }
    }

    #[test]
    fn s3_url_without_bucket_is_an_error() {
        let err = resolve_storage_config("s3:///prefix", None, None, None);
        assert!(err.is_err());
    }

    #[test]
    fn explicit_region_overrides_env_and_default() {
        let cfg = resolve_storage_config("s3://bucket/p", Some("eu-west-1"), None, None).unwrap();
        match cfg {
            StorageConfig::Byok { region, .. } => assert_eq!(region, "eu-west-1"),
            _ => panic!("expected byok"),
        }
    }

    #[test]
    fn parses_virtual_hosted_aws_url() {
        let cfg = resolve_storage_config(
            "https://my-bucket.s3.eu-west-2.amazonaws.com/prefix",
            None,
            None,
            None,
        )
        .unwrap();
        match cfg {
            StorageConfig::Byok { bucket, region, prefix, .. } => {
                assert_eq!(bucket, "my-bucket");
                assert_eq!(region, "eu-west-2");
                assert_eq!(prefix, "prefix");
            }
            _ => panic!("expected byok"),
        }
    }

    #[test]
    fn parses_path_style_custom_endpoint() {
        let cfg = resolve_storage_config("https://minio.internal:9000/my-bucket/prefix", None, None, None).unwrap();
        match cfg {
            StorageConfig::Byok { bucket, endpoint, prefix, .. } => {
                assert_eq!(bucket, "my-bucket");
                assert_eq!(prefix, "prefix");
                assert_eq!(endpoint.unwrap(), "https://minio.internal:9000");
            }
            _ => panic!("expected byok"),
        }
    }

    #[test]
    fn gateway_key_selects_gateway_backend() {
        let cfg = resolve_storage_config(
            "https://checkpoints.example.com",
            None,
            None,
            Some("key-123".to_string()),
        )
        .unwrap();
        match cfg {
            StorageConfig::Gateway { gateway_url, gateway_api_key } => {
                assert_eq!(gateway_url, "https://checkpoints.example.com");
                assert_eq!(gateway_api_key.unwrap(), "key-123");
            }
            _ => panic!("expected gateway"),
        }
    }
}
