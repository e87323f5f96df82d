//! Object store gateway for archive objects.
//!
//! The S3 implementation treats "not configured" as a first-class state:
//! an incomplete `[s3]` section leaves the inner client absent, probes
//! report it without erroring, and only raw transfer calls propagate it
//! as [`StorageError::NotConfigured`].

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::S3Config;

/// Key used by the write-permission probe. Created and removed again in
/// one self-contained check.
const PERMISSION_PROBE_KEY: &str = "s3logs_permission_check";

/// Errors from object store transfer operations.
///
/// Probe methods never return these; they fold faults into [`Probe`]
/// results instead.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object store is not configured")]
    NotConfigured,

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Listing failed: {0}")]
    List(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a connectivity or permission probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub success: bool,
    pub details: String,
}

impl Probe {
    fn ok() -> Self {
        Self {
            success: true,
            details: String::new(),
        }
    }

    fn failed(details: impl Into<String>) -> Self {
        Self {
            success: false,
            details: details.into(),
        }
    }
}

/// Capability interface over the archive object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a local file under `key` and return the object URL.
    async fn put(
        &self,
        local_path: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Download the object at `key` to a local file.
    async fn get(&self, key: &str, local_path: &Path) -> Result<(), StorageError>;

    /// All object keys in the bucket, paginating transparently past the
    /// per-response cap.
    async fn list_all_keys(&self) -> Result<Vec<String>, StorageError>;

    /// Lightweight existence probe against the bucket. Never errors.
    async fn test_connection(&self) -> Probe;

    /// Minimal write-then-cleanup probe, distinct from connectivity.
    /// Never errors.
    async fn test_permissions(&self) -> Probe;
}

/// S3-backed object store.
pub struct S3ObjectStore {
    config: S3Config,
    client: Option<aws_sdk_s3::Client>,
}

impl S3ObjectStore {
    /// Build a store from configuration.
    ///
    /// An incomplete configuration yields a store without a client rather
    /// than an error; probes then report "not configured".
    pub async fn new(config: &S3Config) -> Self {
        // is_configured() implies the region is present.
        let Some(region) = config.region.filter(|_| config.is_configured()) else {
            warn!("S3 object store is not configured");
            return Self {
                config: config.clone(),
                client: None,
            };
        };
        let mut sdk_config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.as_str()));

        if !config.use_sdk_credentials
            && let (Some(key_id), Some(secret_key)) = (&config.key_id, &config.secret_key)
        {
            let credentials = aws_credential_types::Credentials::new(
                key_id.clone(),
                secret_key.clone(),
                None, // session token
                None, // expiry
                "s3logs-config",
            );
            sdk_config_builder = sdk_config_builder.credentials_provider(credentials);
        }

        let sdk_config = sdk_config_builder.load().await;
        let client = aws_sdk_s3::Client::new(&sdk_config);

        info!(bucket = %config.bucket, region = %region, "Initialized S3 object store");

        Self {
            config: config.clone(),
            client: Some(client),
        }
    }

    fn client(&self) -> Result<&aws_sdk_s3::Client, StorageError> {
        self.client.as_ref().ok_or(StorageError::NotConfigured)
    }

    fn object_url(&self, key: &str) -> String {
        let region = self
            .config
            .region
            .map(|r| r.as_str().to_string())
            .unwrap_or_default();
        format!("https://{}.s3.{}.amazonaws.com/{}", self.config.bucket, region, key)
    }
}

/// Best-effort detail string from an SDK fault: the service error's code
/// and message when present, a generic label otherwise.
fn fault_details<E, R>(err: &SdkError<E, R>) -> String
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match err.as_service_error() {
        Some(service_err) => {
            let code = service_err.code().unwrap_or("unknown");
            let message = service_err.message().unwrap_or("no message provided");
            format!("{code}: {message}")
        }
        None => format!("Not a recognized storage fault: {err}"),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        local_path: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let client = self.client()?;
        debug!(key, path = %local_path.display(), "Uploading object");

        let body = aws_sdk_s3::primitives::ByteStream::from_path(local_path)
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Upload(fault_details(&e)))?;

        let url = self.object_url(key);
        info!(key, url, "Object uploaded");
        Ok(url)
    }

    async fn get(&self, key: &str, local_path: &Path) -> Result<(), StorageError> {
        let client = self.client()?;
        debug!(key, path = %local_path.display(), "Downloading object");

        let output = client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Download(fault_details(&e)))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Download(e.to_string()))?
            .into_bytes();

        tokio::fs::write(local_path, &bytes).await?;
        Ok(())
    }

    async fn list_all_keys(&self) -> Result<Vec<String>, StorageError> {
        let client = self.client()?;

        let mut keys = Vec::new();
        let mut pages = client
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StorageError::List(fault_details(&e)))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }
        }

        debug!(count = keys.len(), "Listed archive bucket");
        Ok(keys)
    }

    async fn test_connection(&self) -> Probe {
        let Some(client) = self.client.as_ref() else {
            return Probe::failed("Object store is not configured");
        };

        match client
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await
        {
            Ok(_) => Probe::ok(),
            Err(e) => Probe::failed(fault_details(&e)),
        }
    }

    async fn test_permissions(&self) -> Probe {
        let Some(client) = self.client.as_ref() else {
            return Probe::failed("Object store is not configured");
        };

        let write = client
            .put_object()
            .bucket(&self.config.bucket)
            .key(PERMISSION_PROBE_KEY)
            .body(aws_sdk_s3::primitives::ByteStream::from_static(b"s3logs"))
            .send()
            .await;

        if let Err(e) = write {
            return Probe::failed(fault_details(&e));
        }

        // Cleanup is part of the probe; a bucket we can write to but not
        // delete from is still misconfigured for the permission check.
        match client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(PERMISSION_PROBE_KEY)
            .send()
            .await
        {
            Ok(_) => Probe::ok(),
            Err(e) => Probe::failed(fault_details(&e)),
        }
    }
}
