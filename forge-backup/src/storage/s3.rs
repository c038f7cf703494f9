//! S3-compatible object store backend.

use super::{require, require_restore_target, BackupMethod, StorageBackend};
use crate::config::Settings;
use crate::retention::RemoteEntry;
use crate::utils::errors::{BackupError, Result};
use crate::utils::secret::Secret;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::{Credentials, RequestChecksumCalculation, ResponseChecksumValidation};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::env;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Object store connection parameters.
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: Secret,
    pub bucket: String,
    pub region: String,
}

impl S3Config {
    pub fn from_env() -> Self {
        let var = |key: &str| env::var(key).unwrap_or_default();

        Self {
            endpoint_url: var("ENDPOINT_URL"),
            access_key_id: var("AWS_ACCESS_KEY_ID"),
            secret_access_key: Secret::new(var("AWS_SECRET_ACCESS_KEY")),
            bucket: var("BUCKET"),
            region: var("REGION"),
        }
    }
}

pub struct S3Backend {
    config: S3Config,
    client: OnceCell<Client>,
}

impl S3Backend {
    pub fn new(config: S3Config) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    /// Client built on first use and reused for the rest of the run.
    async fn client(&self) -> &Client {
        self.client.get_or_init(|| self.build_client()).await
    }

    async fn build_client(&self) -> Client {
        debug!(endpoint = %self.config.endpoint_url, bucket = %self.config.bucket, "Building S3 client");

        let credentials = Credentials::new(
            self.config.access_key_id.clone(),
            self.config.secret_access_key.expose().to_string(),
            None,
            None,
            "forge-backup",
        );

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.config.region.clone()))
            .endpoint_url(self.config.endpoint_url.clone())
            .credentials_provider(credentials)
            .load()
            .await;

        // Path-style addressing and on-demand checksums keep MinIO and other
        // S3-compatible stores working.
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();

        Client::from_conf(s3_config)
    }
}

fn transfer_failed<E: std::error::Error>(action: &str, e: E) -> BackupError {
    BackupError::TransferFailed(format!("{}: {}", action, DisplayErrorContext(e)))
}

fn to_chrono(ts: Option<&aws_sdk_s3::primitives::DateTime>) -> DateTime<Utc> {
    ts.and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn method(&self) -> BackupMethod {
        BackupMethod::ObjectStore
    }

    fn validate_config(&self) -> Result<()> {
        require(&self.config.endpoint_url, "ENDPOINT_URL")?;
        require(&self.config.access_key_id, "AWS_ACCESS_KEY_ID")?;
        require(self.config.secret_access_key.expose(), "AWS_SECRET_ACCESS_KEY")?;
        require(&self.config.bucket, "BUCKET")?;
        require(&self.config.region, "REGION")
    }

    async fn upload(&self, settings: &Settings) -> Result<()> {
        self.validate_config()?;
        let key = settings.archive_identifier.as_str();
        info!("Uploading {} to s3://{}/{}", settings.backup_archive.display(), self.config.bucket, key);

        let body = ByteStream::from_path(&settings.backup_archive)
            .await
            .map_err(|e| transfer_failed(&format!("read {}", settings.backup_archive.display()), e))?;

        self.client()
            .await
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| transfer_failed(&format!("put {}", key), e))?;

        info!("Upload complete: {}", key);
        Ok(())
    }

    async fn download(&self, settings: &Settings) -> Result<()> {
        self.validate_config()?;
        let key = require_restore_target(settings)?;
        info!("Downloading s3://{}/{} to {}", self.config.bucket, key, settings.restore_archive.display());

        let output = self
            .client()
            .await
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    BackupError::ObjectNotFound(key.to_string())
                } else {
                    transfer_failed(&format!("get {}", key), service)
                }
            })?;

        let mut body = output.body;
        let mut file = tokio::fs::File::create(&settings.restore_archive).await?;
        let mut bytes = 0u64;

        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| transfer_failed(&format!("read body of {}", key), e))?
        {
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;

        info!("Download complete: {} ({} bytes)", key, bytes);
        Ok(())
    }

    async fn list_archives(&self, prefix: &str) -> Result<Vec<RemoteEntry>> {
        self.validate_config()?;

        let mut pages = self
            .client()
            .await
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut entries = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| transfer_failed("list objects", e))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    entries.push(RemoteEntry::new(key, to_chrono(object.last_modified())));
                }
            }
        }

        debug!("Listed {} archives under prefix {:?}", entries.len(), prefix);
        Ok(entries)
    }

    async fn delete_archive(&self, name: &str) -> Result<()> {
        self.validate_config()?;

        self.client()
            .await
            .delete_object()
            .bucket(&self.config.bucket)
            .key(name)
            .send()
            .await
            .map_err(|e| transfer_failed(&format!("delete {}", name), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn complete_config() -> S3Config {
        S3Config {
            endpoint_url: "http://minio:9000".to_string(),
            access_key_id: "access".to_string(),
            secret_access_key: Secret::new("secret"),
            bucket: "backups".to_string(),
            region: "us-east-1".to_string(),
        }
    }

    fn settings(restore_target: Option<&str>) -> Settings {
        Settings {
            backup_method: "s3".to_string(),
            restore_target: restore_target.map(str::to_string),
            history_file: PathBuf::from("/tmp/history.txt"),
            archive_identifier: "gitea-backup-1.zip".to_string(),
            prefix: "gitea-backup".to_string(),
            max_retention: 5,
            backup_staging: PathBuf::from("/tmp/backup"),
            backup_archive: PathBuf::from("/tmp/backup.zip"),
            restore_staging: PathBuf::from("/tmp/restore"),
            restore_archive: PathBuf::from("/tmp/restore.zip"),
            forge_config_path: PathBuf::from("/data/gitea/conf/app.ini"),
        }
    }

    #[test]
    fn test_complete_config_validates() {
        assert!(S3Backend::new(complete_config()).validate_config().is_ok());
    }

    #[test]
    fn test_each_missing_field_is_reported() {
        let cases: [(&str, fn(&mut S3Config)); 5] = [
            ("ENDPOINT_URL", |c| c.endpoint_url.clear()),
            ("AWS_ACCESS_KEY_ID", |c| c.access_key_id.clear()),
            ("AWS_SECRET_ACCESS_KEY", |c| c.secret_access_key = Secret::default()),
            ("BUCKET", |c| c.bucket.clear()),
            ("REGION", |c| c.region.clear()),
        ];

        for (var, clear) in cases {
            let mut config = complete_config();
            clear(&mut config);
            let err = S3Backend::new(config).validate_config().unwrap_err();
            assert!(matches!(err, BackupError::Configuration(_)));
            assert!(err.to_string().contains(var), "{err} should name {var}");
        }
    }

    #[tokio::test]
    async fn test_operations_fail_before_any_request_when_unconfigured() {
        let backend = S3Backend::new(S3Config::default());
        let settings = settings(Some("gitea-backup-0.zip"));

        assert!(matches!(backend.upload(&settings).await, Err(BackupError::Configuration(_))));
        assert!(matches!(backend.download(&settings).await, Err(BackupError::Configuration(_))));
        assert!(matches!(backend.list_archives("gitea-backup").await, Err(BackupError::Configuration(_))));
        assert!(matches!(backend.delete_archive("x").await, Err(BackupError::Configuration(_))));
        assert!(backend.client.get().is_none());
    }

    #[tokio::test]
    async fn test_download_without_target_is_configuration_error() {
        let backend = S3Backend::new(complete_config());
        let result = backend.download(&settings(None)).await;
        assert!(matches!(result, Err(BackupError::Configuration(msg)) if msg.contains("BACKUP_FILENAME")));
    }

    #[test]
    fn test_missing_timestamp_sorts_oldest() {
        assert_eq!(to_chrono(None), DateTime::<Utc>::MIN_UTC);
        let ts = aws_sdk_s3::primitives::DateTime::from_secs(1_700_000_000);
        assert_eq!(to_chrono(Some(&ts)).timestamp(), 1_700_000_000);
    }
}
