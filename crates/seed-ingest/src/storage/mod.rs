//! Blob stores holding the tabular sources

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    Client,
};
use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use crate::error::{IngestError, Result};

pub mod config;

pub use config::StorageConfig;

/// Read and copy access to objects by key
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch an object; `None` when it does not exist
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Copy an object to another key of the same store
    async fn copy(&self, source_key: &str, dest_key: &str) -> Result<()>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Archive location of a processed source: `{basename}/{yyyy-mm-dd}/{filename}`
pub fn archive_key(filename: &str, date: NaiveDate) -> String {
    let basename = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    format!("{}/{}/{}", basename, date.format("%Y-%m-%d"), filename)
}

#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub async fn new(config: StorageConfig) -> Self {
        debug!("Initializing storage with config: {:?}", config.endpoint);

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some((access_key, secret_key)) = config.static_credentials() {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "campus-seed",
            ));
        }

        let sdk_config = loader.load().await;
        let mut s3_config_builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!("Storage client initialized for bucket: {}", config.bucket);

        Self {
            client,
            bucket: config.bucket,
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        debug!("Downloading from s3://{}/{}", self.bucket, key);

        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Ok(None);
            },
            Err(e) => {
                return Err(IngestError::storage(format!(
                    "Failed to download s3://{}/{}: {}",
                    self.bucket, key, e
                )));
            },
        };

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| IngestError::storage(format!("Failed to read S3 response body: {}", e)))?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), self.bucket, key);

        Ok(Some(data))
    }

    #[instrument(skip(self))]
    async fn copy(&self, source_key: &str, dest_key: &str) -> Result<()> {
        let copy_source = format!("{}/{}", self.bucket, source_key);

        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(&copy_source)
            .key(dest_key)
            .send()
            .await
            .map_err(|e| IngestError::storage(format!("Failed to copy S3 object: {}", e)))?;

        info!(
            "Copied s3://{}/{} to s3://{}/{}",
            self.bucket, source_key, self.bucket, dest_key
        );

        Ok(())
    }

    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}

/// Objects as files under a root directory
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_of(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_of(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn copy(&self, source_key: &str, dest_key: &str) -> Result<()> {
        let dest = self.path_of(dest_key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(self.path_of(source_key), &dest).await?;
        debug!(source_key, dest = %dest.display(), "Copied local object");
        Ok(())
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}
