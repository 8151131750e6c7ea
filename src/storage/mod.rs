//! Blob storage for staged videos and thumbnails
//! Uses Apache Arrow object_store crate

use bytes::Bytes;
use chrono::{Datelike, NaiveDate};
use object_store::aws::AmazonS3Builder;
use object_store::buffered::BufWriter;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{GetResult, ObjectStore, path::Path as StoragePath};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::config::{StorageConfig, StorageProvider};
use crate::downloader::Platform;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("File of {size} bytes exceeds the upload limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// What a stored object holds; part of its key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Video,
    Thumbnail,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Video => "video",
            AssetKind::Thumbnail => "thumbnail",
        }
    }
}

/// `platform/YYYY/MM/DD/{video|thumbnail}/file_name`
pub fn storage_path(platform: Platform, date: NaiveDate, kind: AssetKind, file_name: &str) -> String {
    format!(
        "{}/{:04}/{:02}/{:02}/{}/{}",
        platform.as_str(),
        date.year(),
        date.month(),
        date.day(),
        kind.as_str(),
        file_name
    )
}

/// Content type derived from a key's extension
pub fn content_type_for(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Metadata returned after upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub size: u64,
}

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    pub bucket: String,
    public_base_url: String,
    max_upload_bytes: u64,
}

impl StorageClient {
    /// Create new storage client with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        let defaults = StorageConfig::default();
        Self {
            store,
            bucket: bucket.into(),
            public_base_url: defaults.public_base_url,
            max_upload_bytes: defaults.max_upload_bytes.as_u64(),
        }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "videos")
    }

    /// Build the backend named by `config.provider`
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match config.provider {
            StorageProvider::Memory => Arc::new(InMemory::new()),
            StorageProvider::Local => {
                std::fs::create_dir_all(&config.root)?;
                Arc::new(LocalFileSystem::new_with_prefix(&config.root)?)
            }
            StorageProvider::S3 => {
                let mut builder = AmazonS3Builder::new().with_bucket_name(&config.bucket);
                if let Some(region) = &config.region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = &config.endpoint {
                    builder = builder
                        .with_endpoint(endpoint)
                        .with_allow_http(endpoint.starts_with("http://"));
                }
                if let Some(access_key) = &config.access_key {
                    builder = builder.with_access_key_id(access_key);
                }
                if let Some(secret_key) = &config.secret_key {
                    builder = builder.with_secret_access_key(secret_key);
                }
                Arc::new(builder.build()?)
            }
        };

        tracing::info!(provider = ?config.provider, bucket = %config.bucket, "Storage backend ready");

        Ok(Self::new(store, config.bucket.clone())
            .with_public_base_url(&config.public_base_url)
            .with_max_upload_bytes(config.max_upload_bytes.as_u64()))
    }

    pub fn with_public_base_url(mut self, base: &str) -> Self {
        self.public_base_url = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    /// `{public_base_url}/{bucket}/{key}`
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.bucket, key)
    }

    /// Recover the object key from a URL built by [`StorageClient::public_url`]
    pub fn key_from_url(&self, url: &str) -> Option<String> {
        let prefix = self.public_url("");
        let key = match url.strip_prefix(&prefix) {
            Some(key) => key,
            None => url.split_once(&format!("/{}/", self.bucket))?.1,
        };

        let key = key.split(['?', '#']).next().unwrap_or_default();
        (!key.is_empty()).then(|| key.to_string())
    }

    /// Stream a local file into storage
    pub async fn upload_file(&self, local_path: &Path, key: &str) -> Result<StoredObject> {
        let size = tokio::fs::metadata(local_path).await?.len();
        if size > self.max_upload_bytes {
            return Err(StorageError::TooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }

        let mut file = tokio::fs::File::open(local_path).await?;
        let mut writer = BufWriter::new(self.store.clone(), StoragePath::from(key));

        let copied = match tokio::io::copy(&mut file, &mut writer).await {
            Ok(copied) => copied,
            Err(e) => {
                if let Err(abort_err) = writer.abort().await {
                    tracing::warn!(key, error = %abort_err, "Failed to abort partial upload");
                }
                return Err(StorageError::UploadFailed(e.to_string()));
            }
        };
        writer
            .shutdown()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        tracing::info!(key, size = copied, "Uploaded file to storage");

        Ok(StoredObject {
            key: key.to_string(),
            url: self.public_url(key),
            size: copied,
        })
    }

    /// Upload bytes to storage
    pub async fn upload_bytes(&self, key: &str, data: Bytes) -> Result<StoredObject> {
        let size = data.len() as u64;
        if size > self.max_upload_bytes {
            return Err(StorageError::TooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }

        self.store.put(&StoragePath::from(key), data.into()).await?;
        tracing::info!(key, size, "Uploaded to storage");

        Ok(StoredObject {
            key: key.to_string(),
            url: self.public_url(key),
            size,
        })
    }

    /// Open an object for reading without buffering it. `meta.size` holds
    /// its length and `into_stream` yields the body in chunks.
    pub async fn open(&self, key: &str) -> Result<GetResult> {
        match self.store.get(&StoragePath::from(key)).await {
            Ok(result) => Ok(result),
            Err(object_store::Error::NotFound { .. }) => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch an object's bytes
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        let bytes = self.open(key).await?.bytes().await?;
        tracing::debug!(key, size = bytes.len(), "Read from storage");
        Ok(bytes)
    }

    /// Check if key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = StoragePath::from(key);

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal. Returns whether the backend confirmed it.
    pub async fn delete(&self, key: &str) -> bool {
        match self.store.delete(&StoragePath::from(key)).await {
            Ok(()) => {
                tracing::info!(key, "Deleted from storage");
                true
            }
            Err(object_store::Error::NotFound { .. }) => false,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to delete from storage");
                false
            }
        }
    }
}
