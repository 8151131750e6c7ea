use crate::downloader::{Format, Quality};
use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub library: LibraryConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_library_path")]
    pub library_path: PathBuf,
    /// Request body limit for JSON endpoints
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: ByteSize,
    /// Downloads served at once; extra requests wait
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            library_path: default_library_path(),
            max_payload_bytes: default_max_payload_bytes(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8080))
}

fn default_library_path() -> PathBuf {
    PathBuf::from("data/library")
}

fn default_max_payload_bytes() -> ByteSize {
    ByteSize(64 * 1024) // 64 KB
}

fn default_max_concurrent_downloads() -> usize {
    4
}

/// Download orchestration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloaderConfig {
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: PathBuf,
    #[serde(default)]
    pub format: Format,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Deadline for a single attempt, none by default
    pub attempt_timeout_secs: Option<u64>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            staging_dir: default_staging_dir(),
            ytdlp_path: default_ytdlp_path(),
            format: Format::default(),
            quality: Quality::default(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            attempt_timeout_secs: None,
        }
    }
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_ytdlp_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

/// Storage provider type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    S3,
    #[default]
    Local,
    Memory,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Directory backing the local provider
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// Prefix of public URLs handed out after upload
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: ByteSize,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    /// S3 access key (loaded from environment, not from config file)
    #[serde(skip)]
    pub access_key: Option<String>,
    /// S3 secret key (loaded from environment, not from config file)
    #[serde(skip)]
    pub secret_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::Local,
            bucket: default_bucket(),
            root: default_storage_root(),
            public_base_url: default_public_base_url(),
            max_upload_bytes: default_max_upload_bytes(),
            endpoint: None,
            region: None,
            access_key: None,
            secret_key: None,
        }
    }
}

fn default_bucket() -> String {
    "videos".to_string()
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/blobs")
}

fn default_public_base_url() -> String {
    "/files".to_string()
}

fn default_max_upload_bytes() -> ByteSize {
    ByteSize(500 * 1024 * 1024) // 500 MB
}

/// Library listing limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_page_size() -> usize {
    50
}

fn default_max_page_size() -> usize {
    200
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.server.max_payload_bytes.as_u64(), 64 * 1024);
        assert_eq!(config.server.max_concurrent_downloads, 4);
        assert_eq!(config.downloader.max_retries, 3);
        assert_eq!(config.downloader.backoff_base_ms, 1000);
        assert_eq!(config.downloader.format, Format::Mp4);
        assert_eq!(config.storage.provider, StorageProvider::Local);
        assert_eq!(config.storage.bucket, "videos");
        assert_eq!(config.storage.max_upload_bytes.as_u64(), 500 * 1024 * 1024);
        assert_eq!(config.library.default_page_size, 50);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
[downloader]
quality = "low"
attempt_timeout_secs = 120

[storage]
provider = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.downloader.quality, Quality::Low);
        assert_eq!(config.downloader.attempt_timeout_secs, Some(120));
        assert_eq!(config.downloader.staging_dir, PathBuf::from("./downloads"));
        assert_eq!(config.storage.provider, StorageProvider::Memory);
        assert_eq!(config.storage.public_base_url, "/files");
    }
}
