use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use super::staging::StagingError;
use super::types::{DownloadOptions, DownloadResult, Format, Platform, ProgressCallback, VideoMetadata};

/// Extraction errors, grouped the way the retry loop treats them
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Malformed or unsupported URL; never retried
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("metadata extraction failed: {0}")]
    MetadataExtraction(String),

    #[error("extraction tool not found: {0}")]
    ToolNotFound(String),

    #[error("extraction tool failed: {0}")]
    Tool(String),

    #[error("attempt timed out after {0}s")]
    Timeout(u64),

    /// Intentionally unimplemented platform capability; never retried
    #[error("{0}")]
    Unsupported(String),

    #[error(transparent)]
    Filesystem(#[from] StagingError),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ExtractError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ExtractError::InvalidUrl(_) | ExtractError::Unsupported(_))
    }
}

/// Platform-specific retrieval of metadata and media
#[async_trait]
pub trait Extractor: Send + Sync {
    fn platform(&self) -> Platform;

    /// Look up remote metadata. This is the only fallible entry point.
    async fn get_metadata(&self, url: &str) -> Result<VideoMetadata, ExtractError>;

    /// Stage the media locally. Never errors: failures land in the result.
    async fn download(&self, url: &str, options: &DownloadOptions) -> DownloadResult;
}

/// Raw metadata reported by the extraction tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeInfo {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub uploader: Option<String>,
    pub upload_date: Option<String>,
    pub duration_seconds: Option<f64>,
    pub thumbnail: Option<String>,
}

/// One media retrieval request handed to the tool
pub struct FetchRequest<'a> {
    pub url: &'a str,
    pub format_selector: &'a str,
    pub merge_format: Format,
    pub output: &'a Path,
    pub progress: Option<&'a ProgressCallback>,
}

/// External command-line media extractor, treated as a black box
#[async_trait]
pub trait MediaTool: Send + Sync {
    fn name(&self) -> &'static str;

    async fn probe(&self, url: &str) -> Result<ProbeInfo, ExtractError>;

    /// Materialize the media at `request.output`. A clean exit without an
    /// output file is still a failure; callers check for the file.
    async fn fetch(&self, request: FetchRequest<'_>) -> Result<(), ExtractError>;
}
