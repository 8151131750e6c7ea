//! Public download entry point
//!
//! Classifies the URL once, picks the matching extractor and turns every
//! outcome, including a panicking extractor, into a [`DownloadResult`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::{error, info, warn};

use super::instagram::InstagramExtractor;
use super::traits::{ExtractError, Extractor, MediaTool};
use super::types::{DownloadOptions, DownloadResult, Platform, VideoMetadata};
use super::youtube::YouTubeExtractor;
use super::ytdlp::YtDlp;
use crate::classifier;
use crate::config::DownloaderConfig;

pub const UNEXPECTED_DOWNLOAD_ERROR: &str = "Unexpected error during download";

/// One extractor per supported platform
#[derive(Clone)]
pub enum PlatformExtractor {
    YouTube(Arc<YouTubeExtractor>),
    Instagram(Arc<InstagramExtractor>),
}

impl PlatformExtractor {
    pub fn platform(&self) -> Platform {
        match self {
            PlatformExtractor::YouTube(_) => Platform::YouTube,
            PlatformExtractor::Instagram(_) => Platform::Instagram,
        }
    }

    fn into_dyn(self) -> Arc<dyn Extractor> {
        match self {
            PlatformExtractor::YouTube(extractor) => extractor,
            PlatformExtractor::Instagram(extractor) => extractor,
        }
    }
}

pub struct VideoDownloader {
    youtube: Arc<YouTubeExtractor>,
    instagram: Arc<InstagramExtractor>,
    defaults: DownloadOptions,
}

impl VideoDownloader {
    /// Build a downloader staging into `staging_dir` and fetching through `tool`
    pub fn new(staging_dir: impl Into<PathBuf>, tool: Arc<dyn MediaTool>) -> Self {
        let staging_dir = staging_dir.into();
        Self {
            youtube: Arc::new(YouTubeExtractor::new(tool, &staging_dir)),
            instagram: Arc::new(InstagramExtractor::new(&staging_dir)),
            defaults: DownloadOptions::builder().output_dir(staging_dir).build(),
        }
    }

    pub fn from_config(config: &DownloaderConfig) -> Self {
        let tool: Arc<dyn MediaTool> = Arc::new(YtDlp::new(&config.ytdlp_path));
        let defaults = DownloadOptions::builder()
            .output_dir(config.staging_dir.clone())
            .format(config.format)
            .quality(config.quality)
            .max_retries(config.max_retries)
            .backoff_base(Duration::from_millis(config.backoff_base_ms))
            .maybe_attempt_timeout(config.attempt_timeout_secs.map(Duration::from_secs))
            .build();

        Self::new(&config.staging_dir, tool).with_defaults(defaults)
    }

    /// Replace the options handed out by [`VideoDownloader::default_options`]
    pub fn with_defaults(mut self, defaults: DownloadOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Configured options, for callers that only override a few fields
    pub fn default_options(&self) -> DownloadOptions {
        self.defaults.clone()
    }

    pub fn staging_dir(&self) -> Option<&Path> {
        self.defaults.output_dir.as_deref()
    }

    pub fn extractor_for(&self, platform: Platform) -> PlatformExtractor {
        match platform {
            Platform::YouTube => PlatformExtractor::YouTube(self.youtube.clone()),
            Platform::Instagram => PlatformExtractor::Instagram(self.instagram.clone()),
        }
    }

    pub async fn get_metadata(&self, url: &str) -> Result<VideoMetadata, ExtractError> {
        let url = url.trim();
        let classification = classifier::classify(url);
        let Some((platform, _)) = classification.target() else {
            return Err(ExtractError::InvalidUrl(
                classification.error.unwrap_or_default(),
            ));
        };

        self.extractor_for(platform).into_dyn().get_metadata(url).await
    }

    /// Download `url`. Never fails: every outcome is a result value.
    pub async fn download(&self, url: &str, options: DownloadOptions) -> DownloadResult {
        let url = url.trim();
        let classification = classifier::classify(url);
        let Some((platform, id)) = classification.target() else {
            let message = classification
                .error
                .unwrap_or_else(|| classifier::UNSUPPORTED_URL_ERROR.to_string());
            warn!(url, error = %message, "Rejected download for invalid URL");
            return DownloadResult::failure(message);
        };

        info!(url, platform = %platform, id, "Starting download");

        let extractor = self.extractor_for(platform).into_dyn();
        let url = url.to_string();
        let task = tokio::spawn(async move { extractor.download(&url, &options).await });
        // Dropping this future (caller timeout, client disconnect) cancels the attempt
        let _abort = AbortOnDrop(task.abort_handle());

        match task.await {
            Ok(result) => {
                if result.success {
                    info!(platform = %platform, id, file_name = ?result.file_name, "Download finished");
                }
                result
            }
            Err(join_error) => {
                error!(platform = %platform, id, error = %join_error, "Extractor task aborted");
                DownloadResult::failure(format!("{}: {}", UNEXPECTED_DOWNLOAD_ERROR, join_error))
            }
        }
    }
}

/// Aborts the spawned attempt when the awaiting future goes away
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
