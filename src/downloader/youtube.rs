use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::retry::{RetryFailure, RetryPolicy, retry};
use super::staging::{StagedOutput, ensure_dir, file_size, generate_unique_file_name};
use super::traits::{ExtractError, Extractor, FetchRequest, MediaTool};
use super::types::{DownloadOptions, DownloadResult, Platform, Quality, VideoMetadata};

/// yt-dlp format selector for a quality tier
pub fn format_selector(quality: Quality) -> &'static str {
    match quality {
        Quality::Best => "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
        Quality::High => {
            "bestvideo[height<=1080][ext=mp4]+bestaudio[ext=m4a]/best[height<=1080][ext=mp4]/best"
        }
        Quality::Medium => {
            "bestvideo[height<=720][ext=mp4]+bestaudio[ext=m4a]/best[height<=720][ext=mp4]/best"
        }
        Quality::Low => {
            "bestvideo[height<=480][ext=mp4]+bestaudio[ext=m4a]/best[height<=480][ext=mp4]/best"
        }
        Quality::Unrecognized => "best[ext=mp4]/best",
    }
}

/// Turn a retry outcome into the uniform failure result
pub(crate) fn failure_result(failure: RetryFailure) -> DownloadResult {
    match failure {
        RetryFailure::Aborted(err) => DownloadResult::failure(err.to_string()),
        RetryFailure::Exhausted {
            attempts,
            last_error,
        } => DownloadResult::failure(format!(
            "Download failed after {} attempts: {}",
            attempts, last_error
        )),
    }
}

/// YouTube Shorts extractor backed by an external media tool
pub struct YouTubeExtractor {
    tool: Arc<dyn MediaTool>,
    default_output_dir: PathBuf,
}

impl YouTubeExtractor {
    pub fn new(tool: Arc<dyn MediaTool>, default_output_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            default_output_dir: default_output_dir.into(),
        }
    }

    async fn attempt(
        &self,
        url: &str,
        output_dir: &Path,
        options: &DownloadOptions,
    ) -> Result<DownloadResult, ExtractError> {
        ensure_dir(output_dir).await?;

        let metadata = self.get_metadata(url).await?;
        let file_name =
            generate_unique_file_name(output_dir, &metadata.title, options.format.container())
                .await?;
        let staged = StagedOutput::new(output_dir.join(&file_name));

        let request = FetchRequest {
            url,
            format_selector: format_selector(options.quality),
            merge_format: options.format,
            output: staged.path(),
            progress: options.progress.as_ref(),
        };

        // On every early return, or if this future is dropped, `staged` removes the leftovers
        self.tool.fetch(request).await?;

        if !tokio::fs::try_exists(staged.path()).await.unwrap_or(false) {
            return Err(ExtractError::Tool(format!(
                "{} exited cleanly but produced no file at {}",
                self.tool.name(),
                staged.path().display()
            )));
        }

        let output = staged.keep();
        let size = file_size(&output).await;
        info!(url, file_name = %file_name, size, "Staged YouTube video");

        Ok(DownloadResult::success(
            output,
            file_name,
            size,
            metadata.duration_seconds,
        ))
    }
}

#[async_trait]
impl Extractor for YouTubeExtractor {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    async fn get_metadata(&self, url: &str) -> Result<VideoMetadata, ExtractError> {
        let info = self.tool.probe(url).await.map_err(|err| match err {
            ExtractError::MetadataExtraction(msg) => ExtractError::MetadataExtraction(msg),
            other => ExtractError::MetadataExtraction(other.to_string()),
        })?;

        Ok(VideoMetadata {
            title: info
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            description: info.description,
            uploader: info.uploader,
            upload_date: info.upload_date,
            duration_seconds: info
                .duration_seconds
                .filter(|d| d.is_finite() && *d >= 0.0)
                .map(|d| d.round() as u64),
            thumbnail_url: info.thumbnail,
            canonical_id: info.id,
            platform: Platform::YouTube,
        })
    }

    async fn download(&self, url: &str, options: &DownloadOptions) -> DownloadResult {
        let output_dir = options
            .output_dir
            .clone()
            .unwrap_or_else(|| self.default_output_dir.clone());
        let policy = RetryPolicy::new(options.max_retries, options.backoff_base)
            .with_attempt_timeout(options.attempt_timeout);

        let outcome = retry(policy, |attempt| {
            debug!(url, attempt, "YouTube download attempt");
            self.attempt(url, &output_dir, options)
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(failure) => {
                let result = failure_result(failure);
                warn!(url, error = ?result.error, "YouTube download failed");
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::mock::MockTool;
    use crate::downloader::traits::ProbeInfo;
    use crate::downloader::types::DownloadProgress;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    const URL: &str = "https://www.youtube.com/shorts/dQw4w9WgXcQ";

    fn info() -> ProbeInfo {
        ProbeInfo {
            id: "dQw4w9WgXcQ".to_string(),
            title: Some("Never Gonna Give You Up".to_string()),
            uploader: Some("Rick Astley".to_string()),
            duration_seconds: Some(212.4),
            thumbnail: Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.jpg".to_string()),
            ..Default::default()
        }
    }

    fn fast_options(dir: &Path, retries: u32) -> DownloadOptions {
        DownloadOptions::builder()
            .output_dir(dir)
            .max_retries(retries)
            .backoff_base(Duration::from_millis(1))
            .build()
    }

    #[test]
    fn test_format_selector_tiers() {
        assert!(format_selector(Quality::Best).starts_with("bestvideo[ext=mp4]"));
        assert!(format_selector(Quality::High).contains("height<=1080"));
        assert!(format_selector(Quality::Medium).contains("height<=720"));
        assert!(format_selector(Quality::Low).contains("height<=480"));
        assert_eq!(format_selector(Quality::Unrecognized), "best[ext=mp4]/best");
    }

    #[tokio::test]
    async fn test_get_metadata_maps_probe_info() {
        let extractor = YouTubeExtractor::new(Arc::new(MockTool::new(info())), "unused");
        let metadata = extractor.get_metadata(URL).await.unwrap();

        assert_eq!(metadata.title, "Never Gonna Give You Up");
        assert_eq!(metadata.canonical_id, "dQw4w9WgXcQ");
        assert_eq!(metadata.duration_seconds, Some(212));
        assert_eq!(metadata.platform, Platform::YouTube);
    }

    #[tokio::test]
    async fn test_get_metadata_defaults_title() {
        let probe = ProbeInfo {
            id: "dQw4w9WgXcQ".to_string(),
            ..Default::default()
        };
        let extractor = YouTubeExtractor::new(Arc::new(MockTool::new(probe)), "unused");
        assert_eq!(extractor.get_metadata(URL).await.unwrap().title, "Untitled");
    }

    #[tokio::test]
    async fn test_get_metadata_failure() {
        let tool = MockTool::new(info()).failing_probe();
        let extractor = YouTubeExtractor::new(Arc::new(tool), "unused");
        let err = extractor.get_metadata(URL).await.unwrap_err();
        assert!(matches!(err, ExtractError::MetadataExtraction(_)));
    }

    #[tokio::test]
    async fn test_download_stages_file() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("staging");
        let tool = Arc::new(MockTool::new(info()).with_payload(vec![7u8; 2048]));
        let extractor = YouTubeExtractor::new(tool.clone(), &staging);

        let result = extractor.download(URL, &fast_options(&staging, 3)).await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.file_name.as_deref(), Some("Never_Gonna_Give_You_Up.mp4"));
        assert_eq!(result.file_size_bytes, Some(2048));
        assert_eq!(result.duration_seconds, Some(212));
        assert!(result.error.is_none());
        assert!(result.local_file_path.unwrap().exists());
        assert_eq!(tool.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_second_download_gets_suffixed_name() {
        let dir = TempDir::new().unwrap();
        let extractor = YouTubeExtractor::new(Arc::new(MockTool::new(info())), dir.path());
        let options = fast_options(dir.path(), 1);

        let first = extractor.download(URL, &options).await;
        let second = extractor.download(URL, &options).await;

        assert_eq!(first.file_name.as_deref(), Some("Never_Gonna_Give_You_Up.mp4"));
        assert_eq!(second.file_name.as_deref(), Some("Never_Gonna_Give_You_Up_1.mp4"));
    }

    #[tokio::test]
    async fn test_download_retries_then_succeeds() {
        let dir = TempDir::new().unwrap();
        let tool = Arc::new(MockTool::new(info()).failing_fetches(2));
        let extractor = YouTubeExtractor::new(tool.clone(), dir.path());

        let result = extractor.download(URL, &fast_options(dir.path(), 3)).await;

        assert!(result.success);
        assert_eq!(tool.fetch_count(), 3);
        // failed attempts must not leave partial files behind
        let staged: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(staged.len(), 1);
    }

    #[tokio::test]
    async fn test_download_exhausts_retries() {
        let dir = TempDir::new().unwrap();
        let tool = Arc::new(MockTool::new(info()).failing_fetches(u32::MAX));
        let extractor = YouTubeExtractor::new(tool.clone(), dir.path());

        let result = extractor.download(URL, &fast_options(dir.path(), 2)).await;

        assert!(!result.success);
        assert!(result.local_file_path.is_none());
        let error = result.error.unwrap();
        assert!(error.contains("after 2 attempts"), "{error}");
        assert_eq!(tool.fetch_count(), 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_output_is_a_failure() {
        let dir = TempDir::new().unwrap();
        let tool = Arc::new(MockTool::new(info()).without_output());
        let extractor = YouTubeExtractor::new(tool, dir.path());

        let result = extractor.download(URL, &fast_options(dir.path(), 1)).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("produced no file"));
    }

    #[tokio::test]
    async fn test_progress_callback_is_forwarded() {
        let dir = TempDir::new().unwrap();
        let extractor = YouTubeExtractor::new(Arc::new(MockTool::new(info())), dir.path());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let options = DownloadOptions::builder()
            .output_dir(dir.path())
            .progress(Arc::new(move |p: DownloadProgress| sink.lock().unwrap().push(p.percent)) as _)
            .build();

        assert!(extractor.download(URL, &options).await.success);
        assert_eq!(*seen.lock().unwrap(), vec![100.0]);
    }
}
