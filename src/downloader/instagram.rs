use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use super::retry::{RetryPolicy, retry};
use super::staging::{ensure_dir, generate_unique_file_name};
use super::traits::{ExtractError, Extractor};
use super::types::{DownloadOptions, DownloadResult, Platform, VideoMetadata};
use super::youtube::failure_result;

pub const DOWNLOAD_UNSUPPORTED: &str = "Instagram download is not implemented: \
     direct media retrieval from Instagram requires authentication and is not supported yet";

/// Unanchored `/reel/{id}` then `/p/{id}`, so trailing path segments are tolerated
static ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"/reel/([a-zA-Z0-9_-]+)", r"/p/([a-zA-Z0-9_-]+)"]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
});

fn placeholder_id(url: &str) -> String {
    ID_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(url))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Instagram Reels extractor.
///
/// Media retrieval is a known capability gap. Metadata is a placeholder built
/// from the reel id and every download fails without touching the network.
pub struct InstagramExtractor {
    default_output_dir: PathBuf,
}

impl InstagramExtractor {
    pub fn new(default_output_dir: impl Into<PathBuf>) -> Self {
        Self {
            default_output_dir: default_output_dir.into(),
        }
    }

    /// Local preparation only; always ends at the capability gap
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
        debug!(file_name = %file_name, "No retrieval available for Instagram reel");

        Err(ExtractError::Unsupported(DOWNLOAD_UNSUPPORTED.to_string()))
    }
}

#[async_trait]
impl Extractor for InstagramExtractor {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn get_metadata(&self, url: &str) -> Result<VideoMetadata, ExtractError> {
        let id = placeholder_id(url);

        Ok(VideoMetadata {
            title: format!("Instagram_Reel_{}", id),
            description: None,
            uploader: None,
            upload_date: None,
            duration_seconds: None,
            thumbnail_url: None,
            canonical_id: id,
            platform: Platform::Instagram,
        })
    }

    async fn download(&self, url: &str, options: &DownloadOptions) -> DownloadResult {
        let output_dir = options
            .output_dir
            .clone()
            .unwrap_or_else(|| self.default_output_dir.clone());
        let policy = RetryPolicy::new(options.max_retries, options.backoff_base);

        let outcome = retry(policy, |attempt| {
            debug!(url, attempt, "Instagram download attempt");
            self.attempt(url, &output_dir, options)
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(failure) => {
                let result = failure_result(failure);
                warn!(url, error = ?result.error, "Instagram download failed");
                result
            }
        }
    }
}
