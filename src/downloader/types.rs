use std::convert::Infallible;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};

/// Supported source platforms, derived purely from URL shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    Instagram,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::Instagram => "instagram",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Instagram => "Instagram",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "youtube" => Ok(Platform::YouTube),
            "instagram" => Ok(Platform::Instagram),
            other => Err(format!("unknown platform: {}", other)),
        }
    }
}

/// Container requested from the extraction tool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Mp4,
    Webm,
    Best,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Mp4 => "mp4",
            Format::Webm => "webm",
            Format::Best => "best",
        }
    }

    /// Container the tool merges into, which is also the staged file's extension.
    /// `Best` lands in mkv since any stream pair can be muxed into it.
    pub fn container(&self) -> &'static str {
        match self {
            Format::Mp4 => "mp4",
            Format::Webm => "webm",
            Format::Best => "mkv",
        }
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp4" => Ok(Format::Mp4),
            "webm" => Ok(Format::Webm),
            "best" => Ok(Format::Best),
            other => Err(format!("unknown format: {} (expected mp4, webm or best)", other)),
        }
    }
}

/// Quality tier. Unknown tiers are kept rather than rejected and fall back
/// to the plain "best mp4" selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Best,
    High,
    Medium,
    Low,
    #[serde(other)]
    Unrecognized,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Best => "best",
            Quality::High => "high",
            Quality::Medium => "medium",
            Quality::Low => "low",
            Quality::Unrecognized => "unrecognized",
        }
    }
}

impl FromStr for Quality {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "best" => Quality::Best,
            "high" => Quality::High,
            "medium" => Quality::Medium,
            "low" => Quality::Low,
            _ => Quality::Unrecognized,
        })
    }
}

/// Metadata for one remote video. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: Option<String>,
    pub uploader: Option<String>,
    /// `YYYYMMDD` as reported by the platform
    pub upload_date: Option<String>,
    pub duration_seconds: Option<u64>,
    pub thumbnail_url: Option<String>,
    pub canonical_id: String,
    pub platform: Platform,
}

/// Snapshot of an in-flight download
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DownloadProgress {
    pub percent: f64,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub bytes_per_second: u64,
    pub eta_seconds: u64,
}

pub type ProgressCallback = Arc<dyn Fn(DownloadProgress) + Send + Sync>;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(1000);

/// Per-call download settings
#[derive(Clone, Builder)]
pub struct DownloadOptions {
    /// Staging directory override; the downloader's own root when absent
    #[builder(into)]
    pub output_dir: Option<PathBuf>,
    #[builder(default)]
    pub format: Format,
    #[builder(default)]
    pub quality: Quality,
    #[builder(default = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,
    /// Backoff before retry `n` is `backoff_base * 2^n`
    #[builder(default = DEFAULT_BACKOFF_BASE)]
    pub backoff_base: Duration,
    /// Deadline for a single attempt; a breach counts as a failed attempt
    pub attempt_timeout: Option<Duration>,
    pub progress: Option<ProgressCallback>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for DownloadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadOptions")
            .field("output_dir", &self.output_dir)
            .field("format", &self.format)
            .field("quality", &self.quality)
            .field("max_retries", &self.max_retries)
            .field("backoff_base", &self.backoff_base)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Terminal outcome of one download call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_file_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadResult {
    pub fn success(
        local_file_path: PathBuf,
        file_name: String,
        file_size_bytes: u64,
        duration_seconds: Option<u64>,
    ) -> Self {
        Self {
            success: true,
            local_file_path: Some(local_file_path),
            file_name: Some(file_name),
            file_size_bytes: Some(file_size_bytes),
            duration_seconds,
            error: None,
        }
    }

    /// Failures never point at a staged file
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            local_file_path: None,
            file_name: None,
            file_size_bytes: None,
            duration_seconds: None,
            error: Some(error.into()),
        }
    }
}
