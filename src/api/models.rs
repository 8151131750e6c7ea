//! Request and response bodies of the HTTP API.
//!
//! Submitting a video:
//!
//! ```json
//! { "url": "https://youtu.be/dQw4w9WgXcQ", "quality": "high", "format": "mp4" }
//! ```
//!
//! Both `quality` and `format` are optional and fall back to the configured
//! downloader defaults. Listing accepts `platform`, `search`, `limit` and
//! `offset` query parameters; a search term takes precedence over the
//! platform filter.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::downloader::{Format, Platform, Quality};
use crate::library::VideoRecord;
use crate::observability::MetricsSnapshot;

#[derive(Debug, Deserialize, Clone)]
pub struct DownloadRequest {
    pub url: String,
    #[serde(default)]
    pub quality: Option<Quality>,
    #[serde(default)]
    pub format: Option<Format>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DownloadResponse {
    pub success: bool,
    pub video: VideoRecord,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct VideosQuery {
    pub platform: Option<Platform>,
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VideosResponse {
    pub videos: Vec<VideoRecord>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VideoResponse {
    pub video: VideoRecord,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
    pub videos: usize,
    pub metrics: MetricsSnapshot,
}
