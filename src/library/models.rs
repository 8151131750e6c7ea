use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::downloader::{Platform, Quality};

/// One stored video, embedding the metadata it was ingested with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    /// UUIDv7, so lexical order is creation order
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub platform: Platform,
    pub original_url: String,
    pub normalized_url: String,
    /// Platform identifier (canonical id)
    pub video_id: String,
    pub file_url: Option<String>,
    pub storage_key: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub thumbnail_url: Option<String>,
    pub thumbnail_key: Option<String>,
    pub duration: Option<u64>,
    pub uploader: Option<String>,
    pub upload_date: Option<String>,
    pub download_quality: Quality,
    pub created_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Case-insensitive substring match over title, description and uploader.
    /// `needle` must already be lowercase.
    pub fn matches_search(&self, needle: &str) -> bool {
        [
            Some(self.title.as_str()),
            self.description.as_deref(),
            self.uploader.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Listing filter. A search term takes precedence over the platform filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub platform: Option<Platform>,
    pub search: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl ListQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub(crate) fn matches(&self, record: &VideoRecord) -> bool {
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => record.matches_search(&term.to_lowercase()),
            None => self.platform.is_none_or(|p| p == record.platform),
        }
    }
}

/// A page of records plus the number of records matching the query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoPage {
    pub videos: Vec<VideoRecord>,
    pub total: usize,
}
