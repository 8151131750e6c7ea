//! Ingest pipeline: download, upload, record, with compensation on failure
//!
//! Order of operations for one URL:
//! 1. classify and reject invalid URLs
//! 2. reject URLs already in the library (normalized form)
//! 3. look up metadata
//! 4. stage the media locally through the orchestrator
//! 5. upload the staged file; on failure the staged file is still removed
//! 6. mirror the thumbnail, best-effort
//! 7. remove the staged file
//! 8. insert the record; on failure the uploaded blobs are deleted
//!
//! Cleanup steps are advisory. Their failures are logged and never replace
//! the primary outcome.

pub mod http;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::classifier;
use crate::downloader::staging::delete_file;
use crate::downloader::{ExtractError, Format, Platform, Quality, VideoDownloader, VideoMetadata};
use crate::library::{LibraryError, VideoRecord, VideoRepository};
use crate::observability::Metrics;
use crate::storage::{AssetKind, StorageClient, StorageError, StoredObject, storage_path};

pub use http::{FetchError, HttpClient, HttpConfig};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    InvalidUrl(String),

    #[error("Video already exists: {0}")]
    Duplicate(String),

    #[error("Failed to fetch video metadata: {0}")]
    Metadata(#[source] ExtractError),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Upload failed: {0}")]
    Upload(#[source] StorageError),

    #[error("Failed to save video record: {0}")]
    Persistence(#[source] LibraryError),

    #[error("Video not found: {0}")]
    NotFound(String),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Source of thumbnail bytes
#[async_trait]
pub trait ThumbnailFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<Bytes, FetchError>;
}

#[async_trait]
impl ThumbnailFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> std::result::Result<Bytes, FetchError> {
        HttpClient::fetch(self, url).await
    }
}

/// Per-request overrides of the configured download options
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub url: String,
    pub quality: Option<Quality>,
    pub format: Option<Format>,
}

impl IngestRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

pub struct IngestPipeline {
    downloader: Arc<VideoDownloader>,
    storage: StorageClient,
    library: Arc<dyn VideoRepository>,
    thumbnails: Option<Arc<dyn ThumbnailFetcher>>,
    metrics: Arc<Metrics>,
}

impl IngestPipeline {
    pub fn new(
        downloader: Arc<VideoDownloader>,
        storage: StorageClient,
        library: Arc<dyn VideoRepository>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            downloader,
            storage,
            library,
            thumbnails: None,
            metrics,
        }
    }

    /// Mirror remote thumbnails into storage
    pub fn with_thumbnails(mut self, fetcher: Arc<dyn ThumbnailFetcher>) -> Self {
        self.thumbnails = Some(fetcher);
        self
    }

    pub fn library(&self) -> &Arc<dyn VideoRepository> {
        &self.library
    }

    pub fn storage(&self) -> &StorageClient {
        &self.storage
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub async fn ingest(&self, request: IngestRequest) -> Result<VideoRecord> {
        let outcome = self.run(&request).await;

        match &outcome {
            Ok(record) => {
                self.metrics.video_ingested();
                info!(id = %record.id, url = %record.normalized_url, "Video ingested");
            }
            Err(IngestError::Duplicate(url)) => {
                self.metrics.duplicate_rejected();
                info!(url = %url, "Rejected duplicate submission");
            }
            Err(e) => {
                self.metrics.ingest_failed();
                warn!(url = %request.url, error = %e, "Ingest failed");
            }
        }

        outcome
    }

    async fn run(&self, request: &IngestRequest) -> Result<VideoRecord> {
        let url = request.url.trim();

        let classification = classifier::classify(url);
        let Some((platform, video_id)) = classification.target() else {
            return Err(IngestError::InvalidUrl(
                classification.error.clone().unwrap_or_default(),
            ));
        };

        let normalized_url = classifier::normalize(url);
        if self.library.exists_by_url(&normalized_url)? {
            return Err(IngestError::Duplicate(normalized_url));
        }

        let metadata = self
            .downloader
            .get_metadata(url)
            .await
            .map_err(IngestError::Metadata)?;

        let mut options = self.downloader.default_options();
        if let Some(quality) = request.quality {
            options.quality = quality;
        }
        if let Some(format) = request.format {
            options.format = format;
        }
        let quality = options.quality;

        let result = self.downloader.download(url, options).await;
        let (Some(local_path), Some(file_name)) = (result.local_file_path, result.file_name) else {
            return Err(IngestError::Download(
                result
                    .error
                    .unwrap_or_else(|| "download produced no file".to_string()),
            ));
        };

        let today = Utc::now().date_naive();
        let file_name = self
            .free_file_name(platform, today, AssetKind::Video, file_name)
            .await;
        let key = storage_path(platform, today, AssetKind::Video, &file_name);
        let video = match self.storage.upload_file(&local_path, &key).await {
            Ok(stored) => stored,
            Err(e) => {
                delete_file(&local_path).await;
                return Err(IngestError::Upload(e));
            }
        };

        let thumbnail = self.mirror_thumbnail(&metadata, &file_name, today).await;
        delete_file(&local_path).await;

        let record = VideoRecord {
            id: uuid::Uuid::now_v7().to_string(),
            title: metadata.title,
            description: metadata.description,
            platform,
            original_url: url.to_string(),
            normalized_url,
            video_id: video_id.to_string(),
            file_url: Some(video.url.clone()),
            storage_key: Some(video.key.clone()),
            file_name: Some(file_name),
            file_size: Some(video.size),
            thumbnail_url: thumbnail
                .as_ref()
                .map(|t| t.url.clone())
                .or(metadata.thumbnail_url),
            thumbnail_key: thumbnail.as_ref().map(|t| t.key.clone()),
            duration: metadata.duration_seconds.or(result.duration_seconds),
            uploader: metadata.uploader,
            upload_date: metadata.upload_date,
            download_quality: quality,
            created_at: Utc::now(),
        };

        if let Err(e) = self.library.insert(&record) {
            self.metrics.rollback();
            warn!(id = %record.id, error = %e, "Record insert failed, removing uploaded blobs");
            self.storage.delete(&video.key).await;
            if let Some(thumbnail) = &thumbnail {
                self.storage.delete(&thumbnail.key).await;
            }
            return Err(match e {
                LibraryError::DuplicateUrl(url) => IngestError::Duplicate(url),
                other => IngestError::Persistence(other),
            });
        }

        Ok(record)
    }

    /// Staged names are only unique within the staging directory. Blob keys
    /// are per day, so a name already taken that day gets a short id suffix.
    async fn free_file_name(
        &self,
        platform: Platform,
        date: NaiveDate,
        kind: AssetKind,
        file_name: String,
    ) -> String {
        let key = storage_path(platform, date, kind, &file_name);
        if let Ok(false) = self.storage.exists(&key).await {
            return file_name;
        }

        let suffix = uuid::Uuid::now_v7().simple().to_string();
        let suffix = &suffix[suffix.len() - 8..];
        match file_name.rsplit_once('.') {
            Some((stem, ext)) => format!("{stem}_{suffix}.{ext}"),
            None => format!("{file_name}_{suffix}"),
        }
    }

    /// Copy the remote thumbnail next to the video. `None` keeps the remote URL.
    async fn mirror_thumbnail(
        &self,
        metadata: &VideoMetadata,
        video_file_name: &str,
        date: NaiveDate,
    ) -> Option<StoredObject> {
        let fetcher = self.thumbnails.as_ref()?;
        let remote = metadata.thumbnail_url.as_deref()?;

        let bytes = match fetcher.fetch(remote).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(url = remote, error = %e, "Thumbnail fetch failed, keeping remote URL");
                return None;
            }
        };

        let stem = Path::new(video_file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("thumbnail");
        let name = format!("{}.{}", stem, thumbnail_extension(remote));
        // videos of one title in different formats share a stem
        let name = self
            .free_file_name(metadata.platform, date, AssetKind::Thumbnail, name)
            .await;
        let key = storage_path(metadata.platform, date, AssetKind::Thumbnail, &name);

        match self.storage.upload_bytes(&key, bytes).await {
            Ok(stored) => Some(stored),
            Err(e) => {
                warn!(key = %key, error = %e, "Thumbnail upload failed, keeping remote URL");
                None
            }
        }
    }

    /// Delete a record and, best-effort, its blobs
    pub async fn remove(&self, id: &str) -> Result<VideoRecord> {
        let record = self
            .library
            .get(id)?
            .ok_or_else(|| IngestError::NotFound(id.to_string()))?;

        let video_key = record
            .storage_key
            .clone()
            .or_else(|| record.file_url.as_deref().and_then(|u| self.storage.key_from_url(u)));
        for key in [video_key, record.thumbnail_key.clone()].into_iter().flatten() {
            if !self.storage.delete(&key).await {
                warn!(id, key = %key, "Blob already gone or not deletable");
            }
        }

        if !self.library.delete(id)? {
            return Err(IngestError::NotFound(id.to_string()));
        }

        self.metrics.video_deleted();
        info!(id, "Video removed");
        Ok(record)
    }
}

/// Image extension from a thumbnail URL path, `jpg` when unknown
fn thumbnail_extension(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "png",
        "webp" => "webp",
        _ => "jpg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::{DownloadOptions, MockTool, ProbeInfo};
    use crate::library::{FjallLibrary, ListQuery, VideoPage};
    use std::time::Duration;
    use tempfile::TempDir;

    const URL: &str = "https://youtu.be/dQw4w9WgXcQ?si=abc";

    struct Fixture {
        pipeline: IngestPipeline,
        tool: Arc<MockTool>,
        staging: std::path::PathBuf,
        _temp: TempDir,
    }

    fn probe() -> ProbeInfo {
        ProbeInfo {
            id: "dQw4w9WgXcQ".to_string(),
            title: Some("Never Gonna Give You Up".to_string()),
            uploader: Some("Rick Astley".to_string()),
            duration_seconds: Some(212.0),
            thumbnail: Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.webp?x=1".to_string()),
            ..Default::default()
        }
    }

    fn fixture_with(tool: MockTool, library: Option<Arc<dyn VideoRepository>>) -> Fixture {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("staging");
        let tool = Arc::new(tool);

        let defaults = DownloadOptions::builder()
            .output_dir(&staging)
            .max_retries(2)
            .backoff_base(Duration::from_millis(1))
            .build();
        let downloader = VideoDownloader::new(&staging, tool.clone()).with_defaults(defaults);
        let library = library.unwrap_or_else(|| {
            Arc::new(FjallLibrary::open(temp.path().join("library")).unwrap())
        });

        let pipeline = IngestPipeline::new(
            Arc::new(downloader),
            StorageClient::in_memory(),
            library,
            Arc::new(Metrics::new()),
        );

        Fixture {
            pipeline,
            tool,
            staging,
            _temp: temp,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockTool::new(probe()), None)
    }

    fn staged_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    struct FakeThumbnails;

    #[async_trait]
    impl ThumbnailFetcher for FakeThumbnails {
        async fn fetch(&self, _url: &str) -> std::result::Result<Bytes, FetchError> {
            Ok(Bytes::from_static(b"webp"))
        }
    }

    struct BrokenThumbnails;

    #[async_trait]
    impl ThumbnailFetcher for BrokenThumbnails {
        async fn fetch(&self, _url: &str) -> std::result::Result<Bytes, FetchError> {
            Err(FetchError::Timeout)
        }
    }

    /// Library that accepts reads but refuses every insert
    struct ReadOnlyLibrary;

    impl VideoRepository for ReadOnlyLibrary {
        fn insert(&self, _record: &VideoRecord) -> crate::library::Result<()> {
            Err(LibraryError::Io(std::io::Error::other("disk full")))
        }

        fn get(&self, _id: &str) -> crate::library::Result<Option<VideoRecord>> {
            Ok(None)
        }

        fn delete(&self, _id: &str) -> crate::library::Result<bool> {
            Ok(false)
        }

        fn exists_by_url(&self, _url: &str) -> crate::library::Result<bool> {
            Ok(false)
        }

        fn list(&self, _query: &ListQuery) -> crate::library::Result<VideoPage> {
            Ok(VideoPage {
                videos: Vec::new(),
                total: 0,
            })
        }

        fn count(&self, _platform: Option<crate::downloader::Platform>) -> crate::library::Result<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_ingest_happy_path() {
        let f = fixture();

        let record = f.pipeline.ingest(IngestRequest::new(URL)).await.unwrap();

        assert_eq!(record.title, "Never Gonna Give You Up");
        assert_eq!(record.video_id, "dQw4w9WgXcQ");
        assert_eq!(record.normalized_url, "https://www.youtube.com/shorts/dQw4w9WgXcQ");
        assert_eq!(record.original_url, URL);
        assert_eq!(record.duration, Some(212));
        assert_eq!(record.file_size, Some(16));

        let key = record.storage_key.clone().unwrap();
        assert!(key.starts_with("youtube/"));
        assert!(key.ends_with("/video/Never_Gonna_Give_You_Up.mp4"));
        assert_eq!(record.file_url, Some(f.pipeline.storage().public_url(&key)));
        assert!(f.pipeline.storage().exists(&key).await.unwrap());

        // without a fetcher the remote thumbnail is kept
        assert_eq!(record.thumbnail_url, probe().thumbnail);
        assert!(record.thumbnail_key.is_none());

        assert_eq!(staged_files(&f.staging), 0);
        assert!(f.pipeline.library().get(&record.id).unwrap().is_some());
        assert_eq!(f.pipeline.metrics().snapshot().videos_ingested, 1);
    }

    #[tokio::test]
    async fn test_ingest_applies_overrides() {
        let f = fixture();
        let request = IngestRequest {
            url: URL.to_string(),
            quality: Some(Quality::Low),
            format: Some(Format::Webm),
        };

        let record = f.pipeline.ingest(request).await.unwrap();
        assert_eq!(record.download_quality, Quality::Low);
        assert!(record.file_name.unwrap().ends_with(".webm"));
    }

    #[tokio::test]
    async fn test_same_title_gets_its_own_blob() {
        let f = fixture();

        let first = f.pipeline.ingest(IngestRequest::new(URL)).await.unwrap();
        let second = f
            .pipeline
            .ingest(IngestRequest::new("https://youtu.be/aaaaaaaaaa1"))
            .await
            .unwrap();

        let first_key = first.storage_key.unwrap();
        let second_key = second.storage_key.unwrap();
        assert_ne!(first_key, second_key);
        assert!(second.file_name.unwrap().starts_with("Never_Gonna_Give_You_Up_"));
        assert!(f.pipeline.storage().exists(&first_key).await.unwrap());
        assert!(f.pipeline.storage().exists(&second_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_thumbnails_of_same_stem_do_not_collide() {
        let f = fixture();
        let pipeline = f.pipeline.with_thumbnails(Arc::new(FakeThumbnails));

        let first = pipeline.ingest(IngestRequest::new(URL)).await.unwrap();
        let second = pipeline
            .ingest(IngestRequest {
                format: Some(Format::Webm),
                ..IngestRequest::new("https://youtu.be/aaaaaaaaaa1")
            })
            .await
            .unwrap();

        // distinct extensions leave both video names free
        assert_eq!(first.file_name.as_deref(), Some("Never_Gonna_Give_You_Up.mp4"));
        assert_eq!(second.file_name.as_deref(), Some("Never_Gonna_Give_You_Up.webm"));

        let first_thumb = first.thumbnail_key.clone().unwrap();
        let second_thumb = second.thumbnail_key.clone().unwrap();
        assert_ne!(first_thumb, second_thumb);

        pipeline.remove(&first.id).await.unwrap();
        assert!(!pipeline.storage().exists(&first_thumb).await.unwrap());
        assert!(pipeline.storage().exists(&second_thumb).await.unwrap());
        assert!(pipeline.storage().exists(&second.storage_key.unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_early() {
        let f = fixture();

        let err = f
            .pipeline
            .ingest(IngestRequest::new("youtube.com/shorts/dQw4w9WgXcQ"))
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::InvalidUrl(ref m) if m == classifier::MISSING_SCHEME_ERROR));
        assert_eq!(f.tool.probe_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_is_rejected_before_download() {
        let f = fixture();
        f.pipeline.ingest(IngestRequest::new(URL)).await.unwrap();

        let err = f
            .pipeline
            .ingest(IngestRequest::new("https://www.youtube.com/shorts/dQw4w9WgXcQ"))
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Duplicate(_)));
        assert_eq!(f.tool.fetch_count(), 1);
        assert_eq!(f.pipeline.metrics().snapshot().duplicates_rejected, 1);
    }

    #[tokio::test]
    async fn test_metadata_failure() {
        let f = fixture_with(MockTool::new(probe()).failing_probe(), None);

        let err = f.pipeline.ingest(IngestRequest::new(URL)).await.unwrap_err();
        assert!(matches!(err, IngestError::Metadata(_)));
        assert_eq!(f.tool.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_download_failure_surfaces_message() {
        let f = fixture_with(MockTool::new(probe()).failing_fetches(u32::MAX), None);

        let err = f.pipeline.ingest(IngestRequest::new(URL)).await.unwrap_err();
        match err {
            IngestError::Download(message) => assert!(message.contains("after 2 attempts")),
            other => panic!("expected download failure, got {other:?}"),
        }
        assert_eq!(staged_files(&f.staging), 0);
        assert_eq!(f.pipeline.metrics().snapshot().ingest_failed, 1);
    }

    #[tokio::test]
    async fn test_instagram_gap_is_a_download_failure() {
        let f = fixture();

        let err = f
            .pipeline
            .ingest(IngestRequest::new("https://www.instagram.com/reel/C1a2B3c4D5e/"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Download(ref m) if m.contains("Instagram")));
    }

    #[tokio::test]
    async fn test_upload_failure_cleans_staging() {
        let mut f = fixture_with(MockTool::new(probe()).with_payload(vec![1u8; 4096]), None);
        f.pipeline.storage = StorageClient::in_memory().with_max_upload_bytes(1024);

        let err = f.pipeline.ingest(IngestRequest::new(URL)).await.unwrap_err();
        assert!(matches!(err, IngestError::Upload(StorageError::TooLarge { .. })));
        assert_eq!(staged_files(&f.staging), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_rolls_back_blobs() {
        let f = fixture_with(MockTool::new(probe()), Some(Arc::new(ReadOnlyLibrary)));
        let pipeline = f.pipeline.with_thumbnails(Arc::new(FakeThumbnails));

        let err = pipeline.ingest(IngestRequest::new(URL)).await.unwrap_err();
        assert!(matches!(err, IngestError::Persistence(_)));

        let today = Utc::now().date_naive();
        let video_key = storage_path(
            crate::downloader::Platform::YouTube,
            today,
            AssetKind::Video,
            "Never_Gonna_Give_You_Up.mp4",
        );
        let thumb_key = storage_path(
            crate::downloader::Platform::YouTube,
            today,
            AssetKind::Thumbnail,
            "Never_Gonna_Give_You_Up.webp",
        );
        assert!(!pipeline.storage().exists(&video_key).await.unwrap());
        assert!(!pipeline.storage().exists(&thumb_key).await.unwrap());
        assert_eq!(pipeline.metrics().snapshot().rollbacks, 1);
        assert_eq!(staged_files(&f.staging), 0);
    }

    #[tokio::test]
    async fn test_thumbnail_is_mirrored() {
        let f = fixture();
        let pipeline = f.pipeline.with_thumbnails(Arc::new(FakeThumbnails));

        let record = pipeline.ingest(IngestRequest::new(URL)).await.unwrap();

        let key = record.thumbnail_key.clone().unwrap();
        assert!(key.ends_with("/thumbnail/Never_Gonna_Give_You_Up.webp"));
        assert_eq!(record.thumbnail_url, Some(pipeline.storage().public_url(&key)));
        assert_eq!(pipeline.storage().get(&key).await.unwrap().as_ref(), b"webp");
    }

    #[tokio::test]
    async fn test_thumbnail_failure_keeps_remote_url() {
        let f = fixture();
        let pipeline = f.pipeline.with_thumbnails(Arc::new(BrokenThumbnails));

        let record = pipeline.ingest(IngestRequest::new(URL)).await.unwrap();
        assert_eq!(record.thumbnail_url, probe().thumbnail);
        assert!(record.thumbnail_key.is_none());
    }

    #[tokio::test]
    async fn test_remove_deletes_record_and_blob() {
        let f = fixture();
        let record = f.pipeline.ingest(IngestRequest::new(URL)).await.unwrap();
        let key = record.storage_key.clone().unwrap();

        let removed = f.pipeline.remove(&record.id).await.unwrap();
        assert_eq!(removed.id, record.id);
        assert!(!f.pipeline.storage().exists(&key).await.unwrap());
        assert!(f.pipeline.library().get(&record.id).unwrap().is_none());
        assert!(!f.pipeline.library().exists_by_url(URL).unwrap());

        assert!(matches!(
            f.pipeline.remove(&record.id).await,
            Err(IngestError::NotFound(_))
        ));
    }

    #[test]
    fn test_thumbnail_extension() {
        assert_eq!(thumbnail_extension("https://i.ytimg.com/vi/x/hq.webp?x=1"), "webp");
        assert_eq!(thumbnail_extension("https://i.ytimg.com/vi/x/hq.PNG"), "png");
        assert_eq!(thumbnail_extension("https://i.ytimg.com/vi/x/hqdefault"), "jpg");
    }
}
