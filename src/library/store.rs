use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{debug, info};

use crate::classifier;

use super::VideoRepository;
use super::error::{LibraryError, Result};
use super::models::{ListQuery, VideoPage, VideoRecord};
use super::partitions::{URLS_PARTITION, VIDEOS_PARTITION, encode_url_key, encode_video_key};

/// Fjall-backed video library: records plus a normalized URL index
#[derive(Clone)]
pub struct FjallLibrary {
    keyspace: Keyspace,
    videos: PartitionHandle,
    urls: PartitionHandle,
    /// Serializes the URL index check with the batch that claims it
    write_lock: Arc<Mutex<()>>,
}

impl FjallLibrary {
    /// Open or create a library at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening video library at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let videos = keyspace.open_partition(VIDEOS_PARTITION, PartitionCreateOptions::default())?;
        let urls = keyspace.open_partition(URLS_PARTITION, PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            videos,
            urls,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        // the guarded unit carries no state, so a poisoned lock is still usable
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Records newest first
    fn scan(&self) -> impl Iterator<Item = Result<VideoRecord>> + '_ {
        self.videos.iter().rev().map(|item| {
            let (_, value) = item?;
            Ok(serde_json::from_slice::<VideoRecord>(&value)?)
        })
    }
}

impl VideoRepository for FjallLibrary {
    fn insert(&self, record: &VideoRecord) -> Result<()> {
        let url_key = encode_url_key(&record.normalized_url);
        let _guard = self.write_guard();
        if self.urls.contains_key(&url_key)? {
            return Err(LibraryError::DuplicateUrl(record.normalized_url.clone()));
        }

        let value = serde_json::to_vec(record)?;
        let mut batch = self.keyspace.batch();
        batch.insert(&self.videos, encode_video_key(&record.id), value);
        batch.insert(&self.urls, url_key, record.id.as_bytes());
        batch.commit()?;

        debug!(id = %record.id, url = %record.normalized_url, "Inserted video record");
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<VideoRecord>> {
        match self.videos.get(encode_video_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.write_guard();
        let Some(record) = self.get(id)? else {
            return Ok(false);
        };

        let mut batch = self.keyspace.batch();
        batch.remove(&self.videos, encode_video_key(id));
        batch.remove(&self.urls, encode_url_key(&record.normalized_url));
        batch.commit()?;

        debug!(id, "Deleted video record");
        Ok(true)
    }

    fn exists_by_url(&self, url: &str) -> Result<bool> {
        let normalized = classifier::normalize(url);
        Ok(self.urls.contains_key(encode_url_key(&normalized))?)
    }

    fn list(&self, query: &ListQuery) -> Result<VideoPage> {
        let mut videos = Vec::new();
        let mut total = 0;

        for record in self.scan() {
            let record = record?;
            if !query.matches(&record) {
                continue;
            }
            if total >= query.offset && videos.len() < query.limit {
                videos.push(record);
            }
            total += 1;
        }

        Ok(VideoPage { videos, total })
    }

    fn count(&self, platform: Option<crate::downloader::Platform>) -> Result<usize> {
        let query = ListQuery {
            platform,
            ..ListQuery::default()
        };

        let mut total = 0;
        for record in self.scan() {
            if query.matches(&record?) {
                total += 1;
            }
        }
        Ok(total)
    }
}
