//! Fjall-based persistence for the video library
//!
//! Each ingested video becomes one [`VideoRecord`] keyed by a UUIDv7 id, plus
//! an index entry from its normalized URL so duplicate submissions can be
//! rejected before anything is downloaded.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use clipstash::library::{FjallLibrary, ListQuery, VideoRepository};
//!
//! let library = FjallLibrary::open("data/library")?;
//! library.insert(&record)?;
//! let page = library.list(&ListQuery::new(50))?;
//! ```

pub mod error;
pub mod models;
pub mod partitions;
pub mod store;

pub use error::{LibraryError, Result};
pub use models::{ListQuery, VideoPage, VideoRecord};
pub use store::FjallLibrary;

use crate::downloader::Platform;

/// Record persistence used by the ingest pipeline and the API
pub trait VideoRepository: Send + Sync {
    /// Write a record and its URL index entry
    fn insert(&self, record: &VideoRecord) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<VideoRecord>>;

    /// Remove a record and its index entry. Returns whether it existed.
    fn delete(&self, id: &str) -> Result<bool>;

    /// Whether a record exists for the normalized form of `url`
    fn exists_by_url(&self, url: &str) -> Result<bool>;

    /// Newest first, filtered and paged by `query`
    fn list(&self, query: &ListQuery) -> Result<VideoPage>;

    fn count(&self, platform: Option<Platform>) -> Result<usize>;
}
