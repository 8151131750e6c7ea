//! Download orchestration: platform extractors, retry, local staging

pub mod instagram;
pub mod mock;
pub mod orchestrator;
pub mod retry;
pub mod staging;
pub mod traits;
pub mod types;
pub mod youtube;
pub mod ytdlp;

pub use instagram::InstagramExtractor;
pub use mock::MockTool;
pub use orchestrator::{PlatformExtractor, VideoDownloader};
pub use retry::{RetryFailure, RetryPolicy};
pub use staging::StagingError;
pub use traits::{ExtractError, Extractor, FetchRequest, MediaTool, ProbeInfo};
pub use types::{
    DownloadOptions, DownloadProgress, DownloadResult, Format, Platform, ProgressCallback,
    Quality, VideoMetadata,
};
pub use youtube::YouTubeExtractor;
pub use ytdlp::YtDlp;
