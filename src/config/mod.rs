//! Settings for the server, downloader, blob store and library
//!
//! Values are resolved in layers, later ones winning: struct defaults, the
//! TOML file, a `.env` file, then process environment. The file is
//! `config/clipstash.toml` unless `CLIPSTASH_CONFIG` points elsewhere, and a
//! missing file is not an error.
//!
//! ```no_run
//! use clipstash::config::Config;
//!
//! let config = Config::load()?;
//! println!("library at {}", config.server.library_path.display());
//! # Ok::<(), clipstash::config::ConfigError>(())
//! ```
//!
//! Environment keys use a double underscore between section and field, for
//! example `CLIPSTASH__DOWNLOADER__MAX_RETRIES=5` or
//! `CLIPSTASH__STORAGE__MAX_UPLOAD_BYTES=1GB`.
//!
//! S3 credentials never come from the file: `S3_ACCESS_KEY` / `S3_SECRET_KEY`,
//! with `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` as fallback.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    Config, DownloaderConfig, LibraryConfig, ServerConfig, StorageConfig, StorageProvider,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Resolve every layer and validate the result
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Same as [`Config::load`] with an explicit file and no `.env` or secrets
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
