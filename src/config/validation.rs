use super::models::{Config, StorageProvider};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("downloader.max_retries must be at least 1")]
    ZeroRetries,

    #[error("downloader.backoff_base_ms must be positive")]
    ZeroBackoff,

    #[error("downloader.attempt_timeout_secs must be positive when set")]
    ZeroAttemptTimeout,

    #[error("server.max_concurrent_downloads must be at least 1")]
    ZeroConcurrency,

    #[error("Storage bucket name must not be empty")]
    EmptyBucket,

    #[error("Storage provider is S3 but missing credentials (access_key or secret_key)")]
    MissingS3Credentials,

    #[error("Page sizes must be positive: {field} = 0")]
    ZeroPageSize { field: &'static str },

    #[error("library.default_page_size ({default}) exceeds library.max_page_size ({max})")]
    PageSizeExceedsMax { default: usize, max: usize },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_downloader(config)?;
    validate_server(config)?;
    validate_storage(config)?;
    validate_library(config)?;
    Ok(())
}

fn validate_downloader(config: &Config) -> Result<(), ValidationError> {
    let downloader = &config.downloader;

    if downloader.max_retries == 0 {
        return Err(ValidationError::ZeroRetries);
    }
    if downloader.backoff_base_ms == 0 {
        return Err(ValidationError::ZeroBackoff);
    }
    if downloader.attempt_timeout_secs == Some(0) {
        return Err(ValidationError::ZeroAttemptTimeout);
    }

    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.max_concurrent_downloads == 0 {
        return Err(ValidationError::ZeroConcurrency);
    }
    Ok(())
}

/// Bucket must be named; S3 additionally needs credentials from the environment
fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.bucket.trim().is_empty() {
        return Err(ValidationError::EmptyBucket);
    }

    if config.storage.provider == StorageProvider::S3
        && (config.storage.access_key.is_none() || config.storage.secret_key.is_none())
    {
        return Err(ValidationError::MissingS3Credentials);
    }

    Ok(())
}

fn validate_library(config: &Config) -> Result<(), ValidationError> {
    let library = &config.library;

    if library.default_page_size == 0 {
        return Err(ValidationError::ZeroPageSize {
            field: "default_page_size",
        });
    }
    if library.max_page_size == 0 {
        return Err(ValidationError::ZeroPageSize {
            field: "max_page_size",
        });
    }
    if library.default_page_size > library.max_page_size {
        return Err(ValidationError::PageSizeExceedsMax {
            default: library.default_page_size,
            max: library.max_page_size,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_retries() {
        let mut config = Config::default();
        config.downloader.max_retries = 0;
        assert!(matches!(validate(&config), Err(ValidationError::ZeroRetries)));
    }

    #[test]
    fn test_zero_backoff() {
        let mut config = Config::default();
        config.downloader.backoff_base_ms = 0;
        assert!(matches!(validate(&config), Err(ValidationError::ZeroBackoff)));
    }

    #[test]
    fn test_zero_attempt_timeout() {
        let mut config = Config::default();
        config.downloader.attempt_timeout_secs = Some(0);
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroAttemptTimeout)
        ));
    }

    #[test]
    fn test_zero_concurrency() {
        let mut config = Config::default();
        config.server.max_concurrent_downloads = 0;
        assert!(matches!(validate(&config), Err(ValidationError::ZeroConcurrency)));
    }

    #[test]
    fn test_empty_bucket() {
        let mut config = Config::default();
        config.storage.bucket = "  ".to_string();
        assert!(matches!(validate(&config), Err(ValidationError::EmptyBucket)));
    }

    #[test]
    fn test_s3_credentials_missing() {
        let mut config = Config::default();
        config.storage.provider = StorageProvider::S3;
        config.storage.access_key = Some("key".to_string());

        assert!(matches!(
            validate(&config),
            Err(ValidationError::MissingS3Credentials)
        ));

        config.storage.secret_key = Some("secret".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_page_sizes() {
        let mut config = Config::default();
        config.library.default_page_size = 500;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::PageSizeExceedsMax { default: 500, max: 200 })
        ));

        config.library.default_page_size = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroPageSize { field: "default_page_size" })
        ));
    }
}
