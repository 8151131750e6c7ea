use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "CLIPSTASH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/clipstash.toml";
const ENV_PREFIX: &str = "CLIPSTASH";
const ENV_SEPARATOR: &str = "__";

/// Defaults, then the TOML file, then `.env` and process environment
pub fn load() -> Result<Config, ConfigError> {
    // A missing .env is normal
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);

    Ok(config)
}

/// Secrets are never read from TOML, only from the environment
fn load_secrets(config: &mut Config) {
    config.storage.access_key = first_env(&["S3_ACCESS_KEY", "AWS_ACCESS_KEY_ID"]);
    config.storage.secret_key = first_env(&["S3_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"]);
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| env::var(name).ok().filter(|value| !value.is_empty()))
}

/// File at `config_path` (optional) overlaid with `CLIPSTASH__*` variables
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // CLIPSTASH__DOWNLOADER__MAX_RETRIES -> downloader.max_retries
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageProvider;
    use crate::downloader::{Format, Quality};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.storage.bucket, "videos");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"
library_path = "/var/lib/clipstash/library"
max_payload_bytes = "16KB"
max_concurrent_downloads = 2

[downloader]
staging_dir = "/tmp/clipstash"
format = "webm"
quality = "medium"
max_retries = 5
backoff_base_ms = 250

[storage]
provider = "s3"
bucket = "shorts"
region = "us-east-1"
max_upload_bytes = "1GB"

[library]
default_page_size = 20
max_page_size = 100
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.server.max_payload_bytes.as_u64(), 16 * 1024);
        assert_eq!(config.server.max_concurrent_downloads, 2);
        assert_eq!(config.downloader.format, Format::Webm);
        assert_eq!(config.downloader.quality, Quality::Medium);
        assert_eq!(config.downloader.max_retries, 5);
        assert_eq!(config.downloader.backoff_base_ms, 250);
        assert_eq!(config.storage.provider, StorageProvider::S3);
        assert_eq!(config.storage.region.as_deref(), Some("us-east-1"));
        assert_eq!(config.storage.max_upload_bytes.as_u64(), 1024 * 1024 * 1024);
        assert_eq!(config.library.default_page_size, 20);
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[server\nbind_addr = ").unwrap();

        assert!(load_from_sources(config_path).is_err());
    }
}
