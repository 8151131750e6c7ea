//! URL classification for supported short-form video platforms
//!
//! Pure functions only: [`classify`] decides which platform a URL belongs to
//! and pulls out the platform's identifier, [`normalize`] rewrites a
//! recognized URL into the one canonical form used as a deduplication key.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::downloader::Platform;

static YOUTUBE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^https?://(?:www\.|m\.)?youtube\.com/shorts/([a-zA-Z0-9_-]{11})(?:\?.*)?$",
        r"^https?://youtu\.be/([a-zA-Z0-9_-]{11})(?:\?.*)?$",
    ])
});

static INSTAGRAM_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^https?://(?:www\.)?instagram\.com/reel/([a-zA-Z0-9_-]+)/?(?:\?.*)?$",
        r"^https?://(?:www\.)?instagram\.com/p/([a-zA-Z0-9_-]+)/?(?:\?.*)?$",
    ])
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
}

fn patterns_for(platform: Platform) -> &'static [Regex] {
    match platform {
        Platform::YouTube => &YOUTUBE_PATTERNS,
        Platform::Instagram => &INSTAGRAM_PATTERNS,
    }
}

/// Outcome of [`classify`]. Valid results always carry a platform and id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClassificationResult {
    fn valid(platform: Platform, canonical_id: String) -> Self {
        Self {
            is_valid: true,
            platform: Some(platform),
            canonical_id: Some(canonical_id),
            error: None,
        }
    }

    fn invalid(platform: Option<Platform>, error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            platform,
            canonical_id: None,
            error: Some(error.into()),
        }
    }

    /// Platform and id of a valid result
    pub fn target(&self) -> Option<(Platform, &str)> {
        match (self.is_valid, self.platform, self.canonical_id.as_deref()) {
            (true, Some(platform), Some(id)) => Some((platform, id)),
            _ => None,
        }
    }
}

pub const EMPTY_URL_ERROR: &str = "URL must not be empty";
pub const MISSING_SCHEME_ERROR: &str = "URL must start with http:// or https://";
pub const UNSUPPORTED_URL_ERROR: &str =
    "Unsupported URL format: expected a YouTube Shorts or Instagram Reels URL";

/// Detect the platform of a URL by shape alone. YouTube is checked first.
pub fn detect_platform(url: &str) -> Option<Platform> {
    let url = url.trim();
    [Platform::YouTube, Platform::Instagram]
        .into_iter()
        .find(|platform| patterns_for(*platform).iter().any(|re| re.is_match(url)))
}

/// Extract the platform identifier, first matching pattern wins
pub fn extract_id(platform: Platform, url: &str) -> Option<String> {
    let url = url.trim();
    patterns_for(platform)
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn classify(url: &str) -> ClassificationResult {
    let url = url.trim();

    if url.is_empty() {
        return ClassificationResult::invalid(None, EMPTY_URL_ERROR);
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return ClassificationResult::invalid(None, MISSING_SCHEME_ERROR);
    }

    let Some(platform) = detect_platform(url) else {
        return ClassificationResult::invalid(None, UNSUPPORTED_URL_ERROR);
    };

    match extract_id(platform, url) {
        Some(id) => ClassificationResult::valid(platform, id),
        None => ClassificationResult::invalid(
            Some(platform),
            format!("Could not extract {} video id from URL", platform.display_name()),
        ),
    }
}

/// Rewrite a recognized URL into its canonical form. Unrecognized input is
/// returned trimmed but otherwise untouched, which keeps this idempotent.
pub fn normalize(url: &str) -> String {
    let url = url.trim();

    let Some(platform) = detect_platform(url) else {
        return url.to_string();
    };

    match (platform, extract_id(platform, url)) {
        (Platform::YouTube, Some(id)) => format!("https://www.youtube.com/shorts/{}", id),
        (Platform::Instagram, Some(id)) => format!("https://www.instagram.com/reel/{}/", id),
        (_, None) => url.to_string(),
    }
}
