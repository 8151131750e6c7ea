use thiserror::Error;

use super::models::{DownloadRequest, VideosQuery};
use crate::classifier::EMPTY_URL_ERROR;
use crate::config::LibraryConfig;
use crate::library::ListQuery;
use crate::pipeline::IngestRequest;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("{}", EMPTY_URL_ERROR)]
    MissingUrl,
    #[error("limit must be greater than 0")]
    ZeroLimit,
}

/// Turn a download body into a pipeline request
pub fn validate_download(request: DownloadRequest) -> Result<IngestRequest, RequestValidationError> {
    let url = request.url.trim();
    if url.is_empty() {
        return Err(RequestValidationError::MissingUrl);
    }

    Ok(IngestRequest {
        url: url.to_string(),
        quality: request.quality,
        format: request.format,
    })
}

/// Apply page defaults; limits above the configured maximum are clamped
pub fn resolve_list_query(
    query: VideosQuery,
    limits: &LibraryConfig,
) -> Result<ListQuery, RequestValidationError> {
    let limit = match query.limit {
        Some(0) => return Err(RequestValidationError::ZeroLimit),
        Some(limit) => limit.min(limits.max_page_size),
        None => limits.default_page_size,
    };

    Ok(ListQuery {
        platform: query.platform,
        search: query.search.filter(|s| !s.trim().is_empty()),
        limit,
        offset: query.offset.unwrap_or(0),
    })
}
