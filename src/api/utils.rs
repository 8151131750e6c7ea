//! Stateless request helpers shared by the handlers

use axum::http::{HeaderMap, header::CONTENT_TYPE};

use crate::api::error::ApiError;

/// Require an `application/json` body, charset parameter allowed.
///
/// `application/jsonp`, `text/json` and `+json` suffix types are rejected.
pub fn require_json(headers: &HeaderMap) -> Result<mime::Mime, ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;

    let media_type: mime::Mime = content_type
        .parse()
        .map_err(|_| ApiError::InvalidPayload(format!("invalid Content-Type: {content_type}")))?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

pub fn check_body_size(data: &[u8], limit: usize) -> Result<(), ApiError> {
    if data.len() > limit {
        return Err(ApiError::PayloadTooLarge(data.len()));
    }
    Ok(())
}
