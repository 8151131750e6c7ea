use std::collections::HashMap;

use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use http_body_util::BodyExt;
use tracing::{info, warn};

use super::{
    models::{
        DeleteResponse, DownloadRequest, DownloadResponse, HealthResponse, VideoResponse,
        VideosQuery, VideosResponse,
    },
    state::AppState,
    validation::{RequestValidationError, resolve_list_query, validate_download},
};
use crate::api::error::ApiError;
use crate::storage::content_type_for;

/// Download a video into the library (POST /api/download)
///
/// Blocks until the video is stored and recorded. Failures are reported with
/// the pipeline's message; a URL already in the library answers 409.
pub async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    super::utils::require_json(&headers)?;

    let limit = state.config.server.max_payload_bytes.as_u64() as usize;
    let body_bytes = read_body(body, limit).await?;

    let request: DownloadRequest = serde_json::from_slice(&body_bytes)?;
    let request = validate_download(request).map_err(map_validation_error)?;

    info!(url = %request.url, "Download requested");
    let video = state.pipeline.ingest(request).await?;

    Ok((
        StatusCode::OK,
        Json(DownloadResponse {
            success: true,
            video,
        }),
    ))
}

/// Library listing (GET /api/videos)
pub async fn list_videos(
    State(state): State<AppState>,
    query: Result<Query<VideosQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::InvalidPayload(e.body_text()))?;
    let query =
        resolve_list_query(query, &state.config.library).map_err(map_validation_error)?;

    let page = state.pipeline.library().list(&query)?;

    Ok(Json(VideosResponse {
        videos: page.videos,
        total: page.total,
    }))
}

/// Single record (GET /api/videos/{id})
pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let video = state
        .pipeline
        .library()
        .get(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("video {id}")))?;

    Ok(Json(VideoResponse { video }))
}

/// Remove a record and its stored files (DELETE /api/videos/{id})
pub async fn delete_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.pipeline.remove(&id).await?;
    Ok(Json(DeleteResponse { success: true }))
}

/// Stored blob (GET /files/{bucket}/{*key})
///
/// Serves local and in-memory deployments, where the public URL of an object
/// points back at this server.
pub async fn serve_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let storage = state.pipeline.storage();
    let key = path
        .strip_prefix(&format!("{}/", storage.bucket))
        .unwrap_or(&path);

    if key.split('/').any(|segment| segment == "..") {
        return Err(ApiError::NotFound(format!("file {key}")));
    }

    let object = storage.open(key).await?;
    let size = object.meta.size;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(content_type_for(key)),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(size)),
        ],
        Body::from_stream(object.into_stream()),
    ))
}

/// Health check (GET /health)
///
/// Reports the library and storage components plus in-process counters.
/// Answers 503 when the library cannot be read.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = HashMap::new();
    components.insert("api".to_string(), "healthy".to_string());
    components.insert("storage".to_string(), "healthy".to_string());

    let videos = match state.pipeline.library().count(None) {
        Ok(count) => {
            components.insert("library".to_string(), "healthy".to_string());
            count
        }
        Err(e) => {
            warn!(error = %e, "Library health check failed");
            components.insert("library".to_string(), "unhealthy".to_string());
            0
        }
    };

    let all_healthy = components.values().all(|status| status == "healthy");
    let (overall_status, status_code) = if all_healthy {
        ("healthy", StatusCode::OK)
    } else {
        ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
    };

    let response = HealthResponse {
        status: overall_status.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
        videos,
        metrics: state.metrics.snapshot(),
    };

    (status_code, Json(response))
}

fn map_validation_error(err: RequestValidationError) -> ApiError {
    match err {
        RequestValidationError::MissingUrl => ApiError::InvalidUrl(err.to_string()),
        RequestValidationError::ZeroLimit => ApiError::InvalidPayload(err.to_string()),
    }
}

/// Reads the request body, rejecting anything over `limit` bytes.
///
/// Decompression is handled by `RequestDecompressionLayer`, so the limit
/// applies to decoded bytes.
async fn read_body(body: Body, limit: usize) -> Result<Vec<u8>, ApiError> {
    let data = body
        .collect()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .to_bytes()
        .to_vec();

    super::utils::check_body_size(&data, limit)?;

    Ok(data)
}
