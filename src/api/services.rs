use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use http_body_util::BodyExt;
use tracing::debug;

use super::{
    error::ApiError,
    models::{FossilAcceptedResponse, FossilRequest, FossilStatus, HealthResponse},
    state::AppState,
    utils::{parse_content_type, validate_body_size},
    validation::{decode_data, validate_request},
};

const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Fossil submission endpoint (POST /fossils)
///
/// Answers 202 once the record is in the batch log. The evidence shows up
/// under `GET /results/{data}` after the batch seals.
pub async fn submit_fossil(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    parse_content_type(content_type)?;

    // Decompression already handled by RequestDecompressionLayer
    let body_bytes = read_body(body).await?;
    let request: FossilRequest = serde_json::from_slice(&body_bytes)?;
    let fossil = validate_request(&request)?;

    let data_hex = hex::encode(&fossil.data);
    state.fossilizer.fossilize(fossil.data, fossil.meta).await?;
    debug!(data = %data_hex, "Fossil accepted");

    let response = FossilAcceptedResponse {
        data: data_hex,
        status: FossilStatus::Pending,
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

async fn read_body(body: axum::body::Body) -> Result<Vec<u8>, ApiError> {
    let data = body
        .collect()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .to_bytes()
        .to_vec();

    validate_body_size(&data, MAX_PAYLOAD_SIZE)?;
    Ok(data)
}

/// Result lookup (GET /results/{data})
pub async fn get_result(
    State(state): State<AppState>,
    Path(data_hex): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let data = decode_data(&data_hex)?;
    let result = state
        .results
        .get(&data)
        .ok_or_else(|| ApiError::NotFound(format!("result for {data_hex}")))?;

    Ok((StatusCode::OK, Json(result)))
}

/// Fossilizer identity (GET /info)
pub async fn get_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.fossilizer.get_info())
}

/// Health check (GET /health)
///
/// 503 until the scheduler loop is running.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let scheduler = if state.fossilizer.is_started() {
        "healthy"
    } else {
        "starting"
    };

    let mut components = BTreeMap::new();
    components.insert("api".to_string(), "healthy".to_string());
    components.insert("scheduler".to_string(), scheduler.to_string());

    let all_healthy = components.values().all(|status| status == "healthy");
    let (status, status_code) = if all_healthy {
        ("healthy", StatusCode::OK)
    } else {
        ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
    };

    let response = HealthResponse {
        status: status.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
        metrics: state.fossilizer.metrics(),
    };

    (status_code, Json(response))
}
