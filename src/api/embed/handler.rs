// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /embedding HTTP handler

use crate::api::embed::{EmbeddingRequest, EmbeddingResponse};
use crate::api::http_server::AppState;
use crate::api::ApiError;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName},
    Json,
};
use tracing::{debug, warn};

/// Header carrying the shared secret
pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("api-key");

/// POST /embedding handler
///
/// # Request
/// Header `API-KEY: <secret>` and body
/// ```json
/// {"text": "Hello world", "model_name": "all-MiniLM-L6-v2"}
/// ```
///
/// # Response
/// ```json
/// {"embedding": [0.1, 0.2, ...]}
/// ```
///
/// # Errors
/// - 401: `API-KEY` missing or wrong (checked before the body is read)
/// - 400: body not a JSON object, `text` / `model_name` missing, or either
///   field not a string
/// - 500: the model could not be loaded or failed during inference
///
/// The body is taken as raw bytes so authentication always runs first.
pub async fn embedding_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<EmbeddingResponse>, ApiError> {
    authenticate(&headers, &state.api_key)?;

    let request = EmbeddingRequest::from_slice(&body)?.validate().map_err(|e| {
        debug!("Rejected embedding request: {}", e);
        e
    })?;

    let model = state.model_cache.resolve(&request.model_name).await?;
    let response = EmbeddingResponse::from(model.encode(&request.text).await?);

    debug!(
        "Embedded {} chars with {} ({} dimensions)",
        request.text.len(),
        request.model_name,
        response.dimensions()
    );

    Ok(Json(response))
}

fn authenticate(headers: &HeaderMap, api_key: &str) -> Result<(), ApiError> {
    let provided = headers
        .get(&API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if key == api_key => Ok(()),
        Some(_) => {
            warn!("Rejected embedding request: API-KEY mismatch");
            Err(ApiError::invalid_api_key())
        }
        None => {
            warn!("Rejected embedding request: API-KEY header missing");
            Err(ApiError::invalid_api_key())
        }
    }
}
