// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::embeddings::EmbeddingError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

/// Body of every client error response: `{"error": "..."}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    Unauthorized(String),
    InvalidRequest(String),
    ValidationError { field: String, message: String },
    /// Model load or inference failure
    Provider(EmbeddingError),
}

impl ApiError {
    pub fn invalid_api_key() -> Self {
        ApiError::Unauthorized("Invalid Api-Key header".to_string())
    }

    pub fn missing_parameter(field: &str) -> Self {
        ApiError::ValidationError {
            field: field.to_string(),
            message: format!("{} parameter is required", field),
        }
    }

    pub fn invalid_type(field: &str) -> Self {
        ApiError::ValidationError {
            field: field.to_string(),
            message: format!("{} must be a string", field),
        }
    }

    /// Client-facing message; `None` for server-side failures
    pub fn client_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized(msg) | ApiError::InvalidRequest(msg) => Some(msg),
            ApiError::ValidationError { message, .. } => Some(message),
            ApiError::Provider(_) => None,
        }
    }

    pub fn to_response(&self) -> Option<ErrorResponse> {
        self.client_message().map(|msg| ErrorResponse {
            error: msg.to_string(),
        })
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Unauthorized(_) => 401,
            ApiError::InvalidRequest(_) | ApiError::ValidationError { .. } => 400,
            ApiError::Provider(_) => 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<EmbeddingError> for ApiError {
    fn from(err: EmbeddingError) -> Self {
        ApiError::Provider(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match self.to_response() {
            Some(body) => (status, Json(body)).into_response(),
            None => {
                // Provider failures stay out of the response body
                error!("{}", self);
                (
                    status,
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    "Internal Server Error",
                )
                    .into_response()
            }
        }
    }
}
