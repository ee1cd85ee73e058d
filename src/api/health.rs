// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! GET /healthz liveness handler

use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub o: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self { o: "k".to_string() }
    }
}

/// Always answers 200 `{"o": "k"}`; no dependencies are checked
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}
