// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Shared helpers for API tests: a stub provider and request builders

use aiapi::api::http_server::{create_app, AppState};
use aiapi::embeddings::{
    Device, EmbeddingError, EmbeddingModel, EmbeddingProvider, ModelCache, ModelHandle,
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // for `oneshot`

pub const API_KEY: &str = "secret";
pub const STUB_VECTOR: [f32; 3] = [0.1, 0.2, 0.3];

/// Model that returns the same vector for any input
pub struct FixedVectorModel {
    name: String,
}

#[async_trait]
impl EmbeddingModel for FixedVectorModel {
    async fn encode(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(STUB_VECTOR.to_vec())
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

/// Provider that counts loads and can simulate slow or failing loads
#[derive(Default)]
pub struct StubProvider {
    loads: AtomicUsize,
    load_delay: Option<Duration>,
    failing_model: Option<String>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    pub fn failing_on(mut self, model_name: &str) -> Self {
        self.failing_model = Some(model_name.to_string());
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StubProvider {
    async fn load(&self, model_name: &str, _device: Device) -> Result<ModelHandle, EmbeddingError> {
        self.loads.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_model.as_deref() == Some(model_name) {
            return Err(EmbeddingError::Load {
                model: model_name.to_string(),
                reason: "Repository not found".to_string(),
            });
        }

        Ok(Arc::new(FixedVectorModel {
            name: model_name.to_string(),
        }))
    }
}

/// Builds the app around `provider`, returning the cache for inspection
pub fn app_with(provider: Arc<StubProvider>) -> (Router, Arc<ModelCache>) {
    let cache = Arc::new(ModelCache::new(provider));
    let app = create_app(AppState::new(API_KEY, cache.clone()));
    (app, cache)
}

pub fn embedding_request(api_key: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/embedding")
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("API-KEY", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Sends `request` and returns the status and raw body
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

/// Sends `request` and parses the body as JSON
pub async fn send_json(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    let json = serde_json::from_slice(&body)
        .unwrap_or_else(|e| panic!("Body is not JSON ({}): {:?}", e, String::from_utf8_lossy(&body)));
    (status, json)
}
