// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Concurrent first-use requests through the router
//!
//! N requests for the same unseen model arrive together while the load is
//! slow. All of them must succeed and the provider must be asked once.

use super::support::{app_with, embedding_request, send_json, StubProvider, API_KEY};
use axum::http::StatusCode;
use futures_util::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_requests_share_one_load() {
    let provider = Arc::new(StubProvider::new().with_load_delay(Duration::from_millis(100)));
    let (app, cache) = app_with(provider.clone());

    let requests = (0..16).map(|_| {
        let app = app.clone();
        tokio::spawn(async move {
            send_json(
                app,
                embedding_request(Some(API_KEY), r#"{"text": "hello", "model_name": "cold-model"}"#),
            )
            .await
        })
    });

    for result in join_all(requests).await {
        let (status, body) = result.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"embedding": [0.1, 0.2, 0.3]}));
    }

    assert_eq!(provider.load_count(), 1);
    assert!(cache.contains("cold-model").await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_for_different_models() {
    let provider = Arc::new(StubProvider::new().with_load_delay(Duration::from_millis(50)));
    let (app, cache) = app_with(provider.clone());

    let requests = (0..8).map(|i| {
        let app = app.clone();
        let body = json!({"text": "hello", "model_name": format!("model-{}", i % 4)}).to_string();
        tokio::spawn(async move { send_json(app, embedding_request(Some(API_KEY), &body)).await })
    });

    for result in join_all(requests).await {
        let (status, _) = result.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(provider.load_count(), 4);
    assert_eq!(
        cache.loaded_models().await,
        vec!["model-0", "model-1", "model-2", "model-3"]
    );
}
