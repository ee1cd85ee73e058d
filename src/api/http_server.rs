// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    routing::{get, post},
    Router,
};
use std::{future::Future, net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{embedding_handler, health_handler};
use crate::embeddings::ModelCache;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Secret the `API-KEY` header must match
    pub api_key: Arc<str>,
    pub model_cache: Arc<ModelCache>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("model_cache", &self.model_cache)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(api_key: impl Into<String>, model_cache: Arc<ModelCache>) -> Self {
        Self {
            api_key: Arc::from(api_key.into()),
            model_cache,
        }
    }
}

/// Builds the router: POST /embedding and GET /healthz
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/embedding", post(embedding_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the app on `addr` until `shutdown` resolves
pub async fn start_server<F>(addr: SocketAddr, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("API server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
