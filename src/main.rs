// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use aiapi::{
    api::http_server::{shutdown_signal, start_server, AppState},
    config::ServerConfig,
    embeddings::{HubProvider, ModelCache},
    version,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, sync::Arc};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    // Exits with a usage error when API_KEY is absent
    let config = ServerConfig::parse();
    config.validate()?;

    info!("Starting embedding service {}", version::version_string());
    info!("Configuration: {:?}", config);

    let provider = HubProvider::new(config.hub_provider_config())?;
    let model_cache = Arc::new(ModelCache::new(Arc::new(provider)));

    for model_name in &config.preload_models {
        info!("Preloading model {}", model_name);
        model_cache
            .resolve(model_name)
            .await
            .context(format!("Failed to preload model {}", model_name))?;
    }

    let state = AppState::new(config.api_key.clone(), model_cache);
    let addr = config.bind_addr()?;

    start_server(addr, state, shutdown_signal()).await
}
