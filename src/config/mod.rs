// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server configuration
//!
//! Every option can be given as a flag or an environment variable. `main`
//! loads a `.env` file before parsing, so a local `.env` works too.

use crate::embeddings::HubProviderConfig;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

/// Text embedding HTTP service
#[derive(Parser, Clone)]
#[command(name = "aiapi")]
#[command(version)]
#[command(about = "Serves text embeddings over HTTP", long_about = None)]
pub struct ServerConfig {
    /// Shared secret expected in the API-KEY header
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Hugging Face cache directory for downloaded models
    #[arg(long, env = "MODELS_CACHE_DIR")]
    pub models_cache_dir: Option<PathBuf>,

    /// Hugging Face access token for gated or private models
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    /// ONNX Runtime intra-op threads per model
    #[arg(long, env = "ONNX_INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,

    /// Comma-separated models to load before accepting traffic
    #[arg(long, env = "PRELOAD_MODELS", value_delimiter = ',')]
    pub preload_models: Vec<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("api_key", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("models_cache_dir", &self.models_cache_dir)
            .field("hf_token", &self.hf_token.as_ref().map(|_| "<redacted>"))
            .field("intra_threads", &self.intra_threads)
            .field("preload_models", &self.preload_models)
            .finish()
    }
}

impl ServerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            bail!("API_KEY environment variable must be set");
        }
        if self.intra_threads == 0 {
            bail!("ONNX_INTRA_THREADS must be greater than 0");
        }
        if self.preload_models.iter().any(|m| m.trim().is_empty()) {
            bail!("PRELOAD_MODELS contains an empty model name");
        }
        Ok(())
    }

    /// Resolves `host:port` to a socket address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .context(format!("Invalid bind address {}:{}", self.host, self.port))?
            .next()
            .context(format!("No address found for {}", self.host))
    }

    pub fn hub_provider_config(&self) -> HubProviderConfig {
        HubProviderConfig {
            cache_dir: self.models_cache_dir.clone(),
            token: self.hf_token.clone(),
            intra_threads: self.intra_threads,
        }
    }
}
