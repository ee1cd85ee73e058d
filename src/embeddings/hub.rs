// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Hugging Face hub embedding provider
//!
//! Resolves a model identifier the way sentence-transformers does:
//! - an existing local directory is used as-is
//! - a bare name (no `/`) means `sentence-transformers/<name>`
//! - anything else is a hub repo id (`org/model`)
//!
//! The repo must carry an ONNX export (`onnx/model.onnx` or `model.onnx`)
//! and a `tokenizer.json`. The sentence-transformers side files are read
//! when present:
//! - `modules.json`: a `Normalize` module turns on L2 normalization
//! - `1_Pooling/config.json`: CLS vs mean pooling
//! - `sentence_bert_config.json`: `max_seq_length` for truncation

use crate::embeddings::onnx_model::{OnnxEmbeddingModel, OnnxModelOptions, PoolingStrategy};
use crate::embeddings::{Device, EmbeddingError, EmbeddingProvider, ModelHandle};
use anyhow::{Context, Result};
use async_trait::async_trait;
use hf_hub::api::tokio::{Api, ApiBuilder};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_ORGANIZATION: &str = "sentence-transformers";
const ONNX_CANDIDATES: &[&str] = &["onnx/model.onnx", "model.onnx"];
const TOKENIZER_FILE: &str = "tokenizer.json";
const MODULES_FILE: &str = "modules.json";
const POOLING_CONFIG_FILE: &str = "1_Pooling/config.json";
const SBERT_CONFIG_FILE: &str = "sentence_bert_config.json";

/// Configuration for [`HubProvider`]
#[derive(Debug, Clone)]
pub struct HubProviderConfig {
    /// Hub cache directory; `None` uses the hf-hub default
    pub cache_dir: Option<PathBuf>,
    /// Access token for gated or private repos
    pub token: Option<String>,
    pub intra_threads: usize,
}

impl Default for HubProviderConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            token: None,
            intra_threads: 4,
        }
    }
}

/// Where a model's files come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Local(PathBuf),
    Hub(String),
}

impl ModelSource {
    /// Maps a model identifier to its source
    pub fn resolve(identifier: &str) -> Self {
        let path = Path::new(identifier);
        if path.is_dir() {
            return ModelSource::Local(path.to_path_buf());
        }

        if identifier.contains('/') {
            ModelSource::Hub(identifier.to_string())
        } else {
            ModelSource::Hub(format!("{}/{}", DEFAULT_ORGANIZATION, identifier))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModuleEntry {
    #[serde(rename = "type", default)]
    module_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PoolingConfig {
    pooling_mode_cls_token: bool,
    pooling_mode_mean_tokens: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SbertConfig {
    max_seq_length: Option<usize>,
}

/// Provider that fetches ONNX sentence-transformer exports from the hub
#[derive(Clone)]
pub struct HubProvider {
    api: Api,
    config: HubProviderConfig,
}

impl std::fmt::Debug for HubProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubProvider")
            .field("cache_dir", &self.config.cache_dir)
            .field("intra_threads", &self.config.intra_threads)
            .finish_non_exhaustive()
    }
}

impl HubProvider {
    pub fn new(config: HubProviderConfig) -> Result<Self> {
        let mut builder = ApiBuilder::new()
            .with_progress(false)
            .with_token(config.token.clone());
        if let Some(dir) = &config.cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }

        let api = builder.build().context("Failed to initialize Hugging Face hub client")?;

        Ok(Self { api, config })
    }

    async fn fetch(&self, source: &ModelSource, file: &str) -> Result<PathBuf> {
        match source {
            ModelSource::Local(dir) => {
                let path = dir.join(file);
                if !path.exists() {
                    anyhow::bail!("{} not found in {}", file, dir.display());
                }
                Ok(path)
            }
            ModelSource::Hub(repo_id) => self
                .api
                .model(repo_id.clone())
                .get(file)
                .await
                .context(format!("Failed to fetch {} from {}", file, repo_id)),
        }
    }

    async fn fetch_optional(&self, source: &ModelSource, file: &str) -> Option<PathBuf> {
        match self.fetch(source, file).await {
            Ok(path) => Some(path),
            Err(e) => {
                debug!("Optional file {} unavailable: {:#}", file, e);
                None
            }
        }
    }

    async fn fetch_onnx(&self, source: &ModelSource) -> Result<PathBuf> {
        let mut last_err = None;
        for candidate in ONNX_CANDIDATES {
            match self.fetch(source, candidate).await {
                Ok(path) => return Ok(path),
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err
            .unwrap_or_else(|| anyhow::anyhow!("No ONNX candidates configured"))
            .context("Model has no ONNX export"))
    }

    async fn model_options(&self, source: &ModelSource) -> OnnxModelOptions {
        let mut options = OnnxModelOptions {
            intra_threads: self.config.intra_threads,
            ..Default::default()
        };

        if let Some(path) = self.fetch_optional(source, MODULES_FILE).await {
            if let Some(modules) = read_json::<Vec<ModuleEntry>>(&path) {
                options.normalize = modules
                    .iter()
                    .any(|m| m.module_type.ends_with("Normalize"));
            }
        }

        if let Some(path) = self.fetch_optional(source, POOLING_CONFIG_FILE).await {
            if let Some(pooling) = read_json::<PoolingConfig>(&path) {
                options.pooling = pooling_strategy(&pooling);
            }
        }

        if let Some(path) = self.fetch_optional(source, SBERT_CONFIG_FILE).await {
            if let Some(max_len) = read_json::<SbertConfig>(&path).and_then(|c| c.max_seq_length) {
                options.max_length = max_len;
            }
        }

        options
    }

    async fn load_model(&self, model_name: &str) -> Result<OnnxEmbeddingModel> {
        let source = ModelSource::resolve(model_name);
        info!("Resolving embedding model {} from {:?}", model_name, source);

        let tokenizer_path = self.fetch(&source, TOKENIZER_FILE).await?;
        let model_path = self.fetch_onnx(&source).await?;
        let options = self.model_options(&source).await;

        let name = model_name.to_string();
        tokio::task::spawn_blocking(move || {
            OnnxEmbeddingModel::load(name, model_path, tokenizer_path, options)
        })
        .await
        .context("Model loading task failed")?
    }
}

#[async_trait]
impl EmbeddingProvider for HubProvider {
    async fn load(&self, model_name: &str, device: Device) -> Result<ModelHandle, EmbeddingError> {
        debug!("Loading {} on {}", model_name, device);

        let model = self
            .load_model(model_name)
            .await
            .map_err(|e| EmbeddingError::load(model_name, e))?;

        info!("{} ready ({} dimensions)", model_name, model.dimension());
        Ok(Arc::new(model))
    }
}

fn pooling_strategy(config: &PoolingConfig) -> PoolingStrategy {
    if config.pooling_mode_cls_token && !config.pooling_mode_mean_tokens {
        PoolingStrategy::Cls
    } else {
        PoolingStrategy::Mean
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Ignoring unparsable {}: {}", path.display(), e);
            None
        }
    }
}
