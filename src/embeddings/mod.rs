// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding models and the cache that owns them
//!
//! The HTTP layer never talks to a model backend directly. It asks the
//! [`ModelCache`] for a handle, and the cache asks an [`EmbeddingProvider`]
//! to load one on a miss. The production provider is [`HubProvider`]
//! (Hugging Face hub + ONNX Runtime); tests plug in stubs.

pub mod errors;
pub mod hub;
pub mod model_cache;
pub mod onnx_model;

pub use errors::EmbeddingError;
pub use hub::{HubProvider, HubProviderConfig};
pub use model_cache::ModelCache;
pub use onnx_model::{OnnxEmbeddingModel, PoolingStrategy};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Execution target a model is loaded onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    #[default]
    Cpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
        }
    }
}

/// A loaded, ready-to-infer model
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Produces the embedding vector for `text`
    async fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Name the model was loaded under
    fn model_name(&self) -> &str;
}

/// Shared handle to a loaded model
pub type ModelHandle = Arc<dyn EmbeddingModel>;

/// Source of model handles
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Loads the model named `model_name` onto `device`
    async fn load(&self, model_name: &str, device: Device) -> Result<ModelHandle, EmbeddingError>;
}
