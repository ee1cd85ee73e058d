// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for embedding model loading and inference

use thiserror::Error;

/// Errors raised by embedding providers and loaded models
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    /// Provider could not resolve or load the named model
    #[error("Failed to load model '{model}': {reason}")]
    Load { model: String, reason: String },

    /// A loaded model failed to produce an embedding
    #[error("Inference failed for model '{model}': {reason}")]
    Inference { model: String, reason: String },

    /// A blocking task panicked or was cancelled
    #[error("Embedding task failed: {0}")]
    TaskFailed(String),
}

impl EmbeddingError {
    pub fn load(model: impl Into<String>, err: anyhow::Error) -> Self {
        EmbeddingError::Load {
            model: model.into(),
            reason: format!("{:#}", err),
        }
    }

    pub fn inference(model: impl Into<String>, err: anyhow::Error) -> Self {
        EmbeddingError::Inference {
            model: model.into(),
            reason: format!("{:#}", err),
        }
    }
}

impl From<tokio::task::JoinError> for EmbeddingError {
    fn from(err: tokio::task::JoinError) -> Self {
        EmbeddingError::TaskFailed(err.to_string())
    }
}
