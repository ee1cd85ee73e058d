// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! EmbeddingResponse type for POST /embedding

use serde::{Deserialize, Serialize};

/// Response body for POST /embedding
///
/// # Example
/// ```json
/// {
///   "embedding": [0.1, 0.2, 0.3]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// Embedding vector; length depends on the model
    pub embedding: Vec<f32>,
}

impl From<Vec<f32>> for EmbeddingResponse {
    fn from(embedding: Vec<f32>) -> Self {
        Self { embedding }
    }
}

impl EmbeddingResponse {
    pub fn dimensions(&self) -> usize {
        self.embedding.len()
    }
}
