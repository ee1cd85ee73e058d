// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding API Module
//!
//! POST /embedding: authenticates with the `API-KEY` header, resolves the
//! requested model through the model cache and returns its embedding.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{embedding_handler, API_KEY_HEADER};
pub use request::{EmbeddingRequest, ValidatedEmbeddingRequest};
pub use response::EmbeddingResponse;
