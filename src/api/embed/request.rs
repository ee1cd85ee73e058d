// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! EmbeddingRequest type for POST /embedding
//!
//! Both fields are optional so that an absent or `null` field is reported
//! with its own message instead of a generic parse error.

use crate::api::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw request body for POST /embedding
///
/// # Example
/// ```json
/// {
///   "text": "Hello world",
///   "model_name": "all-MiniLM-L6-v2"
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Text to embed
    #[serde(default)]
    pub text: Option<String>,

    /// Model identifier passed to the provider
    #[serde(default)]
    pub model_name: Option<String>,
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEmbeddingRequest {
    pub text: String,
    pub model_name: String,
}

impl EmbeddingRequest {
    /// Parses a raw body
    ///
    /// A body that is not a JSON object is an invalid request. A field
    /// holding anything but a string or `null` is rejected by name, `text`
    /// first.
    pub fn from_slice(body: &[u8]) -> Result<Self, ApiError> {
        let mut object: Map<String, Value> = serde_json::from_slice(body).map_err(|_| {
            ApiError::InvalidRequest("request body must be a JSON object".to_string())
        })?;

        Ok(Self {
            text: string_field(&mut object, "text")?,
            model_name: string_field(&mut object, "model_name")?,
        })
    }

    /// Checks required fields in order: `text`, then `model_name`
    pub fn validate(self) -> Result<ValidatedEmbeddingRequest, ApiError> {
        let text = self.text.ok_or_else(|| ApiError::missing_parameter("text"))?;
        let model_name = self
            .model_name
            .ok_or_else(|| ApiError::missing_parameter("model_name"))?;

        Ok(ValidatedEmbeddingRequest { text, model_name })
    }
}

fn string_field(object: &mut Map<String, Value>, field: &str) -> Result<Option<String>, ApiError> {
    match object.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(ApiError::invalid_type(field)),
    }
}
