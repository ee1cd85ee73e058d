// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the embedding service

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "embedding-endpoint",
    "api-key-auth",
    "lazy-model-cache",
    "single-flight-model-load",
    "hf-hub-models",
    "onnx-cpu-inference",
    "model-preload",
];

/// Full version string with feature list
pub fn version_string() -> String {
    format!("v{} [{}]", VERSION_NUMBER, FEATURES.join(", "))
}
