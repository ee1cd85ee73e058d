// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX Embedding Model Wrapper
//!
//! Runs a sentence-transformer ONNX export on the CPU execution provider.
//!
//! Features:
//! - ONNX model loading from disk
//! - BERT-style tokenization with truncation to the model's max sequence length
//! - Feeds only the inputs the graph declares (`token_type_ids` is optional)
//! - Mean or CLS pooling over token embeddings, weighted by the attention mask
//! - Optional L2 normalization
//! - Output dimension read from the model at load time

use crate::embeddings::{EmbeddingError, EmbeddingModel};
use anyhow::{Context, Result};
use async_trait::async_trait;
use ndarray::{Array2, ArrayView2, ArrayViewD, Axis, Ix2};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

/// How token embeddings are reduced to a single sentence vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolingStrategy {
    /// Average of token embeddings, ignoring padding
    #[default]
    Mean,
    /// Embedding of the first ([CLS]) token
    Cls,
}

/// Load-time options for [`OnnxEmbeddingModel`]
#[derive(Debug, Clone)]
pub struct OnnxModelOptions {
    pub pooling: PoolingStrategy,
    pub normalize: bool,
    /// Token limit; longer inputs are truncated
    pub max_length: usize,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
}

impl Default for OnnxModelOptions {
    fn default() -> Self {
        Self {
            pooling: PoolingStrategy::Mean,
            normalize: false,
            max_length: 256,
            intra_threads: 4,
        }
    }
}

/// Graph inputs a sentence-transformer export may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ModelInputs {
    token_type_ids: bool,
}

impl ModelInputs {
    /// Checks the declared input names against what the tokenizer can feed
    ///
    /// BERT exports take `input_ids`, `attention_mask` and `token_type_ids`;
    /// MPNet, DistilBERT and RoBERTa exports omit `token_type_ids`.
    fn from_names(names: &[&str]) -> Result<Self> {
        let mut input_ids = false;
        let mut attention_mask = false;
        let mut token_type_ids = false;

        for name in names {
            match *name {
                "input_ids" => input_ids = true,
                "attention_mask" => attention_mask = true,
                "token_type_ids" => token_type_ids = true,
                other => anyhow::bail!("Unsupported model input: {}", other),
            }
        }

        if !input_ids || !attention_mask {
            anyhow::bail!(
                "Model must take input_ids and attention_mask, found {:?}",
                names
            );
        }

        Ok(Self { token_type_ids })
    }
}

/// Token ids for one text, as i64 for the ONNX graph
#[derive(Debug, Clone, PartialEq, Eq)]
struct EncodedText {
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
    token_type_ids: Vec<i64>,
}

/// ONNX-based sentence embedding model
///
/// The session is behind `Arc<Mutex>`: ONNX Runtime needs exclusive access
/// per run, and clones are cheap so a clone can be moved into a blocking task.
#[derive(Clone)]
pub struct OnnxEmbeddingModel {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    inputs: ModelInputs,
    model_name: String,
    dimension: usize,
    options: OnnxModelOptions,
}

impl std::fmt::Debug for OnnxEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingModel")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl OnnxEmbeddingModel {
    /// Loads a model from an ONNX file and a tokenizer JSON file
    ///
    /// This is blocking (session construction and a validation inference);
    /// call it from `spawn_blocking` inside async code.
    ///
    /// # Errors
    /// Returns error if:
    /// - Model or tokenizer file not found or invalid
    /// - ONNX Runtime initialization fails
    /// - Model declares inputs other than `input_ids`, `attention_mask`
    ///   and `token_type_ids`
    /// - Model output is not `[batch, seq_len, hidden]`
    pub fn load<P: AsRef<Path>>(
        model_name: impl Into<String>,
        model_path: P,
        tokenizer_path: P,
        options: OnnxModelOptions,
    ) -> Result<Self> {
        let model_name = model_name.into();
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("ONNX model file not found: {}", model_path.display());
        }
        if !tokenizer_path.exists() {
            anyhow::bail!("Tokenizer file not found: {}", tokenizer_path.display());
        }

        info!("Initializing ONNX session for {} (CPU)", model_name);

        let mut session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(options.intra_threads)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load ONNX model from {}",
                model_path.display()
            ))?;

        let input_names: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
        let inputs = ModelInputs::from_names(&input_names)?;
        debug!("{} declares inputs {:?}", model_name, input_names);

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: options.max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {}", e))?;

        // One sample run fixes the output dimension up front
        let sample = encode_text(&tokenizer, "validation test")?;
        let dimension = run_session(&mut session, inputs, sample, |output| {
            let shape = output.shape();
            if shape.len() != 3 || shape[2] == 0 {
                anyhow::bail!(
                    "Model outputs unexpected dimensions: {:?} (expected [batch, seq_len, hidden])",
                    shape
                );
            }
            Ok(shape[2])
        })?;

        info!(
            "ONNX embedding model {} loaded ({} dimensions, {:?} pooling, normalize={})",
            model_name, dimension, options.pooling, options.normalize
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            inputs,
            model_name,
            dimension,
            options,
        })
    }

    /// Generates the embedding for one text (blocking)
    pub fn embed_blocking(&self, text: &str) -> Result<Vec<f32>> {
        let encoded = encode_text(&self.tokenizer, text)?;
        let mask = encoded.attention_mask.clone();

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("ONNX session lock poisoned"))?;

        let pooling = self.options.pooling;
        let mut embedding = run_session(&mut session, self.inputs, encoded, |output| {
            // [batch, seq_len, hidden] -> [seq_len, hidden]
            let tokens = output
                .index_axis(Axis(0), 0)
                .into_dimensionality::<Ix2>()
                .context("Unexpected output tensor rank")?;
            Ok(pool(tokens, &mask, pooling))
        })?;
        drop(session);

        if self.options.normalize {
            l2_normalize(&mut embedding);
        }

        if embedding.len() != self.dimension {
            anyhow::bail!(
                "Unexpected embedding dimension: {} (expected {})",
                embedding.len(),
                self.dimension
            );
        }

        debug!(
            "Embedded {} tokens with {}",
            mask.iter().filter(|&&m| m != 0).count(),
            self.model_name
        );

        Ok(embedding)
    }

    /// Returns the output dimension of this model
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl EmbeddingModel for OnnxEmbeddingModel {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let model = self.clone();
        let text = text.to_string();

        tokio::task::spawn_blocking(move || model.embed_blocking(&text))
            .await?
            .map_err(|e| EmbeddingError::inference(self.model_name.clone(), e))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

fn encode_text(tokenizer: &Tokenizer, text: &str) -> Result<EncodedText> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

    let to_i64 = |values: &[u32]| values.iter().map(|&v| v as i64).collect::<Vec<_>>();

    Ok(EncodedText {
        input_ids: to_i64(encoding.get_ids()),
        attention_mask: to_i64(encoding.get_attention_mask()),
        token_type_ids: to_i64(encoding.get_type_ids()),
    })
}

/// Runs one single-item batch and hands the first output tensor to `f`
fn run_session<T>(
    session: &mut Session,
    inputs: ModelInputs,
    encoded: EncodedText,
    f: impl FnOnce(ArrayViewD<'_, f32>) -> Result<T>,
) -> Result<T> {
    let seq_len = encoded.input_ids.len();

    let input_ids_array = Array2::from_shape_vec((1, seq_len), encoded.input_ids)
        .context("Failed to create input_ids array")?;
    let attention_mask_array = Array2::from_shape_vec((1, seq_len), encoded.attention_mask)
        .context("Failed to create attention_mask array")?;

    let outputs = if inputs.token_type_ids {
        let token_type_ids_array = Array2::from_shape_vec((1, seq_len), encoded.token_type_ids)
            .context("Failed to create token_type_ids array")?;
        session.run(ort::inputs![
            "input_ids" => Value::from_array(input_ids_array)?,
            "attention_mask" => Value::from_array(attention_mask_array)?,
            "token_type_ids" => Value::from_array(token_type_ids_array)?
        ])?
    } else {
        session.run(ort::inputs![
            "input_ids" => Value::from_array(input_ids_array)?,
            "attention_mask" => Value::from_array(attention_mask_array)?
        ])?
    };

    // Index rather than name: exports disagree on the output name
    let output = outputs[0]
        .try_extract_array::<f32>()
        .context("Failed to extract output tensor")?;

    f(output)
}

/// Reduces `[seq_len, hidden]` token embeddings to one vector
pub fn pool(
    tokens: ArrayView2<'_, f32>,
    attention_mask: &[i64],
    strategy: PoolingStrategy,
) -> Vec<f32> {
    let hidden_dim = tokens.shape()[1];

    match strategy {
        PoolingStrategy::Cls => tokens.row(0).to_vec(),
        PoolingStrategy::Mean => {
            let mut pooled = vec![0.0f32; hidden_dim];
            let mut sum_mask = 0.0f32;

            for (i, row) in tokens.outer_iter().enumerate() {
                let mask_value = attention_mask.get(i).copied().unwrap_or(0) as f32;
                sum_mask += mask_value;
                for (acc, value) in pooled.iter_mut().zip(row.iter()) {
                    *acc += value * mask_value;
                }
            }

            for val in &mut pooled {
                *val /= sum_mask.max(1e-9);
            }
            pooled
        }
    }
}

/// Scales `vector` to unit length; the zero vector is left unchanged
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
