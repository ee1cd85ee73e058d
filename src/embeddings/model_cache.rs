// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Model Cache
//!
//! Maps model identifiers to loaded model handles. Entries are created
//! lazily on first use and live for the lifetime of the cache; there is no
//! eviction, size bound or TTL.
//!
//! Each identifier owns a [`OnceCell`], so concurrent first-time requests
//! for the same model wait on a single provider load instead of each
//! loading their own copy. A failed load leaves the cell empty; once no
//! request is waiting on it the slot is dropped, so unknown identifiers do
//! not accumulate and the next request tries again.

use crate::embeddings::{Device, EmbeddingError, EmbeddingProvider, ModelHandle};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, error, info};

type ModelSlot = Arc<OnceCell<ModelHandle>>;

/// Lazily populated identifier -> model handle map
///
/// # Example
/// ```ignore
/// let cache = ModelCache::new(Arc::new(HubProvider::new(config)));
/// let model = cache.resolve("all-MiniLM-L6-v2").await?;
/// let embedding = model.encode("Hello world").await?;
/// ```
pub struct ModelCache {
    provider: Arc<dyn EmbeddingProvider>,
    device: Device,
    slots: RwLock<HashMap<String, ModelSlot>>,
}

impl fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCache")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl ModelCache {
    /// Creates an empty cache that loads models onto the CPU
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            device: Device::Cpu,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the handle for `identifier`, loading it on a cache miss
    ///
    /// # Errors
    /// `EmbeddingError::Load` if the provider cannot load the model. Nothing
    /// is cached in that case.
    pub async fn resolve(&self, identifier: &str) -> Result<ModelHandle, EmbeddingError> {
        let slot = self.slot(identifier).await;

        if let Some(model) = slot.get() {
            debug!("Model cache hit: {}", identifier);
            return Ok(model.clone());
        }

        let loaded = slot
            .get_or_try_init(|| async {
                info!("Model cache miss, loading {} on {}", identifier, self.device);
                let started = Instant::now();

                match self.provider.load(identifier, self.device).await {
                    Ok(model) => {
                        info!(
                            "Loaded model {} in {}ms",
                            identifier,
                            started.elapsed().as_millis()
                        );
                        Ok(model)
                    }
                    Err(e) => {
                        error!("Failed to load model {}: {}", identifier, e);
                        Err(e)
                    }
                }
            })
            .await
            .map(Arc::clone);

        if loaded.is_err() {
            drop(slot);
            self.discard_unused_slot(identifier).await;
        }

        loaded
    }

    /// Returns true if `identifier` has a loaded handle
    pub async fn contains(&self, identifier: &str) -> bool {
        self.slots
            .read()
            .await
            .get(identifier)
            .map(|slot| slot.initialized())
            .unwrap_or(false)
    }

    /// Number of loaded models
    pub async fn len(&self) -> usize {
        self.slots
            .read()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Identifiers of all loaded models, sorted
    pub async fn loaded_models(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .slots
            .read()
            .await
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    // The map lock is only held to find or create the slot, never across a load.
    async fn slot(&self, identifier: &str) -> ModelSlot {
        if let Some(slot) = self.slots.read().await.get(identifier) {
            return slot.clone();
        }

        self.slots
            .write()
            .await
            .entry(identifier.to_string())
            .or_default()
            .clone()
    }

    // Drops a slot nobody loaded and nobody is waiting on. A waiter still
    // holding the slot may retry the load, so shared slots stay.
    async fn discard_unused_slot(&self, identifier: &str) {
        let mut slots = self.slots.write().await;
        let unused = slots
            .get(identifier)
            .map(|slot| !slot.initialized() && Arc::strong_count(slot) == 1)
            .unwrap_or(false);

        if unused {
            slots.remove(identifier);
        }
    }
}
