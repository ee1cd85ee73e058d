// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Model Cache tests
//!
//! These tests verify that the ModelCache:
//! - Loads a model once per identifier and hands out the same handle
//! - Loads onto the CPU device
//! - Collapses concurrent first-time loads into one provider call
//! - Does not block other identifiers while one is loading
//! - Leaves failed loads uncached so they can be retried

use aiapi::embeddings::{
    Device, EmbeddingError, EmbeddingModel, EmbeddingProvider, ModelCache, ModelHandle,
};
use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct NamedModel {
    name: String,
}

#[async_trait]
impl EmbeddingModel for NamedModel {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(vec![text.len() as f32])
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

/// Records every load call with its device and sleeps per model
#[derive(Default)]
struct RecordingProvider {
    calls: Mutex<Vec<(String, Device)>>,
    delays: HashMap<String, Duration>,
    failures_left: AtomicUsize,
}

impl RecordingProvider {
    fn calls(&self) -> Vec<(String, Device)> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_for(&self, name: &str) -> usize {
        self.calls().iter().filter(|(n, _)| n == name).count()
    }
}

#[async_trait]
impl EmbeddingProvider for RecordingProvider {
    async fn load(&self, model_name: &str, device: Device) -> Result<ModelHandle, EmbeddingError> {
        self.calls
            .lock()
            .unwrap()
            .push((model_name.to_string(), device));

        if let Some(delay) = self.delays.get(model_name) {
            tokio::time::sleep(*delay).await;
        }

        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(EmbeddingError::Load {
                model: model_name.to_string(),
                reason: "connection reset".to_string(),
            });
        }

        Ok(Arc::new(NamedModel {
            name: model_name.to_string(),
        }))
    }
}

#[tokio::test]
async fn test_resolve_loads_on_cpu() {
    let provider = Arc::new(RecordingProvider::default());
    let cache = ModelCache::new(provider.clone());

    let model = cache.resolve("all-MiniLM-L6-v2").await.unwrap();

    assert_eq!(model.model_name(), "all-MiniLM-L6-v2");
    assert_eq!(
        provider.calls(),
        vec![("all-MiniLM-L6-v2".to_string(), Device::Cpu)]
    );
}

#[tokio::test]
async fn test_repeated_resolve_returns_same_handle() {
    let provider = Arc::new(RecordingProvider::default());
    let cache = ModelCache::new(provider.clone());

    let first = cache.resolve("stub-model").await.unwrap();
    for _ in 0..5 {
        let again = cache.resolve("stub-model").await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    assert_eq!(provider.calls_for("stub-model"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_load_once() {
    let mut provider = RecordingProvider::default();
    provider
        .delays
        .insert("cold-model".to_string(), Duration::from_millis(100));
    let provider = Arc::new(provider);
    let cache = Arc::new(ModelCache::new(provider.clone()));

    let tasks = (0..32).map(|_| {
        let cache = cache.clone();
        tokio::spawn(async move { cache.resolve("cold-model").await })
    });

    let handles: Vec<ModelHandle> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert_eq!(provider.calls_for("cold-model"), 1);
    for handle in &handles[1..] {
        assert!(Arc::ptr_eq(&handles[0], handle));
    }
    assert_eq!(cache.len().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_load_does_not_block_other_models() {
    let mut provider = RecordingProvider::default();
    provider
        .delays
        .insert("slow-model".to_string(), Duration::from_millis(500));
    let provider = Arc::new(provider);
    let cache = Arc::new(ModelCache::new(provider.clone()));

    let slow = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.resolve("slow-model").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    cache.resolve("fast-model").await.unwrap();
    assert!(
        started.elapsed() < Duration::from_millis(400),
        "fast-model waited on slow-model: {:?}",
        started.elapsed()
    );

    slow.await.unwrap().unwrap();
    assert_eq!(cache.len().await, 2);
}

#[tokio::test]
async fn test_failed_load_then_success() {
    let provider = RecordingProvider {
        failures_left: AtomicUsize::new(1),
        ..Default::default()
    };
    let provider = Arc::new(provider);
    let cache = ModelCache::new(provider.clone());

    let err = cache.resolve("flaky-model").await.err().unwrap();
    assert_eq!(
        err,
        EmbeddingError::Load {
            model: "flaky-model".to_string(),
            reason: "connection reset".to_string(),
        }
    );
    assert!(!cache.contains("flaky-model").await);

    let model = cache.resolve("flaky-model").await.unwrap();
    assert_eq!(model.encode("abcd").await.unwrap(), vec![4.0]);
    assert_eq!(provider.calls_for("flaky-model"), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_waiters_after_failure_retry_once() {
    let mut provider = RecordingProvider {
        failures_left: AtomicUsize::new(1),
        ..Default::default()
    };
    provider
        .delays
        .insert("flaky-model".to_string(), Duration::from_millis(50));
    let provider = Arc::new(provider);
    let cache = Arc::new(ModelCache::new(provider.clone()));

    let tasks = (0..8).map(|_| {
        let cache = cache.clone();
        tokio::spawn(async move { cache.resolve("flaky-model").await.is_ok() })
    });
    let results: Vec<bool> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    // One caller sees the failure, a waiter takes over and the rest share its result
    assert_eq!(results.iter().filter(|ok| !**ok).count(), 1);
    assert_eq!(provider.calls_for("flaky-model"), 2);
    assert!(cache.contains("flaky-model").await);
}
