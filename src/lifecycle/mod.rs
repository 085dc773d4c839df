//! Model Lifecycle Manager (C4)
//!
//! Tracks per-model residency state, enforces load/unload through a
//! per-model mutex, applies the admission/eviction rules, and tracks usage
//! history for "popular model" preloading. Grounded on
//! `original_source/app/services/ollama_manager_service.py`'s
//! `OllamaManagerService`.

pub mod metrics;

pub use metrics::{LifecycleMetrics, PerformanceSnapshot, ResourceMetrics};

use crate::error::{Result, RouterError};
use crate::provider::{GenerationParams, Provider, ProviderError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

const USAGE_WINDOW: ChronoDuration = ChronoDuration::hours(24);
const POPULAR_WINDOW: ChronoDuration = ChronoDuration::hours(2);
const RESOURCE_HISTORY_CAP: usize = 100;
const TOP_N_POPULAR: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelStatus {
    Unloaded,
    Loading,
    Loaded,
    Unloading,
    Error,
}

/// Mutable per-model state, exclusively owned by the lifecycle manager.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub size_gb: f64,
    pub status: ModelStatus,
    pub loaded_at: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub memory_usage_mb: u64,
    pub load_time_seconds: f64,
    pub error_message: Option<String>,
}

impl ModelInfo {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            size_gb: estimate_model_size_gb(name),
            status: ModelStatus::Unloaded,
            loaded_at: None,
            last_used: None,
            usage_count: 0,
            memory_usage_mb: 0,
            load_time_seconds: 0.0,
            error_message: None,
        }
    }
}

fn estimate_model_size_gb(model_name: &str) -> f64 {
    const SIZE_ESTIMATES: &[(&str, f64)] =
        &[("3b", 3.0), ("7b", 7.0), ("8b", 8.0), ("13b", 13.0), ("30b", 30.0), ("70b", 70.0)];
    let lower = model_name.to_lowercase();
    SIZE_ESTIMATES
        .iter()
        .find(|(key, _)| lower.contains(key))
        .map(|(_, gb)| *gb)
        .unwrap_or(7.0)
}

fn estimate_model_memory_mb(model_name: &str) -> u64 {
    (estimate_model_size_gb(model_name) * 1.2 * 1024.0) as u64
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizeResult {
    pub models_unloaded: Vec<String>,
    pub memory_freed_mb: u64,
    pub models_kept_loaded: Vec<String>,
    pub optimization_time_seconds: f64,
}

/// Tracks residency and usage for a tier/model catalog behind a single
/// [`Provider`]. One `LifecycleManager` per provider chain entry that can
/// load/unload models (typically the local HTTP provider).
pub struct LifecycleManager {
    provider: Arc<dyn Provider>,
    max_concurrent_models: usize,
    memory_threshold_percent: f64,
    idle_timeout_minutes: i64,

    models: DashMap<String, Arc<AsyncMutex<ModelInfo>>>,
    loaded_count: AtomicUsize,
    usage_history: DashMap<String, Mutex<VecDeque<DateTime<Utc>>>>,
    resource_history: Mutex<VecDeque<ResourceMetrics>>,
    metrics: Mutex<LifecycleMetrics>,
}

impl LifecycleManager {
    pub fn new(
        provider: Arc<dyn Provider>,
        max_concurrent_models: usize,
        memory_threshold_percent: f64,
        idle_timeout_minutes: u64,
    ) -> Self {
        Self {
            provider,
            max_concurrent_models,
            memory_threshold_percent,
            idle_timeout_minutes: idle_timeout_minutes as i64,
            models: DashMap::new(),
            loaded_count: AtomicUsize::new(0),
            usage_history: DashMap::new(),
            resource_history: Mutex::new(VecDeque::with_capacity(RESOURCE_HISTORY_CAP)),
            metrics: Mutex::new(LifecycleMetrics::default()),
        }
    }

    fn slot(&self, model: &str) -> Arc<AsyncMutex<ModelInfo>> {
        self.models
            .entry(model.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(ModelInfo::new(model))))
            .clone()
    }

    /// Load `model`, blocking concurrent callers on the same model behind a
    /// per-model mutex. The second caller to observe a completed load sees
    /// the post-transition `LOADED` status and counts as a cache hit.
    pub async fn load(&self, model: &str, force: bool) -> Result<bool> {
        let slot = self.slot(model);
        let mut info = slot.lock().await;

        if !force && info.status == ModelStatus::Loaded {
            info.last_used = Some(Utc::now());
            info.usage_count += 1;
            self.metrics.lock().expect("metrics lock poisoned").cache_hits += 1;
            self.track_usage(model);
            return Ok(true);
        }

        if !self.can_load() {
            tracing::warn!(model, "cannot load: resource constraints");
            return Err(RouterError::ResourceExhausted(format!(
                "cannot load {model}: max_concurrent_models or memory_threshold reached"
            )));
        }

        info.status = ModelStatus::Loading;
        let start = std::time::Instant::now();
        tracing::info!(model, "loading model");

        match self.provider.load(model).await {
            Ok(()) => {
                let load_time = start.elapsed().as_secs_f64();
                info.status = ModelStatus::Loaded;
                info.loaded_at = Some(Utc::now());
                info.last_used = Some(Utc::now());
                info.usage_count += 1;
                info.load_time_seconds = load_time;
                info.memory_usage_mb = estimate_model_memory_mb(model);
                info.error_message = None;
                self.loaded_count.fetch_add(1, Ordering::SeqCst);

                let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
                metrics.models_loaded += 1;
                metrics.load_time_total += load_time;
                metrics.cache_misses += 1;
                drop(metrics);

                drop(info);
                self.track_usage(model);
                tracing::info!(model, load_time_seconds = load_time, "model loaded");
                Ok(true)
            }
            Err(err) => {
                info.status = ModelStatus::Error;
                info.error_message = Some(err.to_string());
                tracing::error!(model, error = %err, "failed to load model");
                Ok(false)
            }
        }
    }

    /// Unload `model`. Returns `false` (not an error) if the model is not
    /// currently loaded, matching the Python original's non-fatal contract.
    pub async fn unload(&self, model: &str) -> Result<bool> {
        let Some(entry) = self.models.get(model) else {
            tracing::warn!(model, "model not found for unloading");
            return Ok(false);
        };
        let slot = entry.clone();
        drop(entry);
        let mut info = slot.lock().await;

        if info.status != ModelStatus::Loaded {
            tracing::warn!(model, status = ?info.status, "model is not loaded");
            return Ok(false);
        }

        info.status = ModelStatus::Unloading;
        self.loaded_count.fetch_sub(1, Ordering::SeqCst);
        tracing::info!(model, "unloading model");

        match self.provider.unload(model).await {
            Ok(()) => {
                let freed = info.memory_usage_mb;
                info.status = ModelStatus::Unloaded;
                info.loaded_at = None;
                info.memory_usage_mb = 0;

                let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
                metrics.models_unloaded += 1;
                metrics.memory_saved_mb += freed;
                drop(metrics);

                tracing::info!(model, "model unloaded");
                Ok(true)
            }
            Err(err) => {
                info.status = ModelStatus::Error;
                info.error_message = Some(err.to_string());
                tracing::error!(model, error = %err, "failed to unload model");
                Ok(false)
            }
        }
    }

    pub async fn status(&self, model: &str) -> Option<ModelInfo> {
        let entry = self.models.get(model)?;
        let slot = entry.clone();
        drop(entry);
        Some(slot.lock().await.clone())
    }

    /// Admission rule: `count(LOADED) < max_concurrent_models` and resident
    /// memory stays under `memory_threshold_percent` of the mocked GPU pool.
    fn can_load(&self) -> bool {
        if self.loaded_count.load(Ordering::SeqCst) >= self.max_concurrent_models {
            return false;
        }
        let resident_mb = self.resident_memory_mb();
        let metrics = ResourceMetrics::mocked(resident_mb);
        let usage_percent =
            (metrics.gpu_memory_used_mb as f64 / metrics.gpu_memory_total_mb as f64) * 100.0;
        usage_percent < self.memory_threshold_percent
    }

    fn resident_memory_mb(&self) -> u64 {
        self.models
            .iter()
            .filter_map(|entry| entry.value().try_lock().ok().map(|info| info.memory_usage_mb))
            .sum()
    }

    /// Eviction rule: LOADED models idle ≥ `idle_timeout_minutes`, oldest
    /// first, never dropping the single most-recently-used model.
    pub async fn optimize_memory(&self) -> OptimizeResult {
        let start = std::time::Instant::now();
        let mut unloaded = Vec::new();
        let mut freed_mb = 0u64;

        let candidates = self.identify_for_unloading().await;
        for model in candidates {
            let resident_mb = self.status(&model).await.map(|info| info.memory_usage_mb).unwrap_or(0);
            if self.unload(&model).await.unwrap_or(false) {
                freed_mb += resident_mb;
                unloaded.push(model);
            }
        }

        let mut kept_loaded = Vec::new();
        for entry in self.models.iter() {
            if let Ok(info) = entry.value().try_lock() {
                if info.status == ModelStatus::Loaded {
                    kept_loaded.push(info.name.clone());
                }
            }
        }

        OptimizeResult {
            models_unloaded: unloaded,
            memory_freed_mb: freed_mb,
            models_kept_loaded: kept_loaded,
            optimization_time_seconds: start.elapsed().as_secs_f64(),
        }
    }

    async fn identify_for_unloading(&self) -> Vec<String> {
        let now = Utc::now();
        let mut loaded: Vec<(String, Option<DateTime<Utc>>)> = Vec::new();
        for entry in self.models.iter() {
            let info = entry.value().lock().await;
            if info.status == ModelStatus::Loaded {
                loaded.push((info.name.clone(), info.last_used));
            }
        }
        loaded.sort_by_key(|(_, last_used)| *last_used);

        let mut candidates: Vec<String> = Vec::new();
        for (name, last_used) in &loaded {
            match last_used {
                Some(ts) => {
                    if now - *ts >= ChronoDuration::minutes(self.idle_timeout_minutes) {
                        candidates.push(name.clone());
                    }
                }
                None => candidates.push(name.clone()),
            }
        }

        if candidates.len() >= loaded.len() && !loaded.is_empty() {
            candidates.pop();
        }
        candidates
    }

    pub async fn preload_popular(&self) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        for model in self.identify_popular_models() {
            let already_loaded = self.status(&model).await.map(|i| i.status == ModelStatus::Loaded).unwrap_or(false);
            if already_loaded {
                continue;
            }
            if !self.can_load() {
                results.insert(model, false);
                break;
            }
            let ok = self.load(&model, false).await.unwrap_or(false);
            results.insert(model, ok);
        }
        results
    }

    fn track_usage(&self, model: &str) {
        let now = Utc::now();
        let history = self
            .usage_history
            .entry(model.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut history = history.lock().expect("usage history lock poisoned");
        history.push_back(now);
        while history.front().is_some_and(|ts| now - *ts > USAGE_WINDOW) {
            history.pop_front();
        }
    }

    fn identify_popular_models(&self) -> Vec<String> {
        let now = Utc::now();
        let mut scored: Vec<(String, u64)> = Vec::new();

        for entry in self.usage_history.iter() {
            let history = entry.value().lock().expect("usage history lock poisoned");
            let recent = history.iter().filter(|ts| now - **ts <= POPULAR_WINDOW).count() as u64;
            let total = history.len() as u64;
            let score = recent * 2 + total;
            if score > 0 {
                scored.push((entry.key().clone(), score));
            }
        }

        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.into_iter().take(TOP_N_POPULAR).map(|(name, _)| name).collect()
    }

    pub fn resource_metrics(&self) -> ResourceMetrics {
        let metrics = ResourceMetrics::mocked(self.resident_memory_mb());
        let mut history = self.resource_history.lock().expect("resource history lock poisoned");
        if history.len() >= RESOURCE_HISTORY_CAP {
            history.pop_front();
        }
        history.push_back(metrics.clone());
        metrics
    }

    pub fn performance_metrics(&self) -> PerformanceSnapshot {
        let total_models = self.models.len();
        let loaded_models = self.loaded_count.load(Ordering::SeqCst);
        let resident_mb = self.resident_memory_mb();
        self.metrics
            .lock()
            .expect("metrics lock poisoned")
            .snapshot(total_models, loaded_models, resident_mb)
    }

    pub fn generation_params_for(config: &crate::registry::ModelConfig) -> GenerationParams {
        GenerationParams::from_model_config(config)
    }
}

impl From<ProviderError> for RouterError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout { elapsed_secs, deadline_secs } => {
                RouterError::Timeout { elapsed_secs, deadline_secs }
            }
            other => RouterError::ProviderUnavailable { provider: "unknown".to_string(), message: other.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Behavior, TestProvider};

    fn manager() -> LifecycleManager {
        LifecycleManager::new(Arc::new(TestProvider::new("t", Behavior::Succeed { content: "ok".into() })), 3, 85.0, 15)
    }

    #[tokio::test]
    async fn load_transitions_to_loaded_and_counts_cache_miss() {
        let manager = manager();
        let ok = manager.load("llama3.2:3b", false).await.unwrap();
        assert!(ok);
        let info = manager.status("llama3.2:3b").await.unwrap();
        assert_eq!(info.status, ModelStatus::Loaded);
        assert_eq!(manager.performance_metrics().total_loads, 1);
    }

    #[tokio::test]
    async fn reload_without_force_is_cache_hit() {
        let manager = manager();
        manager.load("m", false).await.unwrap();
        manager.load("m", false).await.unwrap();
        let perf = manager.performance_metrics();
        assert_eq!(perf.total_loads, 1);
    }

    #[tokio::test]
    async fn unload_frees_memory_and_transitions_to_unloaded() {
        let manager = manager();
        manager.load("m", false).await.unwrap();
        let ok = manager.unload("m").await.unwrap();
        assert!(ok);
        let info = manager.status("m").await.unwrap();
        assert_eq!(info.status, ModelStatus::Unloaded);
    }

    #[tokio::test]
    async fn optimize_memory_keeps_at_least_one_loaded() {
        let manager = LifecycleManager::new(
            Arc::new(TestProvider::new("t", Behavior::Succeed { content: "ok".into() })),
            3,
            85.0,
            0,
        );
        manager.load("a", false).await.unwrap();
        manager.load("b", false).await.unwrap();

        // Force both idle past the zero-minute timeout.
        let result = manager.optimize_memory().await;
        assert!(result.models_kept_loaded.len() >= 1);
    }

    #[tokio::test]
    async fn load_failure_marks_error_and_returns_false() {
        let manager = LifecycleManager::new(Arc::new(TestProvider::new("t", Behavior::Fail("down".into()))), 3, 85.0, 15);
        let ok = manager.load("m", false).await.unwrap();
        assert!(!ok);
        let info = manager.status("m").await.unwrap();
        assert_eq!(info.status, ModelStatus::Error);
    }

    #[tokio::test]
    async fn resource_exhausted_when_concurrent_cap_reached() {
        let manager = LifecycleManager::new(
            Arc::new(TestProvider::new("t", Behavior::Succeed { content: "ok".into() })),
            1,
            85.0,
            15,
        );
        manager.load("a", false).await.unwrap();
        let err = manager.load("b", false).await.unwrap_err();
        assert!(matches!(err, RouterError::ResourceExhausted(_)));
    }
}
