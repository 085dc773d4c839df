//! Cumulative lifecycle counters and the resource-metrics stub.
//!
//! Grounded on `original_source/app/services/ollama_manager_service.py`'s
//! `self.metrics`, `get_performance_metrics`, and `_get_resource_metrics`.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Mutable cumulative counters, held behind a single lock inside
/// [`super::LifecycleManager`] (§5 "Metrics counters: incremented under a
/// metrics lock or via atomic types").
#[derive(Debug, Default, Clone)]
pub struct LifecycleMetrics {
    pub models_loaded: u64,
    pub models_unloaded: u64,
    pub memory_saved_mb: u64,
    pub load_time_total: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// Structured snapshot for `admin/metrics()`, mirroring
/// `get_performance_metrics`'s nested shape.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSnapshot {
    pub total_models: usize,
    pub loaded_models: usize,
    pub loading_efficiency_percent: f64,
    pub total_memory_used_mb: u64,
    pub memory_saved_mb: u64,
    pub avg_load_time_seconds: f64,
    pub cache_hit_rate_percent: f64,
    pub total_loads: u64,
    pub total_unloads: u64,
}

impl LifecycleMetrics {
    pub fn snapshot(&self, total_models: usize, loaded_models: usize, total_memory_used_mb: u64) -> PerformanceSnapshot {
        let avg_load_time_seconds = self.load_time_total / (self.models_loaded.max(1) as f64);
        let total_requests = self.cache_hits + self.cache_misses;
        let cache_hit_rate_percent = (self.cache_hits as f64 / (total_requests.max(1) as f64)) * 100.0;
        let loading_efficiency_percent = (loaded_models as f64 / (total_models.max(1) as f64)) * 100.0;

        PerformanceSnapshot {
            total_models,
            loaded_models,
            loading_efficiency_percent,
            total_memory_used_mb,
            memory_saved_mb: self.memory_saved_mb,
            avg_load_time_seconds,
            cache_hit_rate_percent,
            total_loads: self.models_loaded,
            total_unloads: self.models_unloaded,
        }
    }
}

/// Mocked-but-structured GPU/CPU/RAM telemetry, pending real
/// `nvidia-ml-py`-equivalent integration (see DESIGN.md Open Question).
#[derive(Debug, Clone, Serialize)]
pub struct ResourceMetrics {
    pub gpu_memory_total_mb: u64,
    pub gpu_memory_used_mb: u64,
    pub gpu_memory_free_mb: u64,
    pub gpu_utilization_percent: f64,
    pub cpu_percent: f64,
    pub ram_used_gb: f64,
    pub ram_total_gb: f64,
    pub timestamp: DateTime<Utc>,
}

impl ResourceMetrics {
    /// Fixed stand-in figures, matching the Python original's mocked GPU
    /// telemetry constants.
    pub fn mocked(resident_memory_mb: u64) -> Self {
        let gpu_memory_total_mb = 24_000;
        let gpu_memory_used_mb = resident_memory_mb.min(gpu_memory_total_mb);
        Self {
            gpu_memory_total_mb,
            gpu_memory_used_mb,
            gpu_memory_free_mb: gpu_memory_total_mb.saturating_sub(gpu_memory_used_mb),
            gpu_utilization_percent: 45.0,
            cpu_percent: 25.0,
            ram_used_gb: 8.0,
            ram_total_gb: 32.0,
            timestamp: Utc::now(),
        }
    }
}
