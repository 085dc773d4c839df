//! Model Registry (C2)
//!
//! Static catalog of tier configurations. No mutable state: `ModelRegistry`
//! is built once at startup from defaults plus any [`crate::config::TierOverride`]
//! entries and shared (read-only) across workers thereafter.

use crate::config::TierOverride;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Model capability tier, ordered from cheapest/fastest to most capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Fast,
    Balanced,
    Powerful,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Fast, Tier::Balanced, Tier::Powerful];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Fast => "fast",
            Tier::Balanced => "balanced",
            Tier::Powerful => "powerful",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable per-tier model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    pub tier: Tier,
    pub max_tokens: u32,
    pub context_window: u32,
    pub gpu_memory_mb: u32,
    pub avg_tokens_per_second: f64,
    pub concurrent_capacity: usize,
    pub keep_alive_minutes: u64,
}

impl ModelConfig {
    fn apply_override(mut self, over: &TierOverride) -> Self {
        if let Some(v) = over.max_tokens {
            self.max_tokens = v;
        }
        if let Some(v) = over.context_window {
            self.context_window = v;
        }
        if let Some(v) = over.gpu_memory_mb {
            self.gpu_memory_mb = v;
        }
        if let Some(v) = over.avg_tokens_per_second {
            self.avg_tokens_per_second = v;
        }
        if let Some(v) = over.concurrent_capacity {
            self.concurrent_capacity = v;
        }
        if let Some(v) = over.keep_alive_minutes {
            self.keep_alive_minutes = v;
        }
        self
    }
}

fn default_configs() -> BTreeMap<Tier, ModelConfig> {
    let mut map = BTreeMap::new();
    map.insert(
        Tier::Fast,
        ModelConfig {
            model_name: "llama3.2:3b".to_string(),
            tier: Tier::Fast,
            max_tokens: 2048,
            context_window: 4096,
            gpu_memory_mb: 3000,
            avg_tokens_per_second: 50.0,
            concurrent_capacity: 8,
            keep_alive_minutes: 10,
        },
    );
    map.insert(
        Tier::Balanced,
        ModelConfig {
            model_name: "llama3.2:8b".to_string(),
            tier: Tier::Balanced,
            max_tokens: 4096,
            context_window: 8192,
            gpu_memory_mb: 8000,
            avg_tokens_per_second: 25.0,
            concurrent_capacity: 4,
            keep_alive_minutes: 15,
        },
    );
    map.insert(
        Tier::Powerful,
        ModelConfig {
            model_name: "llama3.2:70b".to_string(),
            tier: Tier::Powerful,
            max_tokens: 8192,
            context_window: 16384,
            gpu_memory_mb: 40000,
            avg_tokens_per_second: 8.0,
            concurrent_capacity: 1,
            keep_alive_minutes: 30,
        },
    );
    map
}

/// Static, immutable tier catalog. Construct once with [`ModelRegistry::new`]
/// and share via `Arc` across the router, lifecycle manager, and workers.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    configs: BTreeMap<Tier, ModelConfig>,
}

impl ModelRegistry {
    /// Build the registry from baseline defaults, applying any deployment
    /// overrides for individual fields.
    pub fn new(overrides: &BTreeMap<Tier, TierOverride>) -> Self {
        let mut configs = default_configs();
        for (tier, over) in overrides {
            if let Some(cfg) = configs.remove(tier) {
                configs.insert(*tier, cfg.apply_override(over));
            }
        }
        Self { configs }
    }

    /// Look up the configuration for a tier. Every [`Tier`] variant always
    /// has an entry, so this never returns `None` in practice, but the
    /// caller-facing contract (`get(tier) -> ModelConfig`) is still total
    /// via this `Option`-returning accessor for defensive callers.
    pub fn get(&self, tier: Tier) -> &ModelConfig {
        self.configs
            .get(&tier)
            .expect("ModelRegistry must contain an entry for every Tier")
    }

    /// All configured tiers, in `Tier` order (FAST, BALANCED, POWERFUL).
    pub fn all(&self) -> Vec<&ModelConfig> {
        self.configs.values().collect()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_matches_spec_table() {
        let registry = ModelRegistry::default();
        let fast = registry.get(Tier::Fast);
        assert_eq!(fast.max_tokens, 2048);
        assert_eq!(fast.concurrent_capacity, 8);
        let powerful = registry.get(Tier::Powerful);
        assert_eq!(powerful.gpu_memory_mb, 40000);
        assert_eq!(powerful.keep_alive_minutes, 30);
    }

    #[test]
    fn override_replaces_only_named_fields() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            Tier::Fast,
            TierOverride {
                concurrent_capacity: Some(16),
                ..Default::default()
            },
        );
        let registry = ModelRegistry::new(&overrides);
        let fast = registry.get(Tier::Fast);
        assert_eq!(fast.concurrent_capacity, 16);
        assert_eq!(fast.max_tokens, 2048, "untouched field keeps default");
    }

    #[test]
    fn all_returns_three_tiers() {
        let registry = ModelRegistry::default();
        assert_eq!(registry.all().len(), 3);
    }
}
