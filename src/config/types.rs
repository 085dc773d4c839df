//! Configuration types, defaults, and loading.

use crate::config::secrets::SecretString;
use crate::registry::Tier;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Root configuration for the router/runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider chain configuration (§6 "providers[...]", "primary_provider").
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Per-tier overrides of the [`crate::registry::ModelRegistry`] defaults.
    #[serde(default)]
    pub tiers: BTreeMap<Tier, TierOverride>,

    /// Conversation context store configuration.
    #[serde(default)]
    pub context_store: ContextStoreConfig,

    /// Tiered router / lifecycle manager configuration.
    #[serde(default)]
    pub router: RouterConfig,
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults for any
    /// field the file omits.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path:?}"))?;
        let config: Config =
            toml::from_str(&raw).with_context(|| format!("parsing config file {path:?}"))?;
        Ok(config)
    }

    /// Defaults plus environment variable overrides for provider credentials
    /// (`ANTHROPIC_API_KEY`, `OPENAI_API_KEY`, `OLLAMA_BASE_URL`), matching
    /// the teacher's `apply_env_overrides` convention.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("OLLAMA_BASE_URL") {
            config.providers.providers.push(ProviderConfig {
                name: "ollama-local".into(),
                kind: ProviderKind::Local,
                base_url: Some(base_url),
                api_key: None,
                deadline_seconds: 30.0,
                model: None,
            });
        }

        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            config.providers.providers.push(ProviderConfig {
                name: "anthropic".into(),
                kind: ProviderKind::Remote,
                base_url: None,
                api_key: Some(SecretString::new(key)),
                deadline_seconds: config.router.primary_timeout_seconds,
                model: Some("claude-3-5-sonnet-latest".to_string()),
            });
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.providers.providers.push(ProviderConfig {
                name: "openai".into(),
                kind: ProviderKind::Remote,
                base_url: None,
                api_key: Some(SecretString::new(key)),
                deadline_seconds: config.router.primary_timeout_seconds,
                model: Some("gpt-4o-mini".to_string()),
            });
        }

        if let Some(first) = config.providers.providers.first() {
            config.providers.primary_provider = first.name.clone();
        }

        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: ProvidersConfig::default(),
            tiers: BTreeMap::new(),
            context_store: ContextStoreConfig::default(),
            router: RouterConfig::default(),
        }
    }
}

/// Ordered chain of LLM providers plus the name of the preferred one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub primary_provider: String,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// A single provider chain entry: credentials/base URL plus its own
/// per-call deadline (§6 "providers[...] with credentials/base URLs and
/// per-provider deadlines").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_provider_deadline")]
    pub deadline_seconds: f64,
    /// Model identifier sent to this provider's API (e.g. `"gpt-4o-mini"`).
    /// Only meaningful for [`ProviderKind::Remote`] entries, which have no
    /// tier catalog of their own; falls back to `name` when unset.
    #[serde(default)]
    pub model: Option<String>,
}

fn default_provider_deadline() -> f64 {
    2.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// HTTP-based local inference backend (e.g. an Ollama-compatible server).
    Local,
    /// HTTP-based cloud provider.
    Remote,
    /// In-process provider used by tests.
    Test,
}

/// Partial override of a [`crate::registry::ModelConfig`]; any field left
/// `None` keeps the registry default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierOverride {
    pub max_tokens: Option<u32>,
    pub context_window: Option<u32>,
    pub gpu_memory_mb: Option<u32>,
    pub avg_tokens_per_second: Option<f64>,
    pub concurrent_capacity: Option<usize>,
    pub keep_alive_minutes: Option<u64>,
}

/// Conversation context store configuration (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextStoreConfig {
    #[serde(default)]
    pub backend_url: Option<String>,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    #[serde(default = "default_enable_compression")]
    pub enable_compression: bool,
}

impl Default for ContextStoreConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            ttl_seconds: default_ttl_seconds(),
            max_messages: default_max_messages(),
            max_message_size: default_max_message_size(),
            enable_compression: default_enable_compression(),
        }
    }
}

fn default_ttl_seconds() -> u64 {
    86_400
}
fn default_max_messages() -> usize {
    100
}
fn default_max_message_size() -> usize {
    10_000
}
fn default_enable_compression() -> bool {
    true
}

/// Tiered router / lifecycle manager configuration (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_max_concurrent_models")]
    pub max_concurrent_models: usize,
    #[serde(default = "default_memory_threshold_percent")]
    pub memory_threshold_percent: f64,
    #[serde(default = "default_idle_timeout_minutes")]
    pub idle_timeout_minutes: u64,
    #[serde(default = "default_primary_timeout_seconds")]
    pub primary_timeout_seconds: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_concurrent_models: default_max_concurrent_models(),
            memory_threshold_percent: default_memory_threshold_percent(),
            idle_timeout_minutes: default_idle_timeout_minutes(),
            primary_timeout_seconds: default_primary_timeout_seconds(),
        }
    }
}

fn default_max_concurrent_models() -> usize {
    3
}
fn default_memory_threshold_percent() -> f64 {
    85.0
}
fn default_idle_timeout_minutes() -> u64 {
    15
}
fn default_primary_timeout_seconds() -> f64 {
    2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.context_store.ttl_seconds, 86_400);
        assert_eq!(config.context_store.max_messages, 100);
        assert_eq!(config.context_store.max_message_size, 10_000);
        assert!(config.context_store.enable_compression);
        assert_eq!(config.router.max_concurrent_models, 3);
        assert_eq!(config.router.memory_threshold_percent, 85.0);
        assert_eq!(config.router.idle_timeout_minutes, 15);
        assert_eq!(config.router.primary_timeout_seconds, 2.0);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let toml_str = r#"
            [router]
            max_concurrent_models = 5
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.router.max_concurrent_models, 5);
        // untouched fields keep their defaults
        assert_eq!(config.router.idle_timeout_minutes, 15);
        assert_eq!(config.context_store.max_messages, 100);
    }
}
