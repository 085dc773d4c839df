//! infermesh - Adaptive Inference Router & Conversation Runtime
//!
//! A multi-tenant core for routing LLM requests across capability tiers,
//! managing local model residency under a GPU memory budget, failing over
//! across a provider chain, and carrying durable conversation context with
//! lightweight long-term memory extraction.
//!
//! ## Quick start
//!
//! ```no_run
//! use infermesh::{Config, Runtime};
//!
//! # async fn run() -> infermesh::Result<()> {
//! let config = Config::from_env();
//! let runtime = Runtime::bootstrap(config).await;
//! let response = runtime.generate_response("summarize this", None).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod config;
pub mod context;
pub mod error;
pub mod failover;
pub mod lifecycle;
pub mod logging;
pub mod memory;
pub mod metrics;
pub mod provider;
pub mod registry;
pub mod router;

pub use error::{Result, RouterError};

use config::{Config, ProviderKind};
use context::ConversationContext;
use lifecycle::LifecycleManager;
use provider::{LLMResponse, LocalHttpProvider, Provider};
use router::{Router, RoutingDecision};
use std::sync::Arc;

/// Version information, surfaced for diagnostics and `admin/metrics()`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Wires together C1-C8 into the facade described in spec §6
/// (`generate_response`, `route_only`, and the `admin/*` operations).
pub struct Runtime {
    router: Arc<Router>,
    failover: failover::FailoverManager,
    lifecycle: Arc<LifecycleManager>,
    context_store: Arc<context::ContextStore>,
}

impl Runtime {
    /// Build the full runtime from configuration: connects the context
    /// store, constructs the model registry and lifecycle manager around
    /// the first `Local` provider entry (or a bare Ollama default), and
    /// assembles the failover chain around the tiered router.
    pub async fn bootstrap(config: Config) -> Self {
        let registry = Arc::new(registry::ModelRegistry::new(&config.tiers));

        let local_entry = config.providers.providers.iter().find(|p| p.kind == ProviderKind::Local);
        let local_base_url = local_entry
            .and_then(|p| p.base_url.clone())
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let local_provider: Arc<dyn Provider> =
            Arc::new(LocalHttpProvider::new(local_base_url).with_name("ollama-local"));

        let lifecycle = Arc::new(LifecycleManager::new(
            local_provider.clone(),
            config.router.max_concurrent_models,
            config.router.memory_threshold_percent,
            config.router.idle_timeout_minutes,
        ));

        let router = Arc::new(Router::new(
            registry,
            lifecycle.clone(),
            local_provider,
            config.router.primary_timeout_seconds,
        ));

        let context_store = Arc::new(context::ContextStore::connect(config.context_store.clone()).await);
        let failover = failover::FailoverManager::from_config(&config, router.clone(), context_store.clone());

        Self { router, failover, lifecycle, context_store }
    }

    /// `generate_response(request) -> response` (§6). Runs the failover
    /// chain, persisting conversation context and extracted memory on
    /// success. Total-failure is absorbed into an apology response, not an
    /// error; only `InvalidInput` propagates.
    pub async fn generate_response(&self, query: &str, conversation_id: Option<&str>) -> Result<LLMResponse> {
        let conversation_id = conversation_id.unwrap_or("default");
        self.failover.generate(query, conversation_id).await
    }

    /// `route_only(request) -> RoutingDecision` (§6 introspection endpoint).
    /// Pure and side-effect free: does not touch the context store, does
    /// not load or unload any model.
    pub async fn route_only(&self, query: &str, conversation_id: Option<&str>) -> Result<RoutingDecision> {
        let context = match conversation_id {
            Some(id) => Some(self.context_store.get(id).await?),
            None => None,
        };
        Ok(self.router.route(query, context.as_ref()))
    }

    /// `admin/load(model_name)`.
    pub async fn admin_load(&self, model_name: &str) -> Result<bool> {
        self.lifecycle.load(model_name, true).await
    }

    /// `admin/unload(model_name)`.
    pub async fn admin_unload(&self, model_name: &str) -> Result<bool> {
        self.lifecycle.unload(model_name).await
    }

    /// `admin/optimize_memory()`.
    pub async fn admin_optimize_memory(&self) -> lifecycle::OptimizeResult {
        self.lifecycle.optimize_memory().await
    }

    /// `admin/metrics()`: combined lifecycle/router/failover snapshot.
    pub fn admin_metrics(&self) -> metrics::RouterSnapshot {
        metrics::RouterSnapshot {
            lifecycle: self.lifecycle.performance_metrics(),
            router: self.router.metrics(),
            failover: self.failover.metrics().into(),
        }
    }

    /// Durable context backend health, grounded on `context_store.py::health_check`.
    pub async fn admin_health(&self) -> context::HealthStatus {
        self.context_store.health().await
    }

    pub fn context_store(&self) -> &Arc<context::ContextStore> {
        &self.context_store
    }

    /// Read a conversation's current context without mutating it.
    pub async fn conversation(&self, conversation_id: &str) -> Result<ConversationContext> {
        self.context_store.get(conversation_id).await
    }
}
