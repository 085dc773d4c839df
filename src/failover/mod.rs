//! Failover LLM Manager (C6)
//!
//! Drives an ordered provider chain (typically a primary cloud provider
//! followed by the local tiered [`crate::router::Router`]), wires in the
//! conversation context store (C7) and memory extractor (C8), and absorbs
//! total failure into a fixed apology response rather than propagating it.
//! Grounded on `original_source/app/core/llm_manager.py`'s `ProductionLLMManager`.

use crate::config::{Config, ProviderConfig, ProviderKind};
use crate::context::{ContextStore, ConversationContext, Message, Role};
use crate::error::{Result, RouterError};
use crate::memory::MemoryExtractor;
use crate::provider::{GenerationParams, LLMResponse, Provider, ProviderMessage, RemoteHttpProvider};
use crate::router::Router;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn default_remote_base_url(name: &str) -> &'static str {
    match name {
        "openai" => "https://api.openai.com/v1",
        "anthropic" => "https://api.anthropic.com/v1",
        _ => "https://api.openai.com/v1",
    }
}

enum ChainEntry {
    /// The local tiered router: picks its own model per request.
    Tiered { name: String, router: Arc<Router> },
    /// A single fixed-model provider (typically a cloud API).
    Direct { name: String, provider: Arc<dyn Provider>, model: String, deadline: Duration },
}

impl ChainEntry {
    fn name(&self) -> &str {
        match self {
            ChainEntry::Tiered { name, .. } => name,
            ChainEntry::Direct { name, .. } => name,
        }
    }

    async fn generate(&self, query: &str, ctx: &ConversationContext) -> Result<LLMResponse> {
        match self {
            ChainEntry::Tiered { router, .. } => {
                let (response, _decision) = router.generate(query, Some(ctx)).await?;
                Ok(response)
            }
            ChainEntry::Direct { provider, model, deadline, .. } => {
                let mut messages: Vec<ProviderMessage> = ctx.messages.iter().map(ProviderMessage::from).collect();
                messages.push(ProviderMessage::user(query));
                provider
                    .generate(model, &messages, &GenerationParams::default(), *deadline)
                    .await
                    .map_err(RouterError::from)
            }
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct FailoverMetrics {
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub fallback_requests: u64,
    pub provider_usage: HashMap<String, u64>,
    pub total_response_time_seconds: f64,
}

impl FailoverMetrics {
    pub fn average_response_time_seconds(&self) -> f64 {
        if self.successful_requests == 0 {
            0.0
        } else {
            self.total_response_time_seconds / self.successful_requests as f64
        }
    }

    pub fn success_rate_percent(&self) -> f64 {
        let total = self.successful_requests + self.failed_requests;
        if total == 0 {
            0.0
        } else {
            self.successful_requests as f64 / total as f64 * 100.0
        }
    }
}

pub struct FailoverManager {
    chain: Vec<ChainEntry>,
    context_store: Arc<ContextStore>,
    extractor: MemoryExtractor,
    turn_counter: AtomicU64,
    metrics: Mutex<FailoverMetrics>,
}

impl FailoverManager {
    pub fn new(chain: Vec<ChainEntry>, context_store: Arc<ContextStore>) -> Self {
        Self {
            chain,
            context_store,
            extractor: MemoryExtractor::new(),
            turn_counter: AtomicU64::new(0),
            metrics: Mutex::new(FailoverMetrics::default()),
        }
    }

    /// Build the chain from configuration: the router is always the local
    /// tiered entry (`kind == Local`); every `Remote` entry becomes a
    /// `Direct` chain link. Order follows `providers.providers`, reordered
    /// so `primary_provider` leads.
    pub fn from_config(config: &Config, router: Arc<Router>, context_store: Arc<ContextStore>) -> Self {
        let mut entries: Vec<&ProviderConfig> = config.providers.providers.iter().collect();
        entries.sort_by_key(|p| if p.name == config.providers.primary_provider { 0 } else { 1 });

        let mut chain = Vec::new();
        for entry in entries {
            match entry.kind {
                ProviderKind::Local => {
                    chain.push(ChainEntry::Tiered { name: entry.name.clone(), router: router.clone() });
                }
                ProviderKind::Remote => {
                    let base_url = entry
                        .base_url
                        .clone()
                        .unwrap_or_else(|| default_remote_base_url(&entry.name).to_string());
                    let provider: Arc<dyn Provider> =
                        Arc::new(RemoteHttpProvider::new(entry.name.clone(), base_url, entry.api_key.clone()));
                    let model = entry.model.clone().unwrap_or_else(|| entry.name.clone());
                    chain.push(ChainEntry::Direct {
                        name: entry.name.clone(),
                        provider,
                        model,
                        deadline: Duration::from_secs_f64(entry.deadline_seconds),
                    });
                }
                ProviderKind::Test => {}
            }
        }

        if chain.is_empty() {
            chain.push(ChainEntry::Tiered { name: "local-router".to_string(), router });
        }

        Self::new(chain, context_store)
    }

    /// Run the chain in order, injecting/persisting conversation context
    /// and extracted memory on success. Only `InvalidInput` is propagated;
    /// every other failure mode is absorbed into an apology [`LLMResponse`].
    pub async fn generate(&self, query: &str, conversation_id: &str) -> Result<LLMResponse> {
        if query.trim().is_empty() {
            return Err(RouterError::InvalidInput("query cannot be empty".to_string()));
        }

        let mut ctx = self.context_store.get(conversation_id).await?;
        ctx.add_message(Message::new(Role::User, query));

        for (index, entry) in self.chain.iter().enumerate() {
            match entry.generate(query, &ctx).await {
                Ok(mut response) => {
                    response.fallback_used = response.fallback_used || index > 0;

                    ctx.add_message(Message::new(Role::Assistant, response.content.clone()));
                    let turn = self.turn_counter.fetch_add(1, Ordering::SeqCst) + 1;
                    ctx = self.extractor.process_turn(ctx, turn);
                    let _ = self.context_store.update(conversation_id, ctx).await?;

                    let mut metrics = self.metrics.lock().expect("failover metrics lock poisoned");
                    metrics.successful_requests += 1;
                    metrics.total_response_time_seconds += response.response_time_seconds;
                    if index > 0 {
                        metrics.fallback_requests += 1;
                    }
                    *metrics.provider_usage.entry(entry.name().to_string()).or_insert(0) += 1;

                    return Ok(response);
                }
                Err(err) => {
                    tracing::warn!(provider = entry.name(), error = %err, "provider failed, trying next in chain");
                    let mut metrics = self.metrics.lock().expect("failover metrics lock poisoned");
                    metrics.failed_requests += 1;
                }
            }
        }

        tracing::error!(%conversation_id, "all providers in failover chain failed");
        Ok(LLMResponse::apology(RouterError::AllProvidersFailed.to_string()))
    }

    pub fn metrics(&self) -> FailoverMetrics {
        self.metrics.lock().expect("failover metrics lock poisoned").clone()
    }

    pub fn context_store(&self) -> &Arc<ContextStore> {
        &self.context_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextStoreConfig;
    use crate::lifecycle::LifecycleManager;
    use crate::provider::{Behavior, TestProvider};
    use crate::registry::ModelRegistry;

    fn context_store() -> Arc<ContextStore> {
        Arc::new(ContextStore::in_memory(ContextStoreConfig {
            backend_url: None,
            ttl_seconds: 86_400,
            max_messages: 50,
            max_message_size: 10_000,
            enable_compression: true,
        }))
    }

    fn tiered_router(behavior: Behavior) -> Arc<Router> {
        let registry = Arc::new(ModelRegistry::default());
        let provider: Arc<dyn Provider> = Arc::new(TestProvider::new("local", behavior));
        let lifecycle = Arc::new(LifecycleManager::new(provider.clone(), 3, 85.0, 15));
        Arc::new(Router::new(registry, lifecycle, provider, 2.0))
    }

    #[tokio::test]
    async fn primary_success_returns_response_without_fallback_flag() {
        let chain = vec![ChainEntry::Tiered { name: "local".into(), router: tiered_router(Behavior::Succeed { content: "hi there".into() }) }];
        let manager = FailoverManager::new(chain, context_store());
        let response = manager.generate("hello", "conv-1").await.unwrap();
        assert_eq!(response.content, "hi there");
        assert!(!response.fallback_used);
        assert_eq!(manager.metrics().successful_requests, 1);
    }

    #[tokio::test]
    async fn falls_back_to_second_entry_after_first_fails() {
        let failing = Arc::new(TestProvider::new("down", Behavior::Fail("boom".into())));
        let registry = Arc::new(ModelRegistry::default());
        let failing_lifecycle = Arc::new(LifecycleManager::new(failing.clone() as Arc<dyn Provider>, 3, 85.0, 15));
        let failing_router = Arc::new(Router::new(registry, failing_lifecycle, failing, 2.0));

        let chain = vec![
            ChainEntry::Tiered { name: "primary".into(), router: failing_router },
            ChainEntry::Tiered { name: "secondary".into(), router: tiered_router(Behavior::Succeed { content: "fallback ok".into() }) },
        ];
        let manager = FailoverManager::new(chain, context_store());
        let response = manager.generate("hello", "conv-2").await.unwrap();
        assert_eq!(response.content, "fallback ok");
        assert!(response.fallback_used);
        assert_eq!(manager.metrics().fallback_requests, 1);
    }

    #[tokio::test]
    async fn all_providers_failing_returns_apology_not_error() {
        let chain = vec![ChainEntry::Tiered { name: "only".into(), router: tiered_router(Behavior::Fail("down".into())) }];
        let manager = FailoverManager::new(chain, context_store());
        let response = manager.generate("hello", "conv-3").await.unwrap();
        assert!(response.fallback_used);
        assert_eq!(response.provider, "none");
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn empty_query_is_invalid_input() {
        let chain = vec![ChainEntry::Tiered { name: "only".into(), router: tiered_router(Behavior::Succeed { content: "x".into() }) }];
        let manager = FailoverManager::new(chain, context_store());
        let err = manager.generate("   ", "conv-4").await.unwrap_err();
        assert!(matches!(err, RouterError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn successful_turn_persists_context_with_both_messages() {
        let chain = vec![ChainEntry::Tiered { name: "only".into(), router: tiered_router(Behavior::Succeed { content: "reply".into() }) }];
        let store = context_store();
        let manager = FailoverManager::new(chain, store.clone());
        manager.generate("remember that I prefer dark mode", "conv-5").await.unwrap();

        let ctx = store.get("conv-5").await.unwrap();
        assert_eq!(ctx.messages.len(), 2);
        assert_eq!(ctx.messages[1].role, Role::Assistant);
    }
}
