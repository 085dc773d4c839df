//! Tiered Router (C5)
//!
//! Combines the complexity analyzer (C1), model registry (C2), and lifecycle
//! manager (C4) to pick a tier per request, honoring load caps,
//! time-sensitivity, and a same-provider fallback ladder. Grounded on
//! `original_source/app/core/local_llm_router.py`'s `LocalLLMRouter`.

use crate::analyzer::{Complexity, ComplexityAnalyzer, QueryAnalysis};
use crate::context::ConversationContext;
use crate::error::{Result, RouterError};
use crate::lifecycle::LifecycleManager;
use crate::provider::{GenerationParams, LLMResponse, Provider, ProviderMessage};
use crate::registry::{ModelConfig, ModelRegistry, Tier};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Per-call deadline used for the POWERFUL tier's slower local inference
/// path (§5 "30s for slow local path in explicit high-complexity routes").
/// Open Question resolution: the deadline is tier-dependent, not a single
/// global value — see DESIGN.md.
const POWERFUL_TIER_DEADLINE_SECONDS: f64 = 30.0;

#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    pub selected_tier: Tier,
    pub model_config: ModelConfig,
    pub reasoning: String,
    pub confidence: f64,
    pub fallback_tier: Option<Tier>,
    pub estimated_response_time_seconds: f64,
}

#[derive(Debug, Default)]
struct TierTiming {
    count: u64,
    total_seconds: f64,
    total_tokens: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouterMetrics {
    pub routing_stats: BTreeMap<Tier, u64>,
    pub tier_performance: BTreeMap<Tier, f64>,
    pub current_load: BTreeMap<Tier, i64>,
    pub throughput_improvement_percent: f64,
    pub memory_efficiency_percent: f64,
}

fn base_tier(complexity: Complexity) -> Tier {
    match complexity {
        Complexity::Simple => Tier::Fast,
        Complexity::Moderate => Tier::Balanced,
        Complexity::Complex | Complexity::Critical => Tier::Powerful,
    }
}

fn fallback_for(tier: Tier) -> Option<Tier> {
    match tier {
        Tier::Powerful => Some(Tier::Balanced),
        Tier::Balanced => Some(Tier::Fast),
        Tier::Fast => None,
    }
}

pub struct Router {
    registry: Arc<ModelRegistry>,
    lifecycle: Arc<LifecycleManager>,
    provider: Arc<dyn Provider>,
    analyzer: ComplexityAnalyzer,
    tier_load: BTreeMap<Tier, AtomicI64>,
    tier_timing: Mutex<BTreeMap<Tier, TierTiming>>,
    primary_timeout_seconds: f64,
}

impl Router {
    pub fn new(
        registry: Arc<ModelRegistry>,
        lifecycle: Arc<LifecycleManager>,
        provider: Arc<dyn Provider>,
        primary_timeout_seconds: f64,
    ) -> Self {
        let mut tier_load = BTreeMap::new();
        let mut tier_timing = BTreeMap::new();
        for tier in Tier::ALL {
            tier_load.insert(tier, AtomicI64::new(0));
            tier_timing.insert(tier, TierTiming::default());
        }
        Self {
            registry,
            lifecycle,
            provider,
            analyzer: ComplexityAnalyzer::new(),
            tier_load,
            tier_timing: Mutex::new(tier_timing),
            primary_timeout_seconds,
        }
    }

    fn load_snapshot(&self, tier: Tier) -> i64 {
        self.tier_load[&tier].load(Ordering::SeqCst)
    }

    fn deadline_for(&self, tier: Tier) -> Duration {
        let secs = if tier == Tier::Powerful { POWERFUL_TIER_DEADLINE_SECONDS } else { self.primary_timeout_seconds };
        Duration::from_secs_f64(secs)
    }

    /// Pure tier-selection function; reads `tier_load` but performs no I/O.
    pub fn route(&self, query: &str, context: Option<&ConversationContext>) -> RoutingDecision {
        let analysis: QueryAnalysis = self.analyzer.analyze(query, context);
        let mut tier = base_tier(analysis.complexity);
        let mut reasoning = format!("complexity={:?} -> base tier {}", analysis.complexity, tier);

        if analysis.time_sensitive {
            let downgraded = match tier {
                Tier::Balanced => Some(Tier::Fast),
                Tier::Powerful if analysis.complexity != Complexity::Critical => Some(Tier::Balanced),
                _ => None,
            };
            if let Some(lower) = downgraded {
                reasoning.push_str(&format!("; time-sensitive downgrade to {lower}"));
                tier = lower;
            }
        }

        let capacity = self.registry.get(tier).concurrent_capacity as i64;
        if self.load_snapshot(tier) >= capacity {
            let alternate = match tier {
                Tier::Fast if self.load_snapshot(Tier::Balanced) < self.registry.get(Tier::Balanced).concurrent_capacity as i64 => {
                    Some(Tier::Balanced)
                }
                Tier::Balanced
                    if matches!(analysis.complexity, Complexity::Simple | Complexity::Moderate)
                        && self.load_snapshot(Tier::Fast) < self.registry.get(Tier::Fast).concurrent_capacity as i64 =>
                {
                    Some(Tier::Fast)
                }
                _ => None,
            };
            if let Some(alt) = alternate {
                reasoning.push_str(&format!("; {tier} saturated, load-adjusted to {alt}"));
                tier = alt;
            } else {
                reasoning.push_str(&format!("; {tier} saturated, no alternate capacity, queuing at {tier}"));
            }
        }

        let fallback_tier = fallback_for(tier);
        let model_config = self.registry.get(tier).clone();
        let estimated_response_time_seconds = (analysis.estimated_tokens as f64 / model_config.avg_tokens_per_second + 0.5)
            * (1.0 + 0.2 * self.load_snapshot(tier) as f64);

        RoutingDecision {
            selected_tier: tier,
            model_config,
            reasoning,
            confidence: analysis.confidence,
            fallback_tier,
            estimated_response_time_seconds,
        }
    }

    /// Route and generate, falling back once to `decision.fallback_tier` on
    /// failure. The load slot for whichever tier is attempted is always
    /// released before returning, success or failure (§5 "guaranteed-release
    /// handler").
    pub async fn generate(
        &self,
        query: &str,
        context: Option<&ConversationContext>,
    ) -> Result<(LLMResponse, RoutingDecision)> {
        if query.trim().is_empty() {
            return Err(RouterError::InvalidInput("query cannot be empty".to_string()));
        }

        let decision = self.route(query, context);
        let primary = self.try_tier(decision.selected_tier, query, context).await;

        match primary {
            Ok(response) => Ok((response, decision)),
            Err(err) => {
                if let Some(fallback_tier) = decision.fallback_tier {
                    tracing::warn!(tier = %decision.selected_tier, fallback = %fallback_tier, error = %err, "tier generation failed, attempting fallback");
                    let mut response = self.try_tier(fallback_tier, query, context).await?;
                    response.fallback_used = true;
                    Ok((response, decision))
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn try_tier(&self, tier: Tier, query: &str, context: Option<&ConversationContext>) -> Result<LLMResponse> {
        self.tier_load[&tier].fetch_add(1, Ordering::SeqCst);
        let outcome = self.try_tier_inner(tier, query, context).await;
        self.tier_load[&tier].fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn try_tier_inner(&self, tier: Tier, query: &str, context: Option<&ConversationContext>) -> Result<LLMResponse> {
        let model_config = self.registry.get(tier).clone();

        let loaded = self.lifecycle.load(&model_config.model_name, false).await?;
        if !loaded {
            return Err(RouterError::ModelLoadFailed {
                model: model_config.model_name.clone(),
                message: "lifecycle manager reported load failure".to_string(),
            });
        }

        let mut messages: Vec<ProviderMessage> = context
            .map(|ctx| ctx.messages.iter().map(ProviderMessage::from).collect())
            .unwrap_or_default();
        messages.push(ProviderMessage::user(query));

        let params = GenerationParams::from_model_config(&model_config);
        let deadline = self.deadline_for(tier);

        let response = self
            .provider
            .generate(&model_config.model_name, &messages, &params, deadline)
            .await
            .map_err(RouterError::from)?;

        let mut timing = self.tier_timing.lock().expect("tier timing lock poisoned");
        let entry = timing.entry(tier).or_default();
        entry.count += 1;
        entry.total_seconds += response.response_time_seconds;
        entry.total_tokens += response.token_count.unwrap_or(0) as u64;

        Ok(response)
    }

    pub async fn optimize_gpu_memory(&self) -> crate::lifecycle::metrics::ResourceMetrics {
        let _ = self.lifecycle.optimize_memory().await;
        self.lifecycle.resource_metrics()
    }

    pub fn metrics(&self) -> RouterMetrics {
        let timing = self.tier_timing.lock().expect("tier timing lock poisoned");

        let routing_stats: BTreeMap<Tier, u64> = timing.iter().map(|(t, s)| (*t, s.count)).collect();
        let tier_performance: BTreeMap<Tier, f64> = timing
            .iter()
            .map(|(t, s)| (*t, if s.count == 0 { 0.0 } else { s.total_seconds / s.count as f64 }))
            .collect();
        let current_load: BTreeMap<Tier, i64> = Tier::ALL.iter().map(|t| (*t, self.load_snapshot(*t))).collect();

        let baseline_tok_s = self.registry.get(Tier::Balanced).avg_tokens_per_second;
        let (total_tokens, total_seconds): (u64, f64) =
            timing.values().fold((0, 0.0), |(tok, sec), s| (tok + s.total_tokens, sec + s.total_seconds));
        let actual_avg_tok_s = if total_seconds > 0.0 { total_tokens as f64 / total_seconds } else { baseline_tok_s };
        let throughput_improvement_percent =
            ((baseline_tok_s - actual_avg_tok_s) / baseline_tok_s * 100.0).max(0.0);

        let resident_mb: u64 = self.lifecycle.resource_metrics().gpu_memory_used_mb;
        let catalog_mb: u32 = self.registry.all().iter().map(|c| c.gpu_memory_mb).sum();
        let memory_efficiency_percent = if catalog_mb == 0 {
            0.0
        } else {
            (1.0 - resident_mb as f64 / catalog_mb as f64) * 100.0
        };

        RouterMetrics {
            routing_stats,
            tier_performance,
            current_load,
            throughput_improvement_percent,
            memory_efficiency_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Behavior, TestProvider};

    fn router(behavior: Behavior) -> Router {
        let registry = Arc::new(ModelRegistry::default());
        let provider: Arc<dyn Provider> = Arc::new(TestProvider::new("t", behavior));
        let lifecycle = Arc::new(LifecycleManager::new(provider.clone(), 3, 85.0, 15));
        Router::new(registry, lifecycle, provider, 2.0)
    }

    #[test]
    fn simple_query_routes_to_fast_with_no_fallback() {
        let router = router(Behavior::Succeed { content: "ok".into() });
        let decision = router.route("Summarize this text briefly", None);
        assert_eq!(decision.selected_tier, Tier::Fast);
        assert!(decision.fallback_tier.is_none());
    }

    #[test]
    fn critical_query_routes_to_powerful_with_balanced_fallback() {
        let router = router(Behavior::Succeed { content: "ok".into() });
        let decision = router.route("Develop an advanced multi-agent system with complex reasoning", None);
        assert_eq!(decision.selected_tier, Tier::Powerful);
        assert_eq!(decision.fallback_tier, Some(Tier::Balanced));
    }

    #[test]
    fn saturated_fast_tier_upgrades_to_balanced() {
        let router = router(Behavior::Succeed { content: "ok".into() });
        router.tier_load[&Tier::Fast].store(8, Ordering::SeqCst);
        let decision = router.route("Summarize this", None);
        assert_eq!(decision.selected_tier, Tier::Balanced);
    }

    #[tokio::test]
    async fn generate_releases_load_slot_on_success() {
        let router = router(Behavior::Succeed { content: "ok".into() });
        let (_, decision) = router.generate("Summarize this text briefly", None).await.unwrap();
        assert_eq!(router.load_snapshot(decision.selected_tier), 0);
    }

    #[tokio::test]
    async fn generate_falls_back_on_primary_failure() {
        let router = router(Behavior::Fail("down".into()));
        let result = router.generate("Develop an advanced multi-agent algorithm", None).await;
        assert!(result.is_err(), "both tiers share the same failing provider in this test fixture");
    }

    #[tokio::test]
    async fn empty_query_is_invalid_input() {
        let router = router(Behavior::Succeed { content: "ok".into() });
        let err = router.generate("   ", None).await.unwrap_err();
        assert!(matches!(err, RouterError::InvalidInput(_)));
    }

    #[test]
    fn estimated_response_time_is_always_positive() {
        let router = router(Behavior::Succeed { content: "ok".into() });
        let decision = router.route("hi", None);
        assert!(decision.estimated_response_time_seconds > 0.0);
    }
}
