//! Conversation Context Store (C7)
//!
//! Durable mapping `conversation_id -> ConversationContext` with pruning,
//! compression, and TTL refresh. Backed by Redis when a `backend_url` is
//! configured and reachable; transparently falls back to an in-process map
//! otherwise (§4.7) — callers never see a `BackendUnavailable` error, only a
//! logged warning.

mod memory_backend;
mod model;
mod redis_backend;

pub use model::{ContextMetadata, ConversationContext, FactType, KeyFact, Message, Preference, Role};

use crate::config::ContextStoreConfig;
use crate::error::{Result, RouterError};
use chrono::{Duration, Utc};
use memory_backend::MemoryBackend;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;

/// Aggregate memory/backend statistics for `admin/metrics()` and
/// diagnostics, grounded on `context_store.py::get_memory_usage`.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryUsageStats {
    pub redis_available: bool,
    pub memory_store_conversations: usize,
    pub max_messages_per_conversation: usize,
    pub ttl_seconds: u64,
    pub compression_enabled: bool,
}

/// Result of [`ContextStore::health`], grounded on
/// `context_store.py::health_check`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub redis_status: RedisStatus,
    pub redis_ping_ms: Option<f64>,
    pub memory_usage: MemoryUsageStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedisStatus {
    NotConfigured,
    Connected,
    Disconnected,
}

pub struct ContextStore {
    redis: Option<ConnectionManager>,
    fallback: MemoryBackend,
    config: ContextStoreConfig,
}

impl ContextStore {
    /// Connect to the configured durable backend. On any connection failure
    /// this logs a warning and falls back to the in-process map rather than
    /// returning an error — per §4.7/§7, `BackendUnavailable` is handled
    /// internally and never surfaces to the caller at construction time.
    pub async fn connect(config: ContextStoreConfig) -> Self {
        let redis = match &config.backend_url {
            Some(url) => match redis::Client::open(url.as_str()) {
                Ok(client) => match client.get_connection_manager().await {
                    Ok(manager) => {
                        tracing::info!(%url, "connected to redis context backend");
                        Some(manager)
                    }
                    Err(err) => {
                        tracing::warn!(%url, error = %err, "redis connection failed, using in-process fallback");
                        None
                    }
                },
                Err(err) => {
                    tracing::warn!(%url, error = %err, "invalid redis url, using in-process fallback");
                    None
                }
            },
            None => None,
        };

        Self {
            redis,
            fallback: MemoryBackend::new(),
            config,
        }
    }

    /// An in-process-only store, useful for tests and deployments with no
    /// durable backend configured.
    pub fn in_memory(config: ContextStoreConfig) -> Self {
        Self {
            redis: None,
            fallback: MemoryBackend::new(),
            config,
        }
    }

    /// Get or create the context for `conversation_id`, refreshing its TTL
    /// on a successful durable read.
    pub async fn get(&self, conversation_id: &str) -> Result<ConversationContext> {
        if conversation_id.is_empty() {
            return Err(RouterError::InvalidInput(
                "conversation_id cannot be empty".into(),
            ));
        }

        if let Some(manager) = &self.redis {
            let mut conn = manager.clone();
            let key = redis_backend::redis_key(conversation_id);
            match conn.get::<_, Option<String>>(&key).await {
                Ok(Some(data)) => match redis_backend::deserialize_envelope(&data) {
                    Ok(ctx) => {
                        let _: std::result::Result<(), _> =
                            conn.expire(&key, self.config.ttl_seconds as i64).await;
                        return Ok(ctx);
                    }
                    Err(err) => {
                        tracing::warn!(%conversation_id, error = %err, "failed to deserialize stored context, treating as missing");
                    }
                },
                Ok(None) => {
                    let ctx = ConversationContext::new(conversation_id.to_string());
                    return self.update(conversation_id, ctx).await;
                }
                Err(err) => {
                    tracing::warn!(%conversation_id, error = %err, "redis error on get, falling back to in-process store");
                }
            }
        }

        Ok(self.fallback.get_or_create(conversation_id))
    }

    /// Validate, prune, compress, and persist `ctx` under `conversation_id`,
    /// refreshing TTL. Returns the context as actually stored (post
    /// validation/pruning) so callers can observe truncation/eviction.
    pub async fn update(
        &self,
        conversation_id: &str,
        mut ctx: ConversationContext,
    ) -> Result<ConversationContext> {
        if conversation_id.is_empty() {
            return Err(RouterError::InvalidInput(
                "conversation_id cannot be empty".into(),
            ));
        }

        for message in &mut ctx.messages {
            message.enforce_max_size(self.config.max_message_size);
        }

        if ctx.messages.len() > self.config.max_messages {
            let original = ctx
                .metadata
                .original_message_count
                .unwrap_or(ctx.metadata.total_messages)
                .max(ctx.messages.len());
            let overflow = ctx.messages.len() - self.config.max_messages;
            ctx.messages.drain(0..overflow);
            ctx.metadata.pruned_at = Some(Utc::now());
            ctx.metadata.original_message_count = Some(original);
        }

        ctx.metadata.last_updated = Some(Utc::now());
        ctx.metadata.total_messages = ctx.messages.len();

        if let Some(manager) = &self.redis {
            let mut conn = manager.clone();
            let key = redis_backend::redis_key(conversation_id);
            let envelope = redis_backend::serialize_envelope(&ctx, self.config.enable_compression);
            match conn
                .set_ex::<_, _, ()>(&key, envelope, self.config.ttl_seconds)
                .await
            {
                Ok(()) => {
                    self.fallback.remove(conversation_id);
                    return Ok(ctx);
                }
                Err(err) => {
                    tracing::warn!(%conversation_id, error = %err, "redis error on update, falling back to in-process store");
                }
            }
        }

        self.fallback.insert(conversation_id, ctx.clone());
        Ok(ctx)
    }

    /// Remove a conversation from both the durable backend and the
    /// in-process fallback.
    pub async fn clear(&self, conversation_id: &str) {
        if let Some(manager) = &self.redis {
            let mut conn = manager.clone();
            let key = redis_backend::redis_key(conversation_id);
            let _: std::result::Result<(), _> = conn.del(&key).await;
        }
        self.fallback.remove(conversation_id);
    }

    /// Walk the in-process fallback and remove entries older than
    /// `ttl_seconds`; the durable backend handles its own expiry natively.
    pub async fn cleanup_expired(&self) -> usize {
        let cutoff = Utc::now() - Duration::seconds(self.config.ttl_seconds as i64);
        self.fallback.evict_older_than(cutoff)
    }

    pub fn memory_usage(&self) -> MemoryUsageStats {
        MemoryUsageStats {
            redis_available: self.redis.is_some(),
            memory_store_conversations: self.fallback.len(),
            max_messages_per_conversation: self.config.max_messages,
            ttl_seconds: self.config.ttl_seconds,
            compression_enabled: self.config.enable_compression,
        }
    }

    pub async fn health(&self) -> HealthStatus {
        let (redis_status, redis_ping_ms) = if let Some(manager) = &self.redis {
            let mut conn = manager.clone();
            let start = std::time::Instant::now();
            match redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await
            {
                Ok(_) => (RedisStatus::Connected, Some(start.elapsed().as_secs_f64() * 1000.0)),
                Err(err) => {
                    tracing::warn!(error = %err, "redis health check failed");
                    (RedisStatus::Disconnected, None)
                }
            }
        } else {
            (RedisStatus::NotConfigured, None)
        };

        HealthStatus {
            healthy: redis_status != RedisStatus::Disconnected,
            redis_status,
            redis_ping_ms,
            memory_usage: self.memory_usage(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ContextStore {
        ContextStore::in_memory(ContextStoreConfig {
            backend_url: None,
            ttl_seconds: 86_400,
            max_messages: 50,
            max_message_size: 10_000,
            enable_compression: true,
        })
    }

    #[tokio::test]
    async fn get_creates_new_context() {
        let store = store();
        let ctx = store.get("conv-1").await.unwrap();
        assert_eq!(ctx.conversation_id, "conv-1");
        assert!(ctx.messages.is_empty());
    }

    #[tokio::test]
    async fn empty_conversation_id_is_invalid_input() {
        let store = store();
        let err = store.get("").await.unwrap_err();
        assert!(matches!(err, RouterError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn round_trip_clear_then_get_returns_new() {
        let store = store();
        let mut ctx = store.get("conv-2").await.unwrap();
        ctx.messages.push(Message::new(Role::User, "hi"));
        store.update("conv-2", ctx).await.unwrap();

        store.clear("conv-2").await;
        let fresh = store.get("conv-2").await.unwrap();
        assert!(fresh.messages.is_empty());
    }

    #[tokio::test]
    async fn update_prunes_to_max_messages() {
        let store = store();
        let mut ctx = ConversationContext::new("conv-3".into());
        ctx.max_context_length = 1000;
        for i in 0..60 {
            ctx.add_message(Message::new(Role::User, format!("m{i}")));
        }
        let saved = store.update("conv-3", ctx).await.unwrap();
        assert_eq!(saved.messages.len(), 50);
        assert_eq!(saved.messages[0].content, "m10");
        assert!(saved.metadata.pruned_at.is_some());
    }

    #[tokio::test]
    async fn update_truncates_oversized_messages() {
        let store = store();
        let mut ctx = ConversationContext::new("conv-4".into());
        ctx.messages.push(Message::new(Role::User, "a".repeat(20_000)));
        let saved = store.update("conv-4", ctx).await.unwrap();
        assert!(saved.messages[0].truncated);
        assert!(saved.messages[0].content.len() <= 10_000);
    }

    #[tokio::test]
    async fn cleanup_expired_removes_stale_entries() {
        let store = store();
        let mut ctx = ConversationContext::new("conv-5".into());
        ctx.metadata.last_updated = Some(Utc::now() - Duration::hours(48));
        store.fallback.insert("conv-5", ctx);

        let removed = store.cleanup_expired().await;
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn health_reports_not_configured_without_redis() {
        let store = store();
        let health = store.health().await;
        assert_eq!(health.redis_status, RedisStatus::NotConfigured);
        assert!(health.healthy);
    }
}
