//! In-process fallback store, used when the durable backend is absent or
//! unreachable. A sharded-lock map (`dashmap`) protects the conversation
//! table; each entry is a full clone of the context, matching the "last
//! writer wins" trade-off documented in §4.7.

use super::model::ConversationContext;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    contexts: DashMap<String, ConversationContext>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            contexts: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, conversation_id: &str) -> ConversationContext {
        self.contexts
            .entry(conversation_id.to_string())
            .or_insert_with(|| ConversationContext::new(conversation_id.to_string()))
            .clone()
    }

    pub fn get(&self, conversation_id: &str) -> Option<ConversationContext> {
        self.contexts.get(conversation_id).map(|r| r.clone())
    }

    pub fn insert(&self, conversation_id: &str, ctx: ConversationContext) {
        self.contexts.insert(conversation_id.to_string(), ctx);
    }

    pub fn remove(&self, conversation_id: &str) {
        self.contexts.remove(conversation_id);
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Remove entries whose `metadata.last_updated` predates `cutoff`, or
    /// that lack a parseable timestamp entirely (treated as expired per
    /// §4.7 "timestamps that fail to parse are treated as expired").
    pub fn evict_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .contexts
            .iter()
            .filter(|entry| match entry.value().metadata.last_updated {
                Some(ts) => ts < cutoff,
                None => true,
            })
            .map(|entry| entry.key().clone())
            .collect();

        for key in &expired {
            self.contexts.remove(key);
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn get_or_create_is_idempotent_until_insert() {
        let backend = MemoryBackend::new();
        let first = backend.get_or_create("a");
        assert_eq!(first.conversation_id, "a");
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn evicts_stale_entries() {
        let backend = MemoryBackend::new();
        let mut ctx = ConversationContext::new("old".to_string());
        ctx.metadata.last_updated = Some(Utc::now() - Duration::hours(48));
        backend.insert("old", ctx);

        let mut fresh = ConversationContext::new("fresh".to_string());
        fresh.metadata.last_updated = Some(Utc::now());
        backend.insert("fresh", fresh);

        let cutoff = Utc::now() - Duration::hours(24);
        let removed = backend.evict_older_than(cutoff);
        assert_eq!(removed, 1);
        assert!(backend.get("old").is_none());
        assert!(backend.get("fresh").is_some());
    }

    #[test]
    fn missing_timestamp_is_treated_as_expired() {
        let backend = MemoryBackend::new();
        backend.insert("no-ts", ConversationContext::new("no-ts".to_string()));
        let removed = backend.evict_older_than(Utc::now());
        assert_eq!(removed, 1);
    }
}
