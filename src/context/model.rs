//! Conversation context data model (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const TRUNCATION_MARKER: &str = "... [truncated]";
const DEFAULT_MAX_CONTEXT_LENGTH: u32 = 4000;
const MAX_USER_PREFERENCES: usize = 50;
const MAX_KEY_FACTS: usize = 100;
const MAX_MEMORY_KEYWORDS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub truncated: bool,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            truncated: false,
        }
    }

    /// Enforce the per-message size cap, suffixing and flagging oversized
    /// content rather than rejecting it (§3 invariant).
    pub fn enforce_max_size(&mut self, max_message_size: usize) {
        if self.content.len() > max_message_size {
            self.content = if max_message_size <= TRUNCATION_MARKER.len() {
                TRUNCATION_MARKER.chars().take(max_message_size).collect()
            } else {
                let keep = max_message_size - TRUNCATION_MARKER.len();
                let mut truncated: String = self.content.chars().take(keep).collect();
                truncated.push_str(TRUNCATION_MARKER);
                truncated
            };
            self.truncated = true;
        }
    }
}

/// Reserved metadata keys plus an open extension map for forward
/// compatibility (Design Notes §9: tagged variant + untyped extension).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_messages: usize,
    pub pruned_at: Option<DateTime<Utc>>,
    pub original_message_count: Option<usize>,
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactType {
    Fact,
    Context,
}

/// A learned user preference, keyed by synthetic `pref_N` in
/// [`ConversationContext::user_preferences`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preference {
    pub content: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub keywords: Vec<String>,
}

/// A mined fact or high-salience context cue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFact {
    pub content: String,
    pub fact_type: FactType,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub source_turn: u64,
    pub keywords: Vec<String>,
}

/// Durable per-conversation state (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub metadata: ContextMetadata,
    #[serde(default)]
    pub user_preferences: BTreeMap<String, Preference>,
    #[serde(default)]
    pub key_facts: Vec<KeyFact>,
    #[serde(default)]
    pub interaction_summary: String,
    #[serde(default)]
    pub memory_keywords: BTreeSet<String>,
    pub memory_last_updated: Option<DateTime<Utc>>,
    #[serde(default = "default_max_context_length")]
    pub max_context_length: u32,
}

fn default_max_context_length() -> u32 {
    DEFAULT_MAX_CONTEXT_LENGTH
}

impl ConversationContext {
    pub fn new(conversation_id: String) -> Self {
        Self {
            conversation_id,
            messages: Vec::new(),
            metadata: ContextMetadata::default(),
            user_preferences: BTreeMap::new(),
            key_facts: Vec::new(),
            interaction_summary: String::new(),
            memory_keywords: BTreeSet::new(),
            memory_last_updated: None,
            max_context_length: DEFAULT_MAX_CONTEXT_LENGTH,
        }
    }

    /// Append a message, trimming to `max_context_length` if needed. This is
    /// the coarse trim-on-append knob; the [`crate::context::ContextStore`]
    /// applies the separate, typically-tighter `max_messages` pruning
    /// threshold on `update`.
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        let cap = self.max_context_length as usize;
        if self.messages.len() > cap {
            let overflow = self.messages.len() - cap;
            self.messages.drain(0..overflow);
        }
    }

    /// Insert a preference under a synthetic key, capped at
    /// [`MAX_USER_PREFERENCES`] by simply refusing insertion once full —
    /// callers extracting many preferences per turn should prefer the
    /// highest-confidence ones first.
    pub fn add_preference(&mut self, pref: Preference) {
        if self.user_preferences.len() >= MAX_USER_PREFERENCES {
            return;
        }
        let key = format!("pref_{}", self.user_preferences.len());
        self.user_preferences.insert(key, pref);
    }

    /// Insert a fact/context-cue, re-sorting and truncating to
    /// [`MAX_KEY_FACTS`] by `(confidence, timestamp)` when over budget.
    pub fn add_key_fact(&mut self, fact: KeyFact) {
        self.key_facts.push(fact);
        if self.key_facts.len() > MAX_KEY_FACTS {
            self.key_facts.sort_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.timestamp.cmp(&b.timestamp))
            });
            let drop = self.key_facts.len() - MAX_KEY_FACTS;
            self.key_facts.drain(0..drop);
        }
    }

    /// Merge new keywords monotonically, capped at [`MAX_MEMORY_KEYWORDS`].
    pub fn merge_keywords<I: IntoIterator<Item = String>>(&mut self, keywords: I) {
        for kw in keywords {
            if self.memory_keywords.len() >= MAX_MEMORY_KEYWORDS && !self.memory_keywords.contains(&kw) {
                continue;
            }
            self.memory_keywords.insert(kw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_message_trims_to_max_context_length() {
        let mut ctx = ConversationContext::new("c1".into());
        ctx.max_context_length = 3;
        for i in 0..5 {
            ctx.add_message(Message::new(Role::User, format!("msg {i}")));
        }
        assert_eq!(ctx.messages.len(), 3);
        assert_eq!(ctx.messages[0].content, "msg 2");
    }

    #[test]
    fn enforce_max_size_truncates_and_flags() {
        let mut msg = Message::new(Role::User, "a".repeat(20));
        msg.enforce_max_size(10);
        assert!(msg.truncated);
        assert!(msg.content.len() <= 10);
        assert!(msg.content.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn key_facts_cap_evicts_lowest_confidence() {
        let mut ctx = ConversationContext::new("c1".into());
        for i in 0..105 {
            ctx.add_key_fact(KeyFact {
                content: format!("fact {i}"),
                fact_type: FactType::Fact,
                confidence: (i as f64) / 105.0,
                timestamp: Utc::now(),
                source_turn: i as u64,
                keywords: vec![],
            });
        }
        assert_eq!(ctx.key_facts.len(), 100);
        assert!(ctx.key_facts.iter().all(|f| f.confidence > 0.0));
    }

    #[test]
    fn memory_keywords_cap_at_fifty() {
        let mut ctx = ConversationContext::new("c1".into());
        ctx.merge_keywords((0..80).map(|i| format!("kw{i}")));
        assert!(ctx.memory_keywords.len() <= 50);
    }
}
