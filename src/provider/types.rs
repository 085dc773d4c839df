//! Shared provider request/response types (§3 `LLMResponse`, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A role-tagged message as handed to a provider's `generate`, decoupled
/// from [`crate::context::Message`] so provider code does not depend on the
/// context store's truncation bookkeeping.
#[derive(Debug, Clone)]
pub struct ProviderMessage {
    pub role: &'static str,
    pub content: String,
}

impl ProviderMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system", content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user", content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant", content: content.into() }
    }
}

impl From<&crate::context::Message> for ProviderMessage {
    fn from(m: &crate::context::Message) -> Self {
        match m.role {
            crate::context::Role::User => ProviderMessage::user(m.content.clone()),
            crate::context::Role::Assistant => ProviderMessage::assistant(m.content.clone()),
            crate::context::Role::System => ProviderMessage::system(m.content.clone()),
        }
    }
}

/// Generation parameters honored per §4.3 ("honors `temperature`,
/// `max_tokens`, `num_ctx` from the tier config and caller overrides").
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub num_ctx: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self { temperature: 0.7, max_tokens: 2048, num_ctx: 4096 }
    }
}

impl GenerationParams {
    pub fn from_model_config(config: &crate::registry::ModelConfig) -> Self {
        Self {
            temperature: 0.7,
            max_tokens: config.max_tokens,
            num_ctx: config.context_window,
        }
    }
}

/// Produced by C3 and returned (enriched with routing metadata) by C5/C6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub response_time_seconds: f64,
    pub token_count: Option<u32>,
    pub finish_reason: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub fallback_used: bool,
    pub timestamp: DateTime<Utc>,
}

impl LLMResponse {
    pub fn apology(error: impl Into<String>) -> Self {
        Self {
            content: "I'm sorry, I'm unable to process your request right now. Please try again shortly.".to_string(),
            provider: "none".to_string(),
            model: "none".to_string(),
            response_time_seconds: 0.0,
            token_count: None,
            finish_reason: None,
            error: Some(error.into()),
            fallback_used: true,
            timestamp: Utc::now(),
        }
    }
}
