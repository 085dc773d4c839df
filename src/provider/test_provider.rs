//! In-process provider used by the router/failover manager's own tests and
//! by downstream consumers' tests (§9 "capability abstraction with variants
//! `{LocalHTTPProvider, RemoteHTTPProvider, TestProvider}`").

use super::error::{ProviderError, Result};
use super::r#trait::Provider;
use super::types::{GenerationParams, LLMResponse, ProviderMessage};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Canned behavior for a [`TestProvider`] call.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed { content: String },
    Fail(String),
    Timeout,
}

pub struct TestProvider {
    name: String,
    behavior: Behavior,
    delay: Duration,
    calls: AtomicU64,
}

impl TestProvider {
    pub fn new(name: impl Into<String>, behavior: Behavior) -> Self {
        Self { name: name.into(), behavior, delay: Duration::ZERO, calls: AtomicU64::new(0) }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Provider for TestProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, _model: &str) -> Result<()> {
        Ok(())
    }

    async fn unload(&self, _model: &str) -> Result<()> {
        Ok(())
    }

    async fn generate(
        &self,
        model: &str,
        _messages: &[ProviderMessage],
        _params: &GenerationParams,
        deadline: Duration,
    ) -> Result<LLMResponse> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay.min(deadline + Duration::from_secs(1))).await;
        }
        if self.delay > deadline {
            return Err(ProviderError::Timeout {
                elapsed_secs: self.delay.as_secs_f64(),
                deadline_secs: deadline.as_secs_f64(),
            });
        }

        match &self.behavior {
            Behavior::Succeed { content } => Ok(LLMResponse {
                content: content.clone(),
                provider: self.name.clone(),
                model: model.to_string(),
                response_time_seconds: self.delay.as_secs_f64(),
                token_count: Some(content.split_whitespace().count() as u32),
                finish_reason: Some("stop".to_string()),
                error: None,
                fallback_used: false,
                timestamp: Utc::now(),
            }),
            Behavior::Fail(message) => Err(ProviderError::Unavailable(message.clone())),
            Behavior::Timeout => Err(ProviderError::Timeout {
                elapsed_secs: deadline.as_secs_f64(),
                deadline_secs: deadline.as_secs_f64(),
            }),
        }
    }

    async fn health(&self) -> Result<()> {
        match &self.behavior {
            Behavior::Fail(message) => Err(ProviderError::Unavailable(message.clone())),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn succeed_behavior_returns_content() {
        let provider = TestProvider::new("t", Behavior::Succeed { content: "hi".to_string() });
        let resp = provider
            .generate("m", &[], &GenerationParams::default(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(resp.content, "hi");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn fail_behavior_returns_error() {
        let provider = TestProvider::new("t", Behavior::Fail("boom".to_string()));
        let result = provider
            .generate("m", &[], &GenerationParams::default(), Duration::from_secs(1))
            .await;
        assert!(result.is_err());
    }
}
