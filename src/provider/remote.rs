//! Remote, OpenAI-compatible cloud provider, grounded on the teacher's
//! `src/brain/provider/custom_openai_compatible.rs` (client builder,
//! bearer-auth headers, chat/completions request shape), trimmed to plain
//! text generation — tool calling is outside this crate's scope.

use super::error::{ProviderError, Result};
use super::r#trait::Provider;
use super::types::{GenerationParams, LLMResponse, ProviderMessage};
use crate::config::SecretString;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

/// HTTP-backed provider for an OpenAI-compatible cloud API.
#[derive(Clone)]
pub struct RemoteHttpProvider {
    name: String,
    base_url: String,
    api_key: Option<SecretString>,
    client: Client,
}

impl RemoteHttpProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: Option<SecretString>) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(DEFAULT_POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(2)
            .build()
            .expect("failed to build remote provider HTTP client");

        Self { name: name.into(), base_url: base_url.into().trim_end_matches('/').to_string(), api_key, client }
    }

    fn headers(&self) -> Result<reqwest::header::HeaderMap> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(key) = &self.api_key {
            let value: reqwest::header::HeaderValue = format!("Bearer {}", key.expose_secret().trim())
                .parse()
                .map_err(|_| ProviderError::InvalidApiKey)?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        headers.insert(reqwest::header::CONTENT_TYPE, "application/json".parse().expect("valid content-type"));
        Ok(headers)
    }

    fn transport_err(err: reqwest::Error) -> ProviderError {
        ProviderError::Transport(err.to_string())
    }
}

#[async_trait]
impl Provider for RemoteHttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    /// Cloud providers manage their own model residency; load/unload are
    /// no-ops that merely confirm reachability.
    async fn load(&self, _model: &str) -> Result<()> {
        self.health().await
    }

    async fn unload(&self, _model: &str) -> Result<()> {
        Ok(())
    }

    async fn generate(
        &self,
        model: &str,
        messages: &[ProviderMessage],
        params: &GenerationParams,
        deadline: Duration,
    ) -> Result<LLMResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model,
            messages: messages.iter().map(|m| ChatMessage { role: m.role, content: m.content.clone() }).collect(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stream: false,
        };

        let start = Instant::now();
        let call = self.client.post(&url).headers(self.headers()?).json(&body).send();

        let resp = match tokio::time::timeout(deadline, call).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(err)) => return Err(Self::transport_err(err)),
            Err(_) => {
                return Err(ProviderError::Timeout {
                    elapsed_secs: start.elapsed().as_secs_f64(),
                    deadline_secs: deadline.as_secs_f64(),
                });
            }
        };

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status, body: text });
        }

        let parsed: ChatResponse = resp.json().await.map_err(Self::transport_err)?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Transport("empty choices array".to_string()))?;

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            provider: self.name.clone(),
            model: model.to_string(),
            response_time_seconds: start.elapsed().as_secs_f64(),
            token_count: parsed.usage.and_then(|u| u.completion_tokens),
            finish_reason: choice.finish_reason,
            error: None,
            fallback_used: false,
            timestamp: Utc::now(),
        })
    }

    async fn health(&self) -> Result<()> {
        let url = format!("{}/models", self.base_url);
        let resp = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(Self::transport_err)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::Unavailable(format!("health check returned {}", resp.status())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_skips_authorization_header() {
        let provider = RemoteHttpProvider::new("openai", "https://api.openai.com/v1", None);
        let headers = provider.headers().unwrap();
        assert!(!headers.contains_key(reqwest::header::AUTHORIZATION));
    }

    #[test]
    fn api_key_becomes_bearer_header() {
        let provider = RemoteHttpProvider::new(
            "openai",
            "https://api.openai.com/v1",
            Some(SecretString::new("sk-test".to_string())),
        );
        let headers = provider.headers().unwrap();
        assert!(headers.contains_key(reqwest::header::AUTHORIZATION));
    }
}
