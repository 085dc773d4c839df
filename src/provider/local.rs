//! Local HTTP-based inference provider (Ollama-compatible), grounded on the
//! teacher's `custom_openai_compatible.rs` `reqwest::Client` builder pattern
//! and `original_source/app/services/ollama_manager_service.py`'s
//! `_api_load_model`/`_api_unload_model` use of `/api/pull` and
//! `/api/generate`.

use super::error::{ProviderError, Result};
use super::r#trait::Provider;
use super::types::{GenerationParams, LLMResponse, ProviderMessage};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Serialize)]
struct PullRequest<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    temperature: f32,
    num_ctx: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<i64>,
    options: GenerateOptions,
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    done_reason: Option<String>,
}

/// HTTP-backed provider for a local, Ollama-compatible inference server.
#[derive(Clone)]
pub struct LocalHttpProvider {
    name: String,
    base_url: String,
    client: Client,
}

impl LocalHttpProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(DEFAULT_POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(2)
            .build()
            .expect("failed to build local provider HTTP client");

        Self {
            name: "local".to_string(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn prompt_from_messages(messages: &[ProviderMessage]) -> String {
        messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn transport_err(err: reqwest::Error) -> ProviderError {
        ProviderError::Transport(err.to_string())
    }
}

#[async_trait]
impl Provider for LocalHttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, model: &str) -> Result<()> {
        let pull_url = format!("{}/api/pull", self.base_url);
        let resp = self
            .client
            .post(&pull_url)
            .json(&PullRequest { name: model })
            .send()
            .await
            .map_err(Self::transport_err)?;
        if !resp.status().is_success() {
            tracing::warn!(status = %resp.status(), "model pull returned non-success status");
        }

        let warmup_url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model,
            prompt: "Hello".to_string(),
            stream: false,
            keep_alive: None,
            options: GenerateOptions { num_predict: Some(1), temperature: 0.0, num_ctx: 2048 },
        };
        let resp = self
            .client
            .post(&warmup_url)
            .json(&body)
            .send()
            .await
            .map_err(Self::transport_err)?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            Err(ProviderError::Http { status, body: text })
        }
    }

    async fn unload(&self, model: &str) -> Result<()> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model,
            prompt: String::new(),
            stream: false,
            keep_alive: Some(0),
            options: GenerateOptions { num_predict: None, temperature: 0.0, num_ctx: 2048 },
        };
        // Any response (even an error body) indicates the unload request was
        // processed, matching `_api_unload_model`'s unconditional success.
        let _ = self.client.post(&url).json(&body).send().await;
        Ok(())
    }

    async fn generate(
        &self,
        model: &str,
        messages: &[ProviderMessage],
        params: &GenerationParams,
        deadline: Duration,
    ) -> Result<LLMResponse> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model,
            prompt: Self::prompt_from_messages(messages),
            stream: false,
            keep_alive: None,
            options: GenerateOptions {
                num_predict: Some(params.max_tokens),
                temperature: params.temperature,
                num_ctx: params.num_ctx,
            },
        };

        let start = Instant::now();
        let call = self.client.post(&url).json(&body).send();

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

        let parsed: GenerateResponse = resp.json().await.map_err(Self::transport_err)?;

        Ok(LLMResponse {
            content: parsed.response,
            provider: self.name.clone(),
            model: model.to_string(),
            response_time_seconds: start.elapsed().as_secs_f64(),
            token_count: parsed.eval_count,
            finish_reason: parsed.done_reason.or(parsed.done.then(|| "stop".to_string())),
            error: None,
            fallback_used: false,
            timestamp: Utc::now(),
        })
    }

    async fn health(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self.client.get(&url).send().await.map_err(Self::transport_err)?;
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

    #[tokio::test]
    async fn generate_times_out_against_unreachable_host() {
        let provider = LocalHttpProvider::new("http://127.0.0.1:1");
        let params = GenerationParams::default();
        let result = provider
            .generate("llama3.2:3b", &[ProviderMessage::user("hi")], &params, Duration::from_millis(50))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn prompt_joins_role_prefixed_lines() {
        let messages = vec![ProviderMessage::system("be terse"), ProviderMessage::user("hi")];
        let prompt = LocalHttpProvider::prompt_from_messages(&messages);
        assert!(prompt.contains("system: be terse"));
        assert!(prompt.contains("user: hi"));
    }
}
