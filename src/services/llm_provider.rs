use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::{LlmConfig, LlmProviderConfig};

/// Multi-provider LLM adapter. Tries the configured providers in order and
/// returns the first structured JSON success; every failure is logged with
/// its duration before falling through to the next provider.
#[derive(Debug)]
pub struct LlmProvider {
    config: LlmConfig,
    client: reqwest::Client,
    mock_responses: Mutex<VecDeque<serde_json::Value>>,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub temperature: Option<f32>,
    pub timeout_secs: Option<u64>,
    /// Tag for logs/metrics ("sentence_generation", "mapping_verification").
    pub task_type: &'static str,
    pub model_override: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm is disabled")]
    Disabled,
    #[error("all llm providers failed")]
    AllProvidersFailed,
    #[error("llm returned non-JSON output: {0}")]
    InvalidResponse(String),
}

impl LlmProvider {
    pub fn new(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config: config.clone(),
            client,
            mock_responses: Mutex::new(VecDeque::new()),
        }
    }

    /// Validate LLM configuration at startup. Panics when real mode is
    /// enabled with no usable provider, so misconfiguration fails fast
    /// instead of surfacing as background-task noise.
    pub fn validate_config(config: &LlmConfig) {
        if config.enabled && !config.mock && config.providers.is_empty() {
            panic!(
                "Invalid LLM configuration: enabled=true, mock=false, but no \
                 provider has an API key. Set {{NAME}}_API_KEY for at least \
                 one entry in LLM_PROVIDERS, or set LLM_MOCK=true."
            );
        }
    }

    /// Bounded retry budget for generation loops that re-prompt on
    /// validation failure.
    pub fn max_generation_retries(&self) -> u32 {
        self.config.max_generation_retries
    }

    /// Whether generated word→lemma mappings get a second LLM opinion.
    pub fn verify_mappings_enabled(&self) -> bool {
        self.config.verify_mappings
    }

    /// Queue a canned response for mock mode (tests and local development).
    pub fn push_mock_response(&self, value: serde_json::Value) {
        self.mock_responses
            .lock()
            .expect("mock queue poisoned")
            .push_back(value);
    }

    /// Call the provider chain and return a structured JSON object.
    pub async fn generate_structured(
        &self,
        prompt: &str,
        system_prompt: &str,
        options: &GenerateOptions,
    ) -> Result<serde_json::Value, LlmError> {
        if !self.config.enabled {
            return Err(LlmError::Disabled);
        }
        if self.config.mock {
            let queued = self
                .mock_responses
                .lock()
                .expect("mock queue poisoned")
                .pop_front();
            return Ok(queued.unwrap_or_else(|| serde_json::json!({})));
        }

        for provider in &self.config.providers {
            let start = Instant::now();
            match self
                .call_provider(provider, prompt, system_prompt, options)
                .await
            {
                Ok(value) => {
                    tracing::info!(
                        provider = %provider.name,
                        task_type = options.task_type,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "LLM call succeeded"
                    );
                    return Ok(value);
                }
                Err(err) => {
                    tracing::warn!(
                        provider = %provider.name,
                        task_type = options.task_type,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        error = %err,
                        "LLM provider failed, falling through"
                    );
                }
            }
        }

        Err(LlmError::AllProvidersFailed)
    }

    async fn call_provider(
        &self,
        provider: &LlmProviderConfig,
        prompt: &str,
        system_prompt: &str,
        options: &GenerateOptions,
    ) -> Result<serde_json::Value, LlmError> {
        let model = options
            .model_override
            .clone()
            .unwrap_or_else(|| provider.model.clone());
        let timeout = Duration::from_secs(
            options.timeout_secs.unwrap_or(self.config.timeout_secs),
        );

        let request = if provider.name == "anthropic" {
            self.client
                .post(&provider.api_url)
                .header("x-api-key", &provider.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&serde_json::json!({
                    "model": model,
                    "max_tokens": 2048,
                    "system": system_prompt,
                    "messages": [{"role": "user", "content": prompt}],
                    "temperature": options.temperature.unwrap_or(0.7),
                }))
        } else {
            self.client
                .post(&provider.api_url)
                .bearer_auth(&provider.api_key)
                .json(&serde_json::json!({
                    "model": model,
                    "messages": [
                        {"role": "system", "content": system_prompt},
                        {"role": "user", "content": prompt},
                    ],
                    "temperature": options.temperature.unwrap_or(0.7),
                    "response_format": {"type": "json_object"},
                }))
        };

        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?
            .error_for_status()
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let text = extract_content_text(&provider.name, &body)
            .ok_or_else(|| LlmError::InvalidResponse("missing content".to_string()))?;

        parse_json_response(&text)
    }
}

fn extract_content_text(provider_name: &str, body: &serde_json::Value) -> Option<String> {
    if provider_name == "anthropic" {
        body["content"][0]["text"].as_str().map(str::to_string)
    } else {
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
    }
}

/// Parse a model response as JSON, unwrapping markdown fences when present.
/// Providers wrap JSON in ```json blocks more often than not.
pub fn parse_json_response(text: &str) -> Result<serde_json::Value, LlmError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let unfenced = strip_markdown_fences(trimmed);
    serde_json::from_str(unfenced.trim())
        .map_err(|_| LlmError::InvalidResponse(truncate_for_log(trimmed)))
}

fn strip_markdown_fences(text: &str) -> &str {
    let Some(start) = text.find("```") else {
        return text;
    };
    let after_fence = &text[start + 3..];
    // Skip an optional language tag on the fence line
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    match body.rfind("```") {
        Some(end) => &body[..end],
        None => body,
    }
}

fn truncate_for_log(text: &str) -> String {
    const MAX: usize = 200;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(MAX).collect();
        format!("{truncated}…")
    }
}
