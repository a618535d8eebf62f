//! Chat model client abstraction
//!
//! Provides a unified interface over chat-completion providers:
//! - OpenAI (chat completions API)
//! - Google Gemini (generateContent API)
//! - Scripted responses (development / tests)
//!
//! Provider selection follows a fallback chain: the configured primary
//! provider is tried first, then the configured fallback, and finally a
//! scripted model so the service still boots without any API key.

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Trait for chat completion generation
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a completion for a single prompt
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Check that the backend is reachable
    async fn ping(&self) -> Result<()>;
}

/// OpenAI chat completions client
pub struct OpenAiChatModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAiChatModel {
    /// Create a new OpenAI chat client
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    async fn make_request(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::ModelUnavailable {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ModelUnavailable {
                message: format!("API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse =
            response.json().await.map_err(|e| AppError::ModelUnavailable {
                message: format!("Failed to parse response: {}", e),
            })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::ModelUnavailable {
                message: "Empty response from chat model".to_string(),
            })
    }

    /// Make request with retry
    async fn request_with_retry(&self, prompt: &str) -> Result<String> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                // Exponential backoff
                let delay = Duration::from_millis(100 * (2_u64.pow(attempt)));
                tokio::time::sleep(delay).await;
            }

            match self.make_request(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %e,
                        "Chat completion request failed, retrying"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::ModelUnavailable {
            message: "Unknown error after retries".to_string(),
        }))
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let result = self.request_with_retry(prompt).await;
        crate::metrics::record_llm_call(
            start.elapsed().as_secs_f64(),
            &self.model,
            result.is_ok(),
        );
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| AppError::ModelUnavailable {
                message: format!("Ping failed: {}", e),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::ModelUnavailable {
                message: format!("Ping returned {}", response.status()),
            })
        }
    }
}

/// Google Gemini client (generateContent API)
pub struct GeminiChatModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: usize,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

impl GeminiChatModel {
    /// Create a new Gemini client
    pub fn new(config: &LlmConfig, api_key: String, model: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ChatModel for GeminiChatModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        };

        let result: Result<String> = async {
            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| AppError::ModelUnavailable {
                    message: format!("Request failed: {}", e),
                })?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::ModelUnavailable {
                    message: format!("API error {}: {}", status, body),
                });
            }

            let gemini: GeminiResponse =
                response.json().await.map_err(|e| AppError::ModelUnavailable {
                    message: format!("Failed to parse response: {}", e),
                })?;

            gemini
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content.parts.into_iter().next())
                .map(|p| p.text)
                .ok_or_else(|| AppError::ModelUnavailable {
                    message: "Empty response from chat model".to_string(),
                })
        }
        .await;

        crate::metrics::record_llm_call(
            start.elapsed().as_secs_f64(),
            &self.model,
            result.is_ok(),
        );
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/v1beta/models?key={}", self.base_url, self.api_key);
        let response =
            self.client.get(&url).send().await.map_err(|e| AppError::ModelUnavailable {
                message: format!("Ping failed: {}", e),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::ModelUnavailable {
                message: format!("Ping returned {}", response.status()),
            })
        }
    }
}

/// Scripted chat model for development and tests
///
/// Returns responses from a fixed list, cycling once exhausted.
pub struct ScriptedChatModel {
    responses: Mutex<(Vec<String>, usize)>,
}

impl ScriptedChatModel {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new((responses, 0)),
        }
    }

    /// Default script covering routing and answer synthesis prompts
    pub fn with_default_script() -> Self {
        Self::new(vec![
            "(A) Vector Search".to_string(),
            "(B) Graph Query".to_string(),
            "FastAPI has components like routers, middleware, and dependency injection."
                .to_string(),
            "FastAPI uses Pydantic for request validation.".to_string(),
        ])
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        let mut guard = self
            .responses
            .lock()
            .map_err(|_| AppError::Internal {
                message: "Scripted model lock poisoned".to_string(),
            })?;
        let (responses, cursor) = &mut *guard;
        if responses.is_empty() {
            return Err(AppError::ModelUnavailable {
                message: "Scripted model has no responses".to_string(),
            });
        }
        let response = responses[*cursor % responses.len()].clone();
        *cursor += 1;
        Ok(response)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

fn build_provider(
    provider: &str,
    api_key: Option<&str>,
    config: &LlmConfig,
) -> Option<Arc<dyn ChatModel>> {
    match provider {
        "openai" => {
            let key = api_key?;
            OpenAiChatModel::new(config, key.to_string())
                .ok()
                .map(|m| Arc::new(m) as Arc<dyn ChatModel>)
        }
        "gemini" => {
            let key = api_key?;
            // The configured model name only applies to the primary
            // provider; the fallback uses Gemini's lightweight default.
            let model = if config.provider == "gemini" {
                config.model.clone()
            } else {
                "gemini-2.0-flash".to_string()
            };
            GeminiChatModel::new(config, key.to_string(), model)
                .ok()
                .map(|m| Arc::new(m) as Arc<dyn ChatModel>)
        }
        "mock" => Some(Arc::new(ScriptedChatModel::with_default_script())),
        _ => None,
    }
}

/// Build a chat model from configuration, walking the fallback chain.
///
/// Order: primary provider, then the configured fallback provider, then a
/// scripted model with a warning so development setups still work.
pub fn build_chat_model(config: &LlmConfig) -> Arc<dyn ChatModel> {
    if let Some(model) = build_provider(&config.provider, config.api_key.as_deref(), config) {
        tracing::info!(provider = %config.provider, model = model.model_name(), "Chat model initialized");
        return model;
    }

    if let Some(fallback) = &config.fallback_provider {
        if let Some(model) = build_provider(fallback, config.fallback_api_key.as_deref(), config) {
            tracing::warn!(
                primary = %config.provider,
                fallback = %fallback,
                "Primary chat provider unavailable, using fallback"
            );
            return model;
        }
    }

    tracing::warn!(
        "No chat provider configured, using scripted responses - set an API key for production"
    );
    Arc::new(ScriptedChatModel::with_default_script())
}
