//! Gemini REST backend with model discovery and rate-limit retry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::backend::CompletionBackend;
use crate::retry::{retry_hint_from_body, retry_hint_from_header, RetryPolicy};
use lexi_core::{Error, LlmSettings, Result};

/// Generation model preferences, most preferred first (substring match).
pub const GENERATION_PREFERENCES: &[&str] = &[
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-flash",
    "gemini-pro",
];

/// Name fragments that mark experimental variants.
const EXCLUDED_FRAGMENTS: &[&str] = &["exp", "thinking"];

const EMBEDDING_PREFERENCE: &str = "text-embedding";

/// One entry of the provider's model listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    fn supports(&self, method: &str) -> bool {
        self.supported_generation_methods.iter().any(|m| m == method)
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// Model names selected for this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModels {
    pub generation: String,
    pub embedding: String,
}

/// Choose generation and embedding models from a listing.
///
/// Generation: first preference that some generateContent model name contains
/// (skipping experimental and thinking variants), else the first
/// generateContent model. Embedding: first embedContent model whose name
/// contains `text-embedding`, else the first embedContent model, else the
/// default.
pub fn select_models(models: &[ModelInfo], defaults: &ResolvedModels) -> Result<ResolvedModels> {
    let generation: Vec<&ModelInfo> = models
        .iter()
        .filter(|m| m.supports("generateContent"))
        .collect();
    if generation.is_empty() {
        return Err(Error::Upstream(
            "No models found that support generateContent".into(),
        ));
    }

    let preferred = GENERATION_PREFERENCES.iter().find_map(|pref| {
        generation.iter().find(|m| {
            m.name.contains(pref) && !EXCLUDED_FRAGMENTS.iter().any(|x| m.name.contains(x))
        })
    });
    let chosen = preferred.unwrap_or(&generation[0]);

    let embedding_models: Vec<&ModelInfo> = models
        .iter()
        .filter(|m| m.supports("embedContent"))
        .collect();
    let embedding = embedding_models
        .iter()
        .find(|m| m.name.contains(EMBEDDING_PREFERENCE))
        .or_else(|| embedding_models.first())
        .map(|m| m.name.clone())
        .unwrap_or_else(|| defaults.embedding.clone());

    Ok(ResolvedModels {
        generation: chosen.name.clone(),
        embedding,
    })
}

/// `models/<name>` form used in request paths.
fn model_path(name: &str) -> String {
    if name.starts_with("models/") {
        name.to_string()
    } else {
        format!("models/{}", name)
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Completion client for the Gemini `generateContent` / `embedContent` API.
pub struct GeminiClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
    defaults: ResolvedModels,
    models: OnceCell<ResolvedModels>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl GeminiClient {
    /// Build a client. Models are discovered on first use (or by [`Self::resolve_models`]).
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key: settings.gemini_api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            defaults: ResolvedModels {
                generation: settings.generation_model.clone(),
                embedding: settings.embedding_model.clone(),
            },
            models: OnceCell::new(),
            retry: RetryPolicy::default(),
            timeout: settings.timeout(),
        })
    }

    /// Build a client with models already chosen; no discovery call is made.
    pub fn with_models(settings: &LlmSettings, models: ResolvedModels) -> Result<Self> {
        let mut client = Self::new(settings)?;
        client.models = OnceCell::new_with(Some(models));
        Ok(client)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Per-request timeout for `generateContent` calls.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| Error::Config("GEMINI_API_KEY is not set".into()))
    }

    /// Selected models, running discovery on first call.
    ///
    /// Concurrent first calls wait on one discovery. A failed discovery is
    /// not cached, so the next call tries again.
    pub async fn resolve_models(&self) -> Result<&ResolvedModels> {
        self.models.get_or_try_init(|| self.discover()).await
    }

    async fn discover(&self) -> Result<ResolvedModels> {
        let key = self.api_key()?;
        info!("Discovering available Gemini models...");

        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .query(&[("key", key)])
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to list models: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "Failed to list models: {} - {}",
                status.as_u16(),
                truncate(&body, 500)
            )));
        }

        let listing: ModelList = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Invalid model listing: {}", e)))?;
        if listing.models.is_empty() {
            return Err(Error::Upstream("No models available from Gemini API".into()));
        }

        let resolved = select_models(&listing.models, &self.defaults)?;
        info!(
            "Selected generation model {}, embedding model {}",
            resolved.generation, resolved.embedding
        );
        Ok(resolved)
    }

    async fn try_embed(&self, text: &str) -> Result<Vec<f32>> {
        let models = self.resolve_models().await?;
        let key = self.api_key()?;
        let model = model_path(&models.embedding);
        let body = json!({
            "model": model,
            "content": { "parts": [{ "text": text }] },
            "taskType": "RETRIEVAL_DOCUMENT",
        });

        let response = self
            .http
            .post(format!("{}/{}:embedContent", self.base_url, model))
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "Embedding failed: {} - {}",
                status.as_u16(),
                truncate(&body, 200)
            )));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Invalid embedding response: {}", e)))?;
        let values = data["embedding"]["values"]
            .as_array()
            .map(|vals| {
                vals.iter()
                    .filter_map(|v| v.as_f64())
                    .map(|v| v as f32)
                    .collect()
            })
            .unwrap_or_default();
        Ok(values)
    }
}

/// First candidate's text from a `generateContent` reply.
fn candidate_text(data: &serde_json::Value) -> Result<String> {
    data["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::Upstream("Invalid response format from Gemini API".into()))
}

#[async_trait]
impl CompletionBackend for GeminiClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let models = self.resolve_models().await?;
        let key = self.api_key()?;
        let url = format!(
            "{}/{}:generateContent",
            self.base_url,
            model_path(&models.generation)
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": 0.7,
                "topK": 40,
                "topP": 0.95,
                "maxOutputTokens": max_tokens,
            }
        });

        let mut last_error = None;
        for attempt in 0..self.retry.max_attempts {
            debug!(
                "generateContent attempt {}/{} ({} prompt chars)",
                attempt + 1,
                self.retry.max_attempts,
                prompt.len()
            );
            let sent = self
                .http
                .post(&url)
                .query(&[("key", key)])
                .timeout(self.timeout)
                .json(&body)
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    warn!(
                        "Request timeout (attempt {}/{})",
                        attempt + 1,
                        self.retry.max_attempts
                    );
                    last_error = Some(Error::Upstream("Request timed out".into()));
                    if self.retry.has_next(attempt) {
                        tokio::time::sleep(self.retry.backoff(attempt)).await;
                    }
                    continue;
                }
                Err(e) => return Err(Error::Upstream(format!("Request failed: {}", e))),
            };

            let status = response.status();
            if status.is_success() {
                let data: serde_json::Value = response
                    .json()
                    .await
                    .map_err(|e| Error::Upstream(format!("Invalid response body: {}", e)))?;
                return candidate_text(&data);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let header_hint = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(retry_hint_from_header);
                let text = response.text().await.unwrap_or_default();
                let hint = header_hint.max(retry_hint_from_body(&text));
                let delay = self.retry.delay(attempt, hint);
                last_error = Some(Error::Upstream(format!(
                    "Rate limit exceeded: {}",
                    truncate(&text, 200)
                )));
                if self.retry.has_next(attempt) {
                    warn!(
                        "Rate limited (attempt {}/{}), waiting {:.1}s",
                        attempt + 1,
                        self.retry.max_attempts,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
                continue;
            }

            let text = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "Gemini API error: {} - {}",
                status.as_u16(),
                truncate(&text, 500)
            )));
        }

        Err(last_error.unwrap_or_else(|| Error::Upstream("Max retries exceeded".into())))
    }

    async fn embed(&self, text: &str) -> Vec<f32> {
        match self.try_embed(text).await {
            Ok(values) => {
                if values.is_empty() {
                    warn!("Embedding response had no values");
                }
                values
            }
            Err(e) => {
                warn!("Embedding unavailable: {}", e);
                Vec::new()
            }
        }
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
