//! Gemini API Client
//!
//! Classifies files through `models/{model}:generateContent`, including:
//! - JSON-only responses via `responseMimeType`
//! - Spend tracking from `usageMetadata` against a USD ceiling
//! - Client-side request spacing and a short retry on rate limits

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::budget::{CostTracker, RateLimiter};
use super::json::parse_suggestions;
use super::{pick_for, prompts, Classifier, FileMetadata, Suggestion};
use crate::error::ClassifyError;
use crate::http_client::gemini_client;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Settings for the Gemini classifier
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Language the model writes folder names in
    pub language: String,
    pub requests_per_second: u32,
    /// USD ceiling; zero disables it
    pub max_cost: f64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.0-flash".to_string(),
            base_url: GEMINI_API_BASE.to_string(),
            language: "Portuguese".to_string(),
            requests_per_second: 10,
            max_cost: 5.0,
        }
    }
}

pub struct GeminiClassifier {
    config: GeminiConfig,
    system_prompt: String,
    rate_limiter: RateLimiter,
    costs: CostTracker,
}

impl GeminiClassifier {
    pub fn new(config: GeminiConfig) -> Result<Self, ClassifyError> {
        if config.api_key.trim().is_empty() {
            return Err(ClassifyError::MissingApiKey);
        }
        tracing::info!(model = %config.model, "Gemini classifier initialized");
        Ok(Self {
            system_prompt: prompts::system_prompt(&config.language),
            rate_limiter: RateLimiter::new(1, config.requests_per_second),
            costs: CostTracker::new(&config.model, config.max_cost),
            config,
        })
    }

    /// Estimated USD spent by this classifier so far
    pub fn spent(&self) -> f64 {
        self.costs.spent()
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: &self.system_prompt }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.8,
                max_output_tokens: 4096,
                response_mime_type: "application/json",
            },
        }
    }

    /// Send `prompt` and return the model's text answer
    async fn generate(&self, prompt: &str) -> Result<String, ClassifyError> {
        self.costs.check()?;
        self.rate_limiter.acquire().await;

        let body = self.request_body(prompt);
        let response = self.send_request(&body).await?;

        if let Some(usage) = &response.usage_metadata {
            self.costs
                .record(usage.prompt_token_count, usage.candidates_token_count);
        }

        response_text(&response).ok_or(ClassifyError::EmptyResponse)
    }

    /// Send request with retry logic
    async fn send_request(&self, body: &GenerateRequest<'_>) -> Result<GenerateResponse, ClassifyError> {
        let mut retry_delay = Duration::from_secs(2);
        let max_retries = 3;

        for retry in 0..=max_retries {
            if retry > 0 {
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let resp = gemini_client()
                .post(self.endpoint())
                .header("x-goog-api-key", &self.config.api_key)
                .json(body)
                .send()
                .await;

            match resp {
                Ok(r) if r.status().is_success() => {
                    return r
                        .json()
                        .await
                        .map_err(|e| ClassifyError::Network(format!("Failed to read response: {}", e)));
                }
                Ok(r) if (r.status() == 429 || r.status().is_server_error()) && retry < max_retries => {
                    tracing::warn!(status = r.status().as_u16(), retry = retry + 1, max_retries, "Gemini busy, retrying");
                    continue;
                }
                Ok(r) => {
                    let status = r.status().as_u16();
                    let text = r.text().await.unwrap_or_default();
                    return Err(ClassifyError::Api {
                        status,
                        message: api_message(&text),
                    });
                }
                Err(e) => {
                    if retry == max_retries {
                        return Err(ClassifyError::Network(e.to_string()));
                    }
                    tracing::warn!(error = %e, retry = retry + 1, "Gemini request failed, retrying");
                }
            }
        }

        Err(ClassifyError::Network("Max retries exceeded".to_string()))
    }

    async fn classify_one(&self, file: &FileMetadata, prompt: String) -> Result<Suggestion, ClassifyError> {
        let text = self.generate(&prompt).await?;
        let suggestions = parse_suggestions(&text)?;
        Ok(pick_for(&file.name, suggestions))
    }
}

#[async_trait]
impl Classifier for GeminiClassifier {
    async fn classify_batch(
        &self,
        files: &[FileMetadata],
        existing_folders: &[String],
    ) -> Result<Vec<Suggestion>, ClassifyError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(files = files.len(), "Sending classification prompt");
        let text = self
            .generate(&prompts::batch_prompt(files, existing_folders))
            .await?;
        parse_suggestions(&text)
    }

    async fn classify_with_content(
        &self,
        file: &FileMetadata,
        content: &str,
        existing_folders: &[String],
    ) -> Result<Suggestion, ClassifyError> {
        self.classify_one(file, prompts::content_prompt(file, content, existing_folders))
            .await
    }

    async fn classify_with_description(
        &self,
        file: &FileMetadata,
        description: &str,
        existing_folders: &[String],
    ) -> Result<Suggestion, ClassifyError> {
        self.classify_one(file, prompts::description_prompt(file, description, existing_folders))
            .await
    }
}

fn api_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Concatenated text parts of the first candidate, if any
fn response_text(response: &GenerateResponse) -> Option<String> {
    let candidate = response.candidates.first()?;
    let content = candidate.content.as_ref()?;
    let text: String = content.parts.iter().filter_map(|p| p.text.as_deref()).collect();
    (!text.trim().is_empty()).then_some(text)
}

// API request/response types

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}
