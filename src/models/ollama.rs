// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Ollama API client for local AI inference

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{GenerationOptions, LanguageModel, ModelRequest, Usage, UsageTracker};
use crate::{ImageSearchError, Result};

/// Ollama API client
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<&'a str>>,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        // Normalize URL
        let base_url = base_url
            .trim_end_matches('/')
            .replace("/api/generate", "")
            .replace("/api/chat", "");

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);

        self.client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                ImageSearchError::ModelUnavailable(format!(
                    "Cannot connect to Ollama at {}: {}",
                    self.base_url, e
                ))
            })?;

        Ok(())
    }

    /// List available models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Non-streaming generation, with the image attached when present
    async fn generate(
        &self,
        model: &str,
        request: &ModelRequest,
        options: GenerationOptions,
    ) -> Result<GenerateResponse> {
        let url = format!("{}/api/generate", self.base_url);

        let body = GenerateRequest {
            model,
            prompt: &request.user,
            system: &request.system,
            stream: false,
            images: request.image_b64.as_deref().map(|img| vec![img]),
            options: GenerateOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        debug!(
            "Sending {} request to Ollama: model={}",
            if body.images.is_some() { "vision" } else { "text" },
            model
        );

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(ImageSearchError::ModelUnavailable(format!(
                "Ollama returned status {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

/// One Ollama model exposed as a [`LanguageModel`]
pub struct OllamaModel {
    client: OllamaClient,
    model: String,
    options: GenerationOptions,
    usage: UsageTracker,
}

impl OllamaModel {
    pub fn new(
        client: OllamaClient,
        model: &str,
        options: GenerationOptions,
        cost_per_token: f64,
    ) -> Self {
        Self {
            client,
            model: model.to_string(),
            options,
            usage: UsageTracker::new(cost_per_token),
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn run(&self, request: &ModelRequest) -> String {
        match self.client.generate(&self.model, request, self.options).await {
            Ok(result) => {
                self.usage.record(result.prompt_eval_count, result.eval_count);
                result.response
            }
            Err(e) => {
                warn!("Can't invoke '{}': {}", self.model, e);
                String::new()
            }
        }
    }

    fn usage(&self) -> Usage {
        self.usage.snapshot()
    }

    async fn health_check(&self) -> Result<()> {
        self.client.health_check().await
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        self.client.list_models().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let client = OllamaClient::new("http://localhost:11434/api/generate/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_generate_request_shape() {
        let body = GenerateRequest {
            model: "llava",
            prompt: "Describe the following image in a paragraph.",
            system: "",
            stream: false,
            images: Some(vec!["aGVsbG8="]),
            options: GenerateOptions { temperature: 0.5, num_predict: 512 },
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["images"], serde_json::json!(["aGVsbG8="]));
        assert_eq!(json["options"]["num_predict"], 512);
        assert_eq!(json["stream"], false);
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_generate_response_without_counts() {
        let result: GenerateResponse = serde_json::from_str(r#"{"response": "A cat."}"#).unwrap();
        assert_eq!(result.response, "A cat.");
        assert_eq!(result.eval_count, 0);
    }

    #[tokio::test]
    async fn test_unreachable_backend_returns_empty_text() {
        // Port 9 (discard) is closed on test machines
        let client = OllamaClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let model = OllamaModel::new(
            client,
            "llava",
            GenerationOptions { max_tokens: 16, temperature: 0.0 },
            0.0,
        );

        let text = model.run(&ModelRequest::new("sys", "hello")).await;
        assert_eq!(text, "");
        assert_eq!(model.usage().calls, 0);
    }
}
