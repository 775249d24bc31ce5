// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! OpenAI-compatible chat completions client (llama.cpp server, vLLM, hosted gateways)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::{GenerationOptions, LanguageModel, ModelRequest, Usage, UsageTracker};
use crate::{ImageSearchError, Result};

/// Chat completions API client
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

impl ChatClient {
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        let base_url = base_url
            .trim_end_matches('/')
            .trim_end_matches("/chat/completions")
            .trim_end_matches("/v1")
            .to_string();

        Ok(Self {
            client,
            base_url,
            api_key: api_key.map(String::from),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.get(url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/v1/models", self.base_url);
        self.get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                ImageSearchError::ModelUnavailable(format!(
                    "Cannot connect to {}: {}",
                    self.base_url, e
                ))
            })?;
        Ok(())
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/v1/models", self.base_url);
        let list: ModelList = self.get(&url).send().await?.json().await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    async fn complete(
        &self,
        model: &str,
        request: &ModelRequest,
        options: GenerationOptions,
    ) -> Result<ChatResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = request_body(model, request, options);

        debug!("Chat completion request to {}: model={}", url, model);

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ImageSearchError::ModelUnavailable(format!(
                "Chat API returned {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }
}

/// JSON body for `/v1/chat/completions`; images travel as data URLs
fn request_body(model: &str, request: &ModelRequest, options: GenerationOptions) -> serde_json::Value {
    let user_content = match &request.image_b64 {
        Some(image) => json!([
            { "type": "text", "text": request.user },
            {
                "type": "image_url",
                "image_url": { "url": format!("data:image/png;base64,{}", image) }
            }
        ]),
        None => json!(request.user),
    };

    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": request.system },
            { "role": "user", "content": user_content }
        ],
        "max_tokens": options.max_tokens,
        "temperature": options.temperature,
    })
}

/// One chat-completions model exposed as a [`LanguageModel`]
pub struct ChatCompletionsModel {
    client: ChatClient,
    model: String,
    options: GenerationOptions,
    usage: UsageTracker,
}

impl ChatCompletionsModel {
    pub fn new(
        client: ChatClient,
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
impl LanguageModel for ChatCompletionsModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn run(&self, request: &ModelRequest) -> String {
        let response = match self.client.complete(&self.model, request, self.options).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Can't invoke '{}': {}", self.model, e);
                return String::new();
            }
        };

        if let Some(usage) = &response.usage {
            self.usage.record(usage.prompt_tokens, usage.completion_tokens);
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
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
