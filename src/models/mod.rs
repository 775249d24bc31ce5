// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Language model backends behind a single `run(request) -> text` capability

pub mod chat;
pub mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::{Backend, EngineConfig};
use crate::Result;

pub use self::chat::{ChatClient, ChatCompletionsModel};
pub use self::ollama::{OllamaClient, OllamaModel};

/// A single prompt for a model: system text, user text and an optional image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub system: String,
    pub user: String,
    /// Base64-encoded image for vision models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_b64: Option<String>,
}

impl ModelRequest {
    pub fn new(system: &str, user: &str) -> Self {
        Self {
            system: system.to_string(),
            user: user.to_string(),
            image_b64: None,
        }
    }

    pub fn with_image(mut self, image_b64: &str) -> Self {
        self.image_b64 = Some(image_b64.to_string());
        self
    }
}

/// Generation settings shared by every backend
#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl From<&EngineConfig> for GenerationOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// Accumulated token usage for one model
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Usage {
    pub calls: u64,
    pub prompt_tokens: u64,
    pub generated_tokens: u64,
    pub cost: f64,
}

impl Usage {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.generated_tokens
    }
}

/// Thread-safe usage accumulator priced at a flat per-token rate
#[derive(Debug, Default)]
pub struct UsageTracker {
    cost_per_token: f64,
    usage: Mutex<Usage>,
}

impl UsageTracker {
    pub fn new(cost_per_token: f64) -> Self {
        Self {
            cost_per_token,
            usage: Mutex::new(Usage::default()),
        }
    }

    pub fn record(&self, prompt_tokens: u64, generated_tokens: u64) {
        if let Ok(mut usage) = self.usage.lock() {
            usage.calls += 1;
            usage.prompt_tokens += prompt_tokens;
            usage.generated_tokens += generated_tokens;
            usage.cost += (prompt_tokens + generated_tokens) as f64 * self.cost_per_token;
        }
    }

    pub fn snapshot(&self) -> Usage {
        self.usage.lock().map(|u| *u).unwrap_or_default()
    }
}

/// Text generation capability.
///
/// `run` never fails: backend errors are logged and come back as an empty
/// string so the caller decides whether to skip the item.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier, for logs
    fn name(&self) -> &str;

    async fn run(&self, request: &ModelRequest) -> String;

    /// Token usage so far
    fn usage(&self) -> Usage {
        Usage::default()
    }

    /// Check the backend is reachable
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    /// Models the backend can serve
    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Vision and text models for one ingestion run
pub struct ModelPair {
    pub vision: Box<dyn LanguageModel>,
    pub text: Box<dyn LanguageModel>,
}

/// Build the configured backend for both stages
pub fn build_models(config: &EngineConfig) -> Result<ModelPair> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let options = GenerationOptions::from(config);

    let pair = match config.backend {
        Backend::Ollama => {
            let client = OllamaClient::new(&config.url, timeout)?;
            ModelPair {
                vision: Box::new(OllamaModel::new(
                    client.clone(),
                    &config.models.vision,
                    options,
                    config.cost_per_token,
                )),
                text: Box::new(OllamaModel::new(
                    client,
                    &config.models.text,
                    options,
                    config.cost_per_token,
                )),
            }
        }
        Backend::Openai => {
            let client = ChatClient::new(&config.url, config.api_key.as_deref(), timeout)?;
            ModelPair {
                vision: Box::new(ChatCompletionsModel::new(
                    client.clone(),
                    &config.models.vision,
                    options,
                    config.cost_per_token,
                )),
                text: Box::new(ChatCompletionsModel::new(
                    client,
                    &config.models.text,
                    options,
                    config.cost_per_token,
                )),
            }
        }
    };

    Ok(pair)
}
