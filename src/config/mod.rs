// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for imgsearch

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{prompts, ImageSearchError, Result};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Root of the image library
    #[serde(default = "default_root_dir")]
    pub root_dir: String,

    /// Subdirectories of `root_dir` to ingest (empty = the whole root)
    #[serde(default)]
    pub subdirs: Vec<String>,

    /// File extensions considered images (case-insensitive)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// AI engine configuration
    pub ai_engine: EngineConfig,

    /// Prompt templates
    #[serde(default)]
    pub prompts: PromptConfig,

    /// Image preprocessing settings
    #[serde(default)]
    pub image: ImageConfig,

    /// Response parsing settings
    #[serde(default)]
    pub parser: ParserConfig,

    /// Ingestion policy
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Which HTTP API the model backend speaks
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Ollama `/api/generate`
    Ollama,
    /// OpenAI-compatible `/v1/chat/completions`
    #[serde(alias = "chat")]
    Openai,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_backend")]
    pub backend: Backend,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub models: ModelConfig,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Used only for usage accounting in the run summary
    #[serde(default)]
    pub cost_per_token: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    pub vision: String,
    #[serde(default = "default_text_model")]
    pub text: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_description_system")]
    pub description_system: String,
    #[serde(default = "default_description_user")]
    pub description_user: String,
    #[serde(default = "default_extraction_system")]
    pub extraction_system: String,
    /// Must contain the `{description}` placeholder
    #[serde(default = "default_extraction_template")]
    pub extraction_template: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ImageConfig {
    /// Longest side of the image sent to the vision model
    #[serde(default = "default_pixel_limit")]
    pub vlm_pixel_limit: u32,
    /// Number of k-means clusters used for the dominant color
    #[serde(default = "default_color_clusters")]
    pub color_clusters: usize,
    /// Per-axis downsampling factor applied before clustering
    #[serde(default = "default_color_downsample")]
    pub color_downsample: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ParserConfig {
    /// Minimum similarity (0-100) for a token to count as a field header
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct IngestConfig {
    /// Persist records with blank text fields when a model call comes back empty
    #[serde(default)]
    pub persist_partial: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

// Default value functions
fn default_root_dir() -> String { ".".to_string() }
fn default_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png"].into_iter().map(String::from).collect()
}
fn default_backend() -> Backend { Backend::Ollama }
fn default_timeout() -> u64 { 120 }
fn default_max_tokens() -> u32 { 512 }
fn default_temperature() -> f32 { 0.5 }
fn default_text_model() -> String { "llama3.2:3b".to_string() }
fn default_pixel_limit() -> u32 { 999 }
fn default_color_clusters() -> usize { 1 }
fn default_color_downsample() -> u32 { 10 }
fn default_match_threshold() -> f64 { 80.0 }
fn default_db_path() -> String { "imgsearch.db".to_string() }
fn default_description_system() -> String { prompts::DESCRIPTION_SYSTEM_PROMPT.to_string() }
fn default_description_user() -> String { prompts::DESCRIPTION_USER_PROMPT.to_string() }
fn default_extraction_system() -> String { prompts::EXTRACTION_SYSTEM_PROMPT.to_string() }
fn default_extraction_template() -> String { prompts::EXTRACTION_TEMPLATE.to_string() }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            subdirs: Vec::new(),
            extensions: default_extensions(),
            ai_engine: EngineConfig {
                backend: default_backend(),
                url: "http://localhost:11434".to_string(),
                api_key: None,
                models: ModelConfig {
                    vision: "llava".to_string(),
                    text: default_text_model(),
                },
                timeout_secs: default_timeout(),
                max_tokens: default_max_tokens(),
                temperature: default_temperature(),
                cost_per_token: 0.0,
            },
            prompts: PromptConfig::default(),
            image: ImageConfig::default(),
            parser: ParserConfig::default(),
            ingest: IngestConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            description_system: default_description_system(),
            description_user: default_description_user(),
            extraction_system: default_extraction_system(),
            extraction_template: default_extraction_template(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            vlm_pixel_limit: default_pixel_limit(),
            color_clusters: default_color_clusters(),
            color_downsample: default_color_downsample(),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            match_threshold: default_match_threshold(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| ImageSearchError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.image.vlm_pixel_limit == 0 {
            return Err(ImageSearchError::Config("image.vlm_pixel_limit must be > 0".to_string()));
        }
        if self.image.color_clusters == 0 {
            return Err(ImageSearchError::Config("image.color_clusters must be > 0".to_string()));
        }
        if self.image.color_downsample == 0 {
            return Err(ImageSearchError::Config("image.color_downsample must be > 0".to_string()));
        }
        if !(0.0..=100.0).contains(&self.parser.match_threshold) {
            return Err(ImageSearchError::Config(
                "parser.match_threshold must be within 0-100".to_string(),
            ));
        }
        if !self.prompts.extraction_template.contains(prompts::DESCRIPTION_PLACEHOLDER) {
            return Err(ImageSearchError::Config(format!(
                "prompts.extraction_template must contain {}",
                prompts::DESCRIPTION_PLACEHOLDER
            )));
        }
        if self.extensions.is_empty() {
            return Err(ImageSearchError::Config("extensions must not be empty".to_string()));
        }
        Ok(())
    }

    /// Directories to scan: the listed subdirectories of the root, or the root itself
    pub fn scan_roots(&self) -> Vec<PathBuf> {
        let root = PathBuf::from(&self.root_dir);
        if self.subdirs.is_empty() {
            vec![root]
        } else {
            self.subdirs.iter().map(|s| root.join(s)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let json = r#"{
            "ai_engine": {
                "url": "http://localhost:11434",
                "models": { "vision": "llava" }
            }
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.ai_engine.backend, Backend::Ollama);
        assert_eq!(config.image.vlm_pixel_limit, 999);
        assert_eq!(config.image.color_clusters, 1);
        assert_eq!(config.parser.match_threshold, 80.0);
        assert!(!config.ingest.persist_partial);
        assert_eq!(config.extensions, vec!["jpg", "jpeg", "png"]);
        config.validate().unwrap();
    }

    #[test]
    fn test_backend_accepts_chat_alias() {
        let backend: Backend = serde_json::from_str(r#""chat""#).unwrap();
        assert_eq!(backend, Backend::Openai);
    }

    #[test]
    fn test_validate_rejects_zero_pixel_limit() {
        let mut config = AppConfig::default();
        config.image.vlm_pixel_limit = 0;
        assert!(matches!(config.validate(), Err(ImageSearchError::Config(_))));
    }

    #[test]
    fn test_validate_requires_description_placeholder() {
        let mut config = AppConfig::default();
        config.prompts.extraction_template = "Summarise this.".to_string();
        assert!(matches!(config.validate(), Err(ImageSearchError::Config(_))));
    }

    #[test]
    fn test_scan_roots_uses_subdirs() {
        let mut config = AppConfig::default();
        config.root_dir = "/photos".to_string();
        assert_eq!(config.scan_roots(), vec![PathBuf::from("/photos")]);

        config.subdirs = vec!["Photos".to_string(), "Pictures".to_string()];
        assert_eq!(
            config.scan_roots(),
            vec![PathBuf::from("/photos/Photos"), PathBuf::from("/photos/Pictures")]
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.ingest.persist_partial = true;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert!(loaded.ingest.persist_partial);
        assert_eq!(loaded.ai_engine.models.text, "llama3.2:3b");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AppConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(loaded.database.path, "imgsearch.db");
    }
}
