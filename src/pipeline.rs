// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Ingestion: dedup-check, preprocess, describe, extract, parse, persist

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::analyzers::{ImagePreprocessor, PreparedImage};
use crate::db::{ImageRecord, ImageStore};
use crate::models::LanguageModel;
use crate::parser::{resolve_classification, ResponseParser};
use crate::prompts::PromptBuilder;
use crate::{AppConfig, ImageSearchError, Result};

/// Terminal state of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Persisted { id: String },
    SkippedDuplicate,
    SkippedOnError { reason: String },
}

/// Counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub discovered: usize,
    pub persisted: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl IngestReport {
    fn tally(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Persisted { .. } => self.persisted += 1,
            ItemOutcome::SkippedDuplicate => self.duplicates += 1,
            ItemOutcome::SkippedOnError { .. } => self.failed += 1,
        }
    }
}

/// Processes files strictly one at a time, in the order given.
///
/// Model calls never raise; preprocessing errors and empty model responses
/// skip the file. Store errors end the run.
pub struct IngestionPipeline<'a> {
    vision: &'a dyn LanguageModel,
    text: &'a dyn LanguageModel,
    store: &'a dyn ImageStore,
    preprocessor: ImagePreprocessor,
    prompts: PromptBuilder,
    parser: ResponseParser,
    persist_partial: bool,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(
        vision: &'a dyn LanguageModel,
        text: &'a dyn LanguageModel,
        store: &'a dyn ImageStore,
    ) -> Self {
        Self {
            vision,
            text,
            store,
            preprocessor: ImagePreprocessor::default(),
            prompts: PromptBuilder::default(),
            parser: ResponseParser::default(),
            persist_partial: false,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        vision: &'a dyn LanguageModel,
        text: &'a dyn LanguageModel,
        store: &'a dyn ImageStore,
    ) -> Self {
        Self {
            preprocessor: ImagePreprocessor::from_config(&config.image),
            prompts: PromptBuilder::from_config(&config.prompts),
            parser: ResponseParser::from_config(&config.parser),
            persist_partial: config.ingest.persist_partial,
            ..Self::new(vision, text, store)
        }
    }

    /// Keep records whose descriptive fields came back blank
    pub fn persist_partial(mut self, enabled: bool) -> Self {
        self.persist_partial = enabled;
        self
    }

    /// Process every path in order, calling `on_item` after each one
    pub async fn run<F>(&self, paths: &[PathBuf], mut on_item: F) -> Result<IngestReport>
    where
        F: FnMut(&Path, &ItemOutcome),
    {
        let mut report = IngestReport {
            discovered: paths.len(),
            ..Default::default()
        };

        for path in paths {
            let outcome = self.process_file(path).await?;
            report.tally(&outcome);
            on_item(path, &outcome);
        }

        info!(
            "Ingest finished: {} discovered, {} persisted, {} duplicates, {} failed",
            report.discovered, report.persisted, report.duplicates, report.failed
        );
        for model in [self.vision, self.text] {
            let usage = model.usage();
            if usage.calls > 0 {
                info!(
                    "Model '{}': {} calls, {} tokens, cost {:.6}",
                    model.name(),
                    usage.calls,
                    usage.total_tokens(),
                    usage.cost
                );
            }
        }

        Ok(report)
    }

    /// Take one file to a terminal state. Only store failures are errors.
    pub async fn process_file(&self, path: &Path) -> Result<ItemOutcome> {
        let full_path = path.to_string_lossy();

        if self.store.exists(&full_path)? {
            debug!("Already ingested: {:?}", path);
            return Ok(ItemOutcome::SkippedDuplicate);
        }

        let record = match self.build_record(path).await {
            Ok(record) => record,
            Err(reason) => {
                warn!("Skipping {:?}: {}", path, reason);
                return Ok(ItemOutcome::SkippedOnError { reason });
            }
        };

        if self.store.insert_if_absent(&record)? {
            info!("Stored {:?} as '{}'", path, record.title);
            Ok(ItemOutcome::Persisted { id: record.id })
        } else {
            // Another writer got there between the check and the insert
            Ok(ItemOutcome::SkippedDuplicate)
        }
    }

    async fn build_record(&self, path: &Path) -> std::result::Result<ImageRecord, String> {
        let prepared = self.preprocess(path).await.map_err(|e| e.to_string())?;

        let description = self
            .vision
            .run(&self.prompts.description_request(&prepared.vision_payload))
            .await;
        if description.trim().is_empty() && !self.persist_partial {
            return Err(format!("vision model '{}' returned no description", self.vision.name()));
        }

        let extraction = if description.trim().is_empty() {
            String::new()
        } else {
            self.text
                .run(&self.prompts.extraction_request(&description))
                .await
        };
        if extraction.trim().is_empty() && !self.persist_partial {
            return Err(format!("text model '{}' returned no fields", self.text.name()));
        }

        let fields = self.parser.extract(&extraction);

        let mut record = ImageRecord::new(path);
        record.long_desc = description.trim().to_string();
        record.title = fields.title;
        record.short_desc = fields.summary;
        record.set_keywords(&fields.keywords);
        record.predominant_color = prepared.predominant_color;
        record.exif_data = prepared.exif_data;
        if let Some(category) = resolve_classification(&fields.classification) {
            record.set_category(category);
        }

        Ok(record)
    }

    /// Decode and analyse off the async executor
    async fn preprocess(&self, path: &Path) -> Result<PreparedImage> {
        let preprocessor = self.preprocessor.clone();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || preprocessor.prepare(&path))
            .await
            .map_err(|e| ImageSearchError::Preprocess(format!("worker failed: {}", e)))?
    }
}
