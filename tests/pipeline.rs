// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use imgsearch::db::{Database, ImageRecord, ImageStore};
use imgsearch::models::{LanguageModel, ModelRequest};
use imgsearch::parser::Category;
use imgsearch::pipeline::{IngestionPipeline, ItemOutcome};
use imgsearch::scanner::discover;
use imgsearch::{ImageSearchError, Result};

const CAT_FIELDS: &str = "Title: Cat\nSummary: A cat.\nKeywords: cat, pet\nClassification: 3";

/// Replies with fixed text and remembers every request
struct ScriptedModel {
    name: &'static str,
    reply: String,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    fn new(name: &'static str, reply: &str) -> Self {
        Self {
            name,
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_request(&self) -> Option<ModelRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, request: &ModelRequest) -> String {
        self.requests.lock().unwrap().push(request.clone());
        self.reply.clone()
    }
}

/// Store whose backend is gone
struct BrokenStore;

impl ImageStore for BrokenStore {
    fn exists(&self, _full_path: &str) -> Result<bool> {
        Err(ImageSearchError::Database(rusqlite::Error::InvalidQuery))
    }

    fn insert_if_absent(&self, _record: &ImageRecord) -> Result<bool> {
        Err(ImageSearchError::Database(rusqlite::Error::InvalidQuery))
    }
}

/// Store where another writer always lands the row between check and insert
#[derive(Default)]
struct RacingStore {
    inserts: Mutex<usize>,
}

impl ImageStore for RacingStore {
    fn exists(&self, _full_path: &str) -> Result<bool> {
        Ok(false)
    }

    fn insert_if_absent(&self, _record: &ImageRecord) -> Result<bool> {
        *self.inserts.lock().unwrap() += 1;
        Ok(false)
    }
}

fn extensions() -> Vec<String> {
    ["jpg", "jpeg", "png"].into_iter().map(String::from).collect()
}

fn write_solid_image(path: &Path, rgb: [u8; 3]) {
    image::RgbImage::from_pixel(64, 48, image::Rgb(rgb))
        .save(path)
        .unwrap();
}

/// One valid jpg, one corrupt jpg, one gif
fn mixed_library() -> (tempfile::TempDir, Vec<PathBuf>) {
    let dir = tempfile::tempdir().unwrap();
    write_solid_image(&dir.path().join("beach.jpg"), [30, 120, 200]);
    std::fs::write(dir.path().join("broken.jpg"), b"definitely not a jpeg").unwrap();
    std::fs::write(dir.path().join("anim.gif"), b"GIF89a").unwrap();

    let files = discover(&[dir.path().to_path_buf()], &extensions());
    (dir, files)
}

#[tokio::test]
async fn valid_corrupt_and_unsupported_yield_one_record() {
    let (dir, files) = mixed_library();
    assert_eq!(files, vec![dir.path().join("beach.jpg"), dir.path().join("broken.jpg")]);

    let vision = ScriptedModel::new("vision", "A cat sits on a sunny beach.");
    let text = ScriptedModel::new("text", CAT_FIELDS);
    let db = Database::in_memory().unwrap();
    let pipeline = IngestionPipeline::new(&vision, &text, &db);

    let report = pipeline.run(&files, |_, _| {}).await.unwrap();
    assert_eq!(report.discovered, 2);
    assert_eq!(report.persisted, 1);
    assert_eq!(report.failed, 1);

    let records = db.all_records().unwrap();
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.file_name, "beach.jpg");
    assert_eq!(record.file_type, "jpg");
    assert_eq!(record.base_dir, dir.path().to_string_lossy());
    assert_eq!(record.long_desc, "A cat sits on a sunny beach.");
    assert_eq!(record.title, "Cat");
    assert_eq!(record.short_desc, "A cat.");
    assert_eq!(record.keywords, "cat, pet");
    assert_eq!(record.image_classification, "cat");
    assert_eq!(record.category(), Some(Category::Selfie));
    assert!(!record.natural_landscape && !record.building_structure && !record.friends_or_family);
    assert!(!record.ignore);
    assert!(!record.predominant_color.is_empty());

    // The corrupt file never reached a model
    assert_eq!(vision.calls(), 1);
}

#[tokio::test]
async fn second_run_persists_nothing() {
    let (_dir, files) = mixed_library();
    let vision = ScriptedModel::new("vision", "A cat.");
    let text = ScriptedModel::new("text", CAT_FIELDS);
    let db = Database::in_memory().unwrap();
    let pipeline = IngestionPipeline::new(&vision, &text, &db);

    let first = pipeline.run(&files, |_, _| {}).await.unwrap();
    let before = db.all_records().unwrap();

    let second = pipeline.run(&files, |_, _| {}).await.unwrap();
    let after = db.all_records().unwrap();

    assert_eq!(first.persisted, 1);
    assert_eq!(second.persisted, 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(before, after);
    // Duplicates are detected before any model call
    assert_eq!(vision.calls(), 1);
    assert_eq!(text.calls(), 1);
}

#[tokio::test]
async fn callback_sees_every_item_in_order() {
    let (_dir, files) = mixed_library();
    let vision = ScriptedModel::new("vision", "A cat.");
    let text = ScriptedModel::new("text", CAT_FIELDS);
    let db = Database::in_memory().unwrap();
    let pipeline = IngestionPipeline::new(&vision, &text, &db);

    let mut seen = Vec::new();
    pipeline
        .run(&files, |path, outcome| seen.push((path.to_path_buf(), outcome.clone())))
        .await
        .unwrap();

    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, files[0]);
    assert!(matches!(seen[0].1, ItemOutcome::Persisted { .. }));
    assert_eq!(seen[1].0, files[1]);
    assert!(matches!(seen[1].1, ItemOutcome::SkippedOnError { .. }));
}

#[tokio::test]
async fn empty_description_skips_under_strict_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.png");
    write_solid_image(&path, [255, 0, 0]);

    let vision = ScriptedModel::new("vision", "   ");
    let text = ScriptedModel::new("text", CAT_FIELDS);
    let db = Database::in_memory().unwrap();
    let pipeline = IngestionPipeline::new(&vision, &text, &db);

    let outcome = pipeline.process_file(&path).await.unwrap();
    assert!(matches!(outcome, ItemOutcome::SkippedOnError { .. }));
    assert_eq!(text.calls(), 0);
    assert!(!db.exists(&path.to_string_lossy()).unwrap());
}

#[tokio::test]
async fn empty_extraction_skips_under_strict_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.png");
    write_solid_image(&path, [255, 0, 0]);

    let vision = ScriptedModel::new("vision", "A red square.");
    let text = ScriptedModel::new("text", "");
    let db = Database::in_memory().unwrap();
    let pipeline = IngestionPipeline::new(&vision, &text, &db);

    let outcome = pipeline.process_file(&path).await.unwrap();
    assert!(matches!(outcome, ItemOutcome::SkippedOnError { .. }));
    assert!(db.all_records().unwrap().is_empty());
}

#[tokio::test]
async fn lenient_policy_persists_blank_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.png");
    write_solid_image(&path, [255, 0, 0]);

    let vision = ScriptedModel::new("vision", "");
    let text = ScriptedModel::new("text", CAT_FIELDS);
    let db = Database::in_memory().unwrap();
    let pipeline = IngestionPipeline::new(&vision, &text, &db).persist_partial(true);

    let outcome = pipeline.process_file(&path).await.unwrap();
    assert!(matches!(outcome, ItemOutcome::Persisted { .. }));
    assert_eq!(text.calls(), 0);

    let record = db.get_by_path(&path.to_string_lossy()).unwrap().unwrap();
    assert_eq!(record.long_desc, "");
    assert_eq!(record.title, "");
    assert_eq!(record.category(), None);
    // Derived attributes survive a silent model
    assert_eq!(record.predominant_color, "red");
    assert!(record.exif_data.is_empty());
}

#[tokio::test]
async fn model_requests_carry_payload_and_description() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wide.png");
    image::RgbImage::from_pixel(3000, 1500, image::Rgb([0, 128, 0]))
        .save(&path)
        .unwrap();

    let vision = ScriptedModel::new("vision", "A flat green field.");
    let text = ScriptedModel::new("text", CAT_FIELDS);
    let db = Database::in_memory().unwrap();
    let pipeline = IngestionPipeline::new(&vision, &text, &db);
    pipeline.process_file(&path).await.unwrap();

    let vision_request = vision.last_request().unwrap();
    let payload = vision_request.image_b64.expect("vision request carries an image");
    let png = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, payload).unwrap();
    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (999, 499));

    let text_request = text.last_request().unwrap();
    assert!(text_request.image_b64.is_none());
    assert!(text_request.user.contains("A flat green field."));

    let record = db.get_by_path(&path.to_string_lossy()).unwrap().unwrap();
    assert_eq!(record.predominant_color, "green");
}

#[tokio::test]
async fn classification_five_sets_no_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.png");
    write_solid_image(&path, [0, 0, 255]);

    let vision = ScriptedModel::new("vision", "Abstract blue.");
    let text = ScriptedModel::new(
        "text",
        "Title: Blue\nSummary: Just blue.\nKeywords: blue, abstract\nClassification: 5",
    );
    let db = Database::in_memory().unwrap();
    let pipeline = IngestionPipeline::new(&vision, &text, &db);
    pipeline.process_file(&path).await.unwrap();

    let record = db.get_by_path(&path.to_string_lossy()).unwrap().unwrap();
    assert_eq!(record.title, "Blue");
    assert_eq!(record.image_classification, "blue");
    assert_eq!(record.category(), None);
}

#[tokio::test]
async fn store_failure_ends_the_run() {
    let (_dir, files) = mixed_library();
    let vision = ScriptedModel::new("vision", "A cat.");
    let text = ScriptedModel::new("text", CAT_FIELDS);
    let pipeline = IngestionPipeline::new(&vision, &text, &BrokenStore);

    let result = pipeline.run(&files, |_, _| {}).await;
    assert!(matches!(result, Err(ImageSearchError::Database(_))));
    assert_eq!(vision.calls(), 0);
}

#[tokio::test]
async fn lost_insert_race_counts_as_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.png");
    write_solid_image(&path, [255, 0, 0]);

    let vision = ScriptedModel::new("vision", "A red square.");
    let text = ScriptedModel::new("text", CAT_FIELDS);
    let store = RacingStore::default();
    let pipeline = IngestionPipeline::new(&vision, &text, &store);

    let mut outcomes = Vec::new();
    let report = pipeline
        .run(&[path], |_, outcome| outcomes.push(outcome.clone()))
        .await
        .unwrap();

    assert_eq!(outcomes, vec![ItemOutcome::SkippedDuplicate]);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.persisted, 0);
    assert_eq!(*store.inserts.lock().unwrap(), 1);
}
