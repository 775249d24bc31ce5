// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Database module for image description records

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::analyzers::ExifMap;
use crate::parser::Category;
use crate::{ImageSearchError, Result};

/// One ingested image. `full_path` is unique; records are written once and
/// never updated by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub full_path: String,
    pub base_dir: String,
    pub file_name: String,
    pub file_type: String,
    pub long_desc: String,
    pub short_desc: String,
    pub keywords: String,
    pub title: String,
    /// First keyword, informational only
    pub image_classification: String,
    pub predominant_color: String,
    pub exif_data: ExifMap,
    pub natural_landscape: bool,
    pub building_structure: bool,
    pub selfie: bool,
    pub friends_or_family: bool,
    /// Reserved for manual curation
    pub ignore: bool,
    pub created_at: DateTime<Utc>,
}

impl ImageRecord {
    /// New record for `path` with a fresh id and every text field blank
    pub fn new(path: &Path) -> Self {
        Self {
            id: new_record_id(),
            full_path: path.to_string_lossy().to_string(),
            base_dir: path
                .parent()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            file_type: path
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default(),
            long_desc: String::new(),
            short_desc: String::new(),
            keywords: String::new(),
            title: String::new(),
            image_classification: String::new(),
            predominant_color: String::new(),
            exif_data: ExifMap::new(),
            natural_landscape: false,
            building_structure: false,
            selfie: false,
            friends_or_family: false,
            ignore: false,
            created_at: Utc::now(),
        }
    }

    /// Set keywords and derive `image_classification` from the first one
    pub fn set_keywords(&mut self, keywords: &str) {
        self.keywords = keywords.to_string();
        self.image_classification = keywords
            .split(',')
            .next()
            .map(|k| k.trim().to_string())
            .unwrap_or_default();
    }

    /// Raise the flag for `category`, clearing the others
    pub fn set_category(&mut self, category: Category) {
        self.natural_landscape = category == Category::NaturalLandscape;
        self.building_structure = category == Category::BuildingStructure;
        self.selfie = category == Category::Selfie;
        self.friends_or_family = category == Category::FriendsOrFamily;
    }

    /// The flagged category, if any
    pub fn category(&self) -> Option<Category> {
        Category::ALL.into_iter().find(|c| match c {
            Category::NaturalLandscape => self.natural_landscape,
            Category::BuildingStructure => self.building_structure,
            Category::Selfie => self.selfie,
            Category::FriendsOrFamily => self.friends_or_family,
        })
    }
}

/// Storage for image records, keyed by full path
pub trait ImageStore: Send + Sync {
    fn exists(&self, full_path: &str) -> Result<bool>;

    /// Write `record` unless its path is already stored. Returns whether a
    /// row was written.
    fn insert_if_absent(&self, record: &ImageRecord) -> Result<bool>;
}

/// Database statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub record_count: i64,
    pub ignored_count: i64,
    /// Records flagged per category column
    pub categories: Vec<(String, i64)>,
}

/// Database manager (thread-safe wrapper)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

const SELECT_COLUMNS: &str = "id, full_path, base_dir, file_name, file_type, long_desc, \
    short_desc, keywords, title, image_classification, predominant_color, exif_data, \
    natural_landscape, building_structure, selfie, friends_or_family, \"ignore\", created_at";

impl Database {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ImageSearchError::Config("Database lock poisoned".to_string()))
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS image_description (
                id TEXT PRIMARY KEY,
                full_path TEXT NOT NULL UNIQUE,
                base_dir TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_type TEXT NOT NULL,
                long_desc TEXT NOT NULL DEFAULT '',
                short_desc TEXT NOT NULL DEFAULT '',
                keywords TEXT NOT NULL DEFAULT '',
                title TEXT NOT NULL DEFAULT '',
                image_classification TEXT NOT NULL DEFAULT '',
                predominant_color TEXT NOT NULL DEFAULT '',
                exif_data TEXT NOT NULL DEFAULT '{}',
                natural_landscape INTEGER NOT NULL DEFAULT 0,
                building_structure INTEGER NOT NULL DEFAULT 0,
                selfie INTEGER NOT NULL DEFAULT 0,
                friends_or_family INTEGER NOT NULL DEFAULT 0,
                "ignore" INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_image_base_dir ON image_description(base_dir);
        "#)?;
        Ok(())
    }

    /// Every record, oldest first
    pub fn all_records(&self) -> Result<Vec<ImageRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM image_description ORDER BY created_at, full_path",
            SELECT_COLUMNS
        ))?;
        let records = stmt
            .query_map([], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Fetch the record stored for a path
    pub fn get_by_path(&self, full_path: &str) -> Result<Option<ImageRecord>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            &format!("SELECT {} FROM image_description WHERE full_path = ?1", SELECT_COLUMNS),
            params![full_path],
            record_from_row,
        );
        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DbStats> {
        let conn = self.lock_conn()?;
        let record_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM image_description", [], |row| row.get(0))?;
        let ignored_count: i64 = conn.query_row(
            r#"SELECT COUNT(*) FROM image_description WHERE "ignore" = 1"#,
            [],
            |row| row.get(0),
        )?;

        let mut categories = Vec::new();
        for category in Category::ALL {
            let column = category.column();
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM image_description WHERE {} = 1", column),
                [],
                |row| row.get(0),
            )?;
            categories.push((column.to_string(), count));
        }

        Ok(DbStats { record_count, ignored_count, categories })
    }

    /// Vacuum database
    pub fn vacuum(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("VACUUM", [])?;
        Ok(())
    }
}

impl ImageStore for Database {
    fn exists(&self, full_path: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let found: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM image_description WHERE full_path = ?1)",
            params![full_path],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    fn insert_if_absent(&self, record: &ImageRecord) -> Result<bool> {
        let conn = self.lock_conn()?;
        let exif_json = serde_json::to_string(&record.exif_data)?;

        // UNIQUE(full_path) + OR IGNORE keeps this a single atomic check-and-write
        let written = conn.execute(
            r#"INSERT OR IGNORE INTO image_description (
                   id, full_path, base_dir, file_name, file_type, long_desc, short_desc,
                   keywords, title, image_classification, predominant_color, exif_data,
                   natural_landscape, building_structure, selfie, friends_or_family,
                   "ignore", created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"#,
            params![
                record.id,
                record.full_path,
                record.base_dir,
                record.file_name,
                record.file_type,
                record.long_desc,
                record.short_desc,
                record.keywords,
                record.title,
                record.image_classification,
                record.predominant_color,
                exif_json,
                record.natural_landscape,
                record.building_structure,
                record.selfie,
                record.friends_or_family,
                record.ignore,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(written > 0)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ImageRecord> {
    let exif_str: String = row.get(11)?;
    let created_str: String = row.get(17)?;
    Ok(ImageRecord {
        id: row.get(0)?,
        full_path: row.get(1)?,
        base_dir: row.get(2)?,
        file_name: row.get(3)?,
        file_type: row.get(4)?,
        long_desc: row.get(5)?,
        short_desc: row.get(6)?,
        keywords: row.get(7)?,
        title: row.get(8)?,
        image_classification: row.get(9)?,
        predominant_color: row.get(10)?,
        exif_data: serde_json::from_str(&exif_str).unwrap_or_default(),
        natural_landscape: row.get(12)?,
        building_structure: row.get(13)?,
        selfie: row.get(14)?,
        friends_or_family: row.get(15)?,
        ignore: row.get(16)?,
        created_at: DateTime::parse_from_rfc3339(&created_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

/// Generate a new UUID for image records
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}
