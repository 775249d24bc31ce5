// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! imgsearch: describe, classify and index photo collections with local AI
//!
//! Images are discovered on disk, reduced to a vision-model payload, described
//! by a vision model, summarised into structured fields by a text model, and
//! stored one row per file in SQLite.

pub mod analyzers;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod scanner;

pub use config::AppConfig;
pub use error::{ImageSearchError, Result};
