// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for imgsearch

use thiserror::Error;

/// Result type alias for imgsearch operations
pub type Result<T> = std::result::Result<T, ImageSearchError>;

/// imgsearch error types
#[derive(Error, Debug)]
pub enum ImageSearchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Model backend unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Preprocessing error: {0}")]
    Preprocess(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
