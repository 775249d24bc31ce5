// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image preprocessing for vision models

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

use super::color::ColorAnalyzer;
use super::metadata::{ExifMap, MetadataExtractor};
use crate::config::ImageConfig;
use crate::Result;

/// Everything derived from one decode of a source image
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Base64 PNG, longest side bounded by the pixel limit
    pub vision_payload: String,
    pub predominant_color: String,
    pub exif_data: ExifMap,
    /// Source dimensions before any resize
    pub width: u32,
    pub height: u32,
}

/// Turns an image file into a model-ready payload plus derived attributes
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    pixel_limit: u32,
    color: ColorAnalyzer,
    metadata: MetadataExtractor,
}

impl ImagePreprocessor {
    pub fn new(pixel_limit: u32, color: ColorAnalyzer, metadata: MetadataExtractor) -> Self {
        Self {
            pixel_limit: pixel_limit.max(1),
            color,
            metadata,
        }
    }

    pub fn from_config(config: &ImageConfig) -> Self {
        Self::new(
            config.vlm_pixel_limit,
            ColorAnalyzer::new(config.color_clusters, config.color_downsample),
            MetadataExtractor::new(),
        )
    }

    /// Read and prepare an image file
    pub fn prepare(&self, path: &Path) -> Result<PreparedImage> {
        let bytes = std::fs::read(path)?;
        self.prepare_bytes(&bytes)
    }

    /// Decode once, then derive payload, dominant color and EXIF.
    /// A decode failure fails the whole step; EXIF problems do not.
    pub fn prepare_bytes(&self, bytes: &[u8]) -> Result<PreparedImage> {
        let img = image::load_from_memory(bytes)?;
        let (width, height) = img.dimensions();

        let resized = resize_for_vision(&img, self.pixel_limit);
        let png = encode_png(resized.as_ref().unwrap_or(&img))?;
        let vision_payload = general_purpose::STANDARD.encode(&png);

        let predominant_color = self.color.dominant_color(&img).to_string();
        let exif_data = self.metadata.extract(bytes);

        debug!(
            "Prepared {}x{} image: {} payload bytes, color {}, {} EXIF tags",
            width,
            height,
            vision_payload.len(),
            predominant_color,
            exif_data.len()
        );

        Ok(PreparedImage {
            vision_payload,
            predominant_color,
            exif_data,
            width,
            height,
        })
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::from_config(&ImageConfig::default())
    }
}

/// Target size that fits the longest side within `limit`, or `None` if the
/// image already fits. Never upscales.
pub fn vision_dimensions(width: u32, height: u32, limit: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= limit {
        return None;
    }
    // Integer scaling keeps the longest side at exactly `limit`
    let scale = |d: u32| ((d as u64 * limit as u64) / longest as u64).max(1) as u32;
    Some((scale(width), scale(height)))
}

/// Shrink an image so its longest side fits within `limit`
pub fn resize_for_vision(img: &DynamicImage, limit: u32) -> Option<DynamicImage> {
    let (width, height) = vision_dimensions(img.width(), img.height(), limit)?;
    Some(img.resize_exact(width, height, image::imageops::FilterType::CatmullRom))
}

/// Lossless re-encode
fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    img.write_to(&mut cursor, ImageFormat::Png)?;
    Ok(buffer)
}
