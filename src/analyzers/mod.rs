// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Deterministic image analysis: dominant color, EXIF, vision payload

pub mod color;
pub mod image;
pub mod metadata;

pub use self::color::{nearest_color_name, ColorAnalyzer};
pub use self::image::{ImagePreprocessor, PreparedImage};
pub use self::metadata::{ExifMap, MetadataExtractor};
