// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Tolerant extraction of structured fields from free-form model output

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ParserConfig;

pub const TITLE_HEADER: &str = "Title";
pub const SUMMARY_HEADER: &str = "Summary";
pub const KEYWORDS_HEADER: &str = "Keywords";
pub const CLASSIFICATION_HEADER: &str = "Classification";

/// Fields recovered from the extraction response. Any of them may be empty
/// when the model strays from the requested format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub title: String,
    pub summary: String,
    pub keywords: String,
    /// Raw matched text, see [`resolve_classification`]
    pub classification: String,
}

/// Image categories a classification digit can map to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    NaturalLandscape,
    BuildingStructure,
    Selfie,
    FriendsOrFamily,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::NaturalLandscape,
        Category::BuildingStructure,
        Category::Selfie,
        Category::FriendsOrFamily,
    ];

    /// Database column holding this category's flag
    pub fn column(&self) -> &'static str {
        match self {
            Category::NaturalLandscape => "natural_landscape",
            Category::BuildingStructure => "building_structure",
            Category::Selfie => "selfie",
            Category::FriendsOrFamily => "friends_or_family",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Map the first decimal digit in `text` to a category.
///
/// `1`-`4` name a category, `5` means none of the above, and text without
/// a digit has no category. Digits outside the scheme are logged and
/// treated as no category.
pub fn resolve_classification(text: &str) -> Option<Category> {
    let digit = text.chars().find(|c| c.is_ascii_digit())?;
    match digit {
        '1' => Some(Category::NaturalLandscape),
        '2' => Some(Category::BuildingStructure),
        '3' => Some(Category::Selfie),
        '4' => Some(Category::FriendsOrFamily),
        '5' => None,
        other => {
            warn!("Classification digit {:?} outside the 1-5 scheme in {:?}", other, text);
            None
        }
    }
}

/// Splits model output on colons and newlines and fuzzy-matches the field
/// headers against the pieces
#[derive(Debug, Clone)]
pub struct ResponseParser {
    threshold: f64,
}

impl ResponseParser {
    /// `threshold` is the minimum 0-100 similarity for a header match
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &ParserConfig) -> Self {
        Self::new(config.match_threshold)
    }

    pub fn extract(&self, raw: &str) -> ExtractedFields {
        let tokens: Vec<&str> = raw.split([':', '\n']).collect();

        let fields = ExtractedFields {
            title: self.field_value(&tokens, TITLE_HEADER),
            summary: self.field_value(&tokens, SUMMARY_HEADER),
            keywords: self.field_value(&tokens, KEYWORDS_HEADER),
            classification: self.field_value(&tokens, CLASSIFICATION_HEADER),
        };

        debug!("Extracted fields: {:?}", fields);
        fields
    }

    /// Value of the token after the best-matching header token, or empty
    fn field_value(&self, tokens: &[&str], header: &str) -> String {
        let mut best: Option<(usize, f64)> = None;
        for (i, token) in tokens.iter().enumerate() {
            let score = similarity(header, token);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }

        match best {
            Some((i, score)) if score >= self.threshold => tokens
                .get(i + 1)
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
            _ => {
                debug!("No token resembles header {:?}", header);
                String::new()
            }
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::from_config(&ParserConfig::default())
    }
}

/// Lowercase, turn anything that is not a letter or digit into a space,
/// drop leading list numbers ("1. Title") and collapse the whitespace
fn normalize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .skip_while(|word| word.chars().all(|c| c.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity on a 0-100 scale, rounded to the nearest integer
pub fn similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (normalize(a), normalize(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    (strsim::normalized_damerau_levenshtein(&a, &b) * 100.0).round()
}
