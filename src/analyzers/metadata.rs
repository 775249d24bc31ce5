// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! EXIF extraction into a JSON-safe mapping

use exif::{Field, In, Reader, Value as ExifValue};
use serde_json::{Map, Number, Value};
use std::io::Cursor;
use tracing::debug;

/// Tag name (or numeric tag id when unnamed) to a JSON scalar or list of floats
pub type ExifMap = Map<String, Value>;

/// Extracts EXIF tags from encoded image bytes
#[derive(Debug, Clone, Default)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Read every primary-image EXIF field. A missing or corrupt EXIF block
    /// yields an empty map rather than an error.
    pub fn extract(&self, bytes: &[u8]) -> ExifMap {
        let mut cursor = Cursor::new(bytes);
        let exif = match Reader::new().read_from_container(&mut cursor) {
            Ok(exif) => exif,
            Err(e) => {
                debug!("No EXIF data: {}", e);
                return ExifMap::new();
            }
        };

        let mut map = ExifMap::new();
        for field in exif.fields().filter(|f| f.ifd_num == In::PRIMARY) {
            map.insert(tag_key(field), json_safe(field));
        }
        map
    }
}

fn tag_key(field: &Field) -> String {
    if field.tag.description().is_some() {
        field.tag.to_string()
    } else {
        field.tag.number().to_string()
    }
}

/// Coerce an EXIF value to something JSON can hold.
///
/// Text passes through as a string and single integers stay integers.
/// Single rationals and floats become floats, multi-valued fields become
/// lists of floats, and anything else falls back to its display string.
pub fn json_safe(field: &Field) -> Value {
    let fallback = || Value::String(field.display_value().to_string());

    let floats: Vec<f64> = match &field.value {
        ExifValue::Ascii(parts) => {
            let text = parts
                .iter()
                .map(|p| String::from_utf8_lossy(p).trim_end_matches('\0').to_string())
                .collect::<Vec<_>>()
                .join(" ");
            return Value::String(text);
        }
        ExifValue::Byte(v) if v.len() == 1 => return Value::from(v[0]),
        ExifValue::Short(v) if v.len() == 1 => return Value::from(v[0]),
        ExifValue::Long(v) if v.len() == 1 => return Value::from(v[0]),
        ExifValue::SByte(v) if v.len() == 1 => return Value::from(v[0]),
        ExifValue::SShort(v) if v.len() == 1 => return Value::from(v[0]),
        ExifValue::SLong(v) if v.len() == 1 => return Value::from(v[0]),
        ExifValue::Byte(v) => v.iter().map(|&x| x as f64).collect(),
        ExifValue::Short(v) => v.iter().map(|&x| x as f64).collect(),
        ExifValue::Long(v) => v.iter().map(|&x| x as f64).collect(),
        ExifValue::SByte(v) => v.iter().map(|&x| x as f64).collect(),
        ExifValue::SShort(v) => v.iter().map(|&x| x as f64).collect(),
        ExifValue::SLong(v) => v.iter().map(|&x| x as f64).collect(),
        ExifValue::Rational(v) => v.iter().map(|r| r.to_f64()).collect(),
        ExifValue::SRational(v) => v.iter().map(|r| r.to_f64()).collect(),
        ExifValue::Float(v) => v.iter().map(|&x| x as f64).collect(),
        ExifValue::Double(v) => v.clone(),
        _ => return fallback(),
    };

    // Zero denominators produce NaN/inf, which JSON cannot represent
    let numbers: Option<Vec<Number>> = floats.iter().map(|&f| Number::from_f64(f)).collect();
    match numbers {
        Some(mut n) if n.len() == 1 => Value::Number(n.remove(0)),
        Some(n) => Value::Array(n.into_iter().map(Value::Number).collect()),
        None => fallback(),
    }
}
