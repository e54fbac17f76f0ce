use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Storage format for `indexed_date`: local wall-clock time, ISO-8601, microsecond precision.
pub const INDEXED_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Whether a file has been through the OCR pipeline.
///
/// Backed by row presence in the index: no row means `Unseen`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IndexState {
    Unseen,
    Indexed { text: String, indexed_date: String },
}

impl IndexState {
    pub fn is_indexed(&self) -> bool {
        matches!(self, Self::Indexed { .. })
    }
}

/// A ranked match straight out of the index, before any date/folder filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotHit {
    pub file_path: String,
    pub extracted_text: String,
    pub snippet: String,
    pub indexed_date: String,
}

pub fn format_indexed_date(at: NaiveDateTime) -> String {
    at.format(INDEXED_DATE_FORMAT).to_string()
}

pub fn now_indexed_date() -> String {
    format_indexed_date(Local::now().naive_local())
}

/// Parses a stored `indexed_date`. Accepts the native local format (with or without
/// fractional seconds) and RFC 3339, which is converted to local time.
pub fn parse_indexed_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Local).naive_local())
}
