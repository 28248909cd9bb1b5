//! Serde-deserializable types matching the document-store API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::types::WordEntry;

/// Parse an RFC 3339 timestamp, defaulting to the epoch for malformed values.
fn parse_timestamp(s: &str) -> DateTime<Utc> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

// ============================================================================
// Document list endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiDocumentList {
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub documents: Vec<ApiWordDocument>,
}

#[derive(Debug, Deserialize)]
pub struct ApiWordDocument {
  #[serde(rename = "$id")]
  pub id: String,
  #[serde(rename = "$createdAt", default)]
  pub created_at: String,
  #[serde(rename = "$updatedAt", default)]
  pub updated_at: String,
  #[serde(default)]
  pub word: String,
  #[serde(default)]
  pub pronunciation: String,
  #[serde(default)]
  pub definitions: Vec<String>,
  #[serde(default)]
  pub likes: u32,
  #[serde(rename = "originalWord", default)]
  pub original_word: Option<String>,
  #[serde(default)]
  pub modified: Option<bool>,
}

impl ApiWordDocument {
  pub fn into_entry(self) -> WordEntry {
    WordEntry {
      date_added: parse_timestamp(&self.created_at),
      last_modified: parse_timestamp(&self.updated_at),
      id: self.id,
      word: self.word,
      pronunciation: self.pronunciation,
      definitions: self.definitions,
      likes: self.likes,
      original_word: self.original_word,
      modified: self.modified,
    }
  }
}

// ============================================================================
// Error envelope
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiError {
  #[serde(default)]
  pub message: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_document_conversion() {
    let json = r#"{
      "$id": "w1",
      "$createdAt": "2024-03-01T12:00:00.000+00:00",
      "$updatedAt": "2024-03-05T08:30:00.000+00:00",
      "word": "Ombura",
      "pronunciation": "om-BU-ra",
      "definitions": ["Rain; rainfall"],
      "likes": 3
    }"#;

    let doc: ApiWordDocument = serde_json::from_str(json).unwrap();
    let entry = doc.into_entry();

    assert_eq!(entry.id, "w1");
    assert_eq!(entry.word, "Ombura");
    assert_eq!(entry.definitions, vec!["Rain; rainfall"]);
    assert_eq!(entry.likes, 3);
    assert_eq!(entry.date_added.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    assert!(entry.original_word.is_none());
  }

  #[test]
  fn test_malformed_timestamp_defaults_to_epoch() {
    let json = r#"{"$id": "w1", "$createdAt": "not-a-date"}"#;
    let doc: ApiWordDocument = serde_json::from_str(json).unwrap();
    let entry = doc.into_entry();
    assert_eq!(entry.date_added, DateTime::<Utc>::UNIX_EPOCH);
  }
}
