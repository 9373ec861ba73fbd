//! Clipped page records.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned record key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub i64);

impl SnapshotId {
    pub fn new(id: i64) -> Self {
        SnapshotId(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A captured page that has not been persisted yet.
///
/// Carries no `id`; the store assigns one on insert. A missing `timestamp`
/// is stamped with the insert time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSnapshot {
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_time: Option<u32>,
}

impl NewSnapshot {
    pub fn new(title: impl Into<String>, url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            timestamp: None,
            content: content.into(),
            favicon: None,
            word_count: None,
            reading_time: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_favicon(mut self, favicon: impl Into<String>) -> Self {
        self.favicon = Some(favicon.into());
        self
    }

    pub fn with_metrics(mut self, word_count: u32, reading_time: u32) -> Self {
        self.word_count = Some(word_count);
        self.reading_time = Some(reading_time);
        self
    }
}

/// A persisted clipped page.
///
/// `word_count` and `reading_time` are absent on records written by schema v1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: SnapshotId,
    pub title: String,
    pub url: String,
    pub timestamp: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_time: Option<u32>,
}

impl Snapshot {
    /// Parsed capture time, or `None` when the stored text is not RFC 3339.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Current time in the `toISOString` shape: UTC, millisecond precision, `Z` suffix.
pub fn capture_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_snapshot_uses_camel_case_payload() {
        let page = NewSnapshot::new("A", "http://a.test", "hello").with_metrics(1, 1);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["wordCount"], 1);
        assert_eq!(json["readingTime"], 1);
        assert!(json.get("timestamp").is_none());
        assert!(json.get("favicon").is_none());
    }

    #[test]
    fn test_new_snapshot_tolerates_missing_optional_fields() {
        let page: NewSnapshot =
            serde_json::from_str(r#"{"url":"http://b.test","content":"world"}"#).unwrap();
        assert_eq!(page.title, "");
        assert_eq!(page.word_count, None);
        assert_eq!(page.reading_time, None);
        assert_eq!(page.timestamp, None);
    }

    #[test]
    fn test_capture_timestamp_is_iso_8601_utc() {
        let ts = capture_timestamp();
        assert!(ts.ends_with('Z'), "unexpected timestamp: {}", ts);
        assert!(DateTime::parse_from_rfc3339(&ts).is_ok());
        // 2024-01-01T00:00:00.000Z
        assert_eq!(ts.len(), 24);
    }

    #[test]
    fn test_captured_at_rejects_garbage() {
        let snapshot = Snapshot {
            id: SnapshotId::new(1),
            title: String::new(),
            url: "http://a.test".to_string(),
            timestamp: "yesterday".to_string(),
            content: String::new(),
            favicon: None,
            word_count: None,
            reading_time: None,
        };
        assert!(snapshot.captured_at().is_none());
    }
}
