//! Page capture: excerpt truncation and reading metrics.
//!
//! Producers run this before handing a page to the store; the store itself
//! never truncates or recomputes anything.

use super::snapshot::{capture_timestamp, NewSnapshot};
use crate::config::Config;
use serde::{Deserialize, Serialize};

/// Limits applied when turning page text into an excerpt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub excerpt_words: usize,
    pub words_per_minute: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            excerpt_words: 100,
            words_per_minute: 200,
        }
    }
}

impl From<&Config> for CaptureSettings {
    fn from(config: &Config) -> Self {
        Self {
            excerpt_words: config.excerpt_words,
            words_per_minute: config.words_per_minute,
        }
    }
}

/// Truncated text plus the metrics derived from the full text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Excerpt {
    pub content: String,
    pub word_count: u32,
    pub reading_time: u32,
}

impl Excerpt {
    pub fn from_text(text: &str, settings: &CaptureSettings) -> Self {
        let words: Vec<&str> = text.split_whitespace().collect();
        let word_count = u32::try_from(words.len()).unwrap_or(u32::MAX);

        let mut content = words
            .iter()
            .take(settings.excerpt_words)
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        if words.len() > settings.excerpt_words {
            content.push_str("...");
        }

        let wpm = settings.words_per_minute.max(1);
        Self {
            content,
            word_count,
            reading_time: word_count.div_ceil(wpm),
        }
    }
}

/// Raw page data as seen by the capturing surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCapture {
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub favicon: Option<String>,
    #[serde(default)]
    pub body_text: String,
}

impl PageCapture {
    pub fn into_snapshot(self, settings: &CaptureSettings) -> NewSnapshot {
        let excerpt = Excerpt::from_text(&self.body_text, settings);
        NewSnapshot {
            title: self.title,
            url: self.url,
            timestamp: Some(capture_timestamp()),
            content: excerpt.content,
            favicon: self.favicon.filter(|f| !f.trim().is_empty()),
            word_count: Some(excerpt.word_count),
            reading_time: Some(excerpt.reading_time),
        }
    }
}
