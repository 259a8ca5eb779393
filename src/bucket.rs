//! The Result Bucket contract shared by every branch and stage.
//!
//! A [`ResultBucket`] is the single shape written into [`RunState`]: a list
//! of per-source reports, accounting fields, and a free-form details map.
//! Collectors normalize whatever their provider returns into
//! [`ResearchItem`]s before the bucket crosses the branch boundary, so the
//! core never inspects raw provider payloads.
//!
//! [`RunState`]: crate::state::RunState
//!
//! # Examples
//!
//! ```rust
//! use gatherweave::bucket::{ResearchItem, ResultBucket, SourceReport};
//! use serde_json::json;
//!
//! let bucket = ResultBucket::new()
//!     .with_source(SourceReport::new(
//!         "tavily",
//!         vec![ResearchItem::from_text("Qubits encode superposed state.")],
//!     ))
//!     .with_detail("topic", json!("quantum computing"));
//!
//! assert!(!bucket.has_error());
//! assert_eq!(bucket.sources[0].items.len(), 1);
//! ```

use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Research depth requested by the caller.
///
/// The mode is a cross-cutting parameter: the coordinator passes it through
/// untouched and collectors use [`item_cap`](Self::item_cap) to bound how
/// many items they place in each source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Simple,
    Extended,
}

impl Mode {
    /// Maximum number of items a collector should report per source.
    #[must_use]
    pub fn item_cap(&self) -> usize {
        match self {
            Mode::Simple => 2,
            Mode::Extended => 10,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Simple => "simple",
            Mode::Extended => "extended",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized research record.
///
/// Every field is optional because providers disagree about shape; the
/// normalization aliases in [`ResearchItem::normalize`] fold the common
/// variants (title/name/headline, snippet/description, url/link, ...) into
/// this single record so downstream stages never branch on raw shapes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
}

impl ResearchItem {
    /// Wrap a bare text snippet as an item (content only).
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Default::default()
        }
    }

    /// Normalize an arbitrary provider payload into a `ResearchItem`.
    ///
    /// Strings become content-only items. Objects are probed for the usual
    /// field aliases. Anything else is serialized and kept as content so no
    /// provider output is silently dropped.
    pub fn normalize(raw: &Value) -> Self {
        match raw {
            Value::String(s) => Self::from_text(s.clone()),
            Value::Object(map) => {
                let pick = |keys: &[&str]| -> Option<String> {
                    keys.iter()
                        .filter_map(|k| map.get(*k))
                        .find_map(Self::value_to_text)
                };
                let title = pick(&["title", "name", "headline"]);
                let summary = pick(&["summary", "snippet", "description"]);
                let content = pick(&["content", "raw_content", "full_content", "body", "text"])
                    .or_else(|| summary.clone())
                    .or_else(|| title.clone());
                Self {
                    title,
                    summary,
                    content,
                    source: pick(&["link", "url", "source"]),
                    published: pick(&["published", "published_date", "date", "datetime"]),
                    authors: pick(&["authors", "author", "byline"]),
                }
            }
            other => Self::from_text(other.to_string()),
        }
    }

    fn value_to_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Null => None,
            Value::String(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// The text the indexing stage should chunk for this item.
    ///
    /// Prefers full content, then summary, then title; falls back to the
    /// serialized record so heterogeneous items still index. Returns `None`
    /// when the item carries no text at all.
    pub fn index_text(&self) -> Option<String> {
        for candidate in [&self.content, &self.summary, &self.title] {
            if let Some(text) = candidate {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
        if *self == Self::default() {
            return None;
        }
        serde_json::to_string(self).ok()
    }
}

/// Items produced by one named provider within a branch, plus the metadata
/// describing that invocation (limits, counts, per-source errors).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SourceReport {
    pub name: String,
    pub items: Vec<ResearchItem>,
    #[serde(default)]
    pub metadata: FxHashMap<String, Value>,
}

impl SourceReport {
    pub fn new(name: impl Into<String>, items: Vec<ResearchItem>) -> Self {
        Self {
            name: name.into(),
            items,
            metadata: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

/// The standard output shape every branch and stage writes into Run State.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResultBucket {
    #[serde(default)]
    pub sources: Vec<SourceReport>,
    #[serde(default)]
    pub elapsed: Duration,
    #[serde(default)]
    pub tokens: u64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub details: FxHashMap<String, Value>,
}

impl ResultBucket {
    pub const ERROR_KEY: &'static str = "error";
    pub const NOTE_KEY: &'static str = "note";

    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket representing an absorbed failure: no sources, a non-empty
    /// `details.error`, zero accounting.
    pub fn from_error(message: impl Into<String>) -> Self {
        Self::new().with_detail(Self::ERROR_KEY, Value::String(message.into()))
    }

    /// Bucket representing a "nothing to do" outcome (empty input, empty
    /// index): structured, explained, not an error.
    pub fn from_note(message: impl Into<String>) -> Self {
        Self::new().with_detail(Self::NOTE_KEY, Value::String(message.into()))
    }

    #[must_use]
    pub fn with_source(mut self, source: SourceReport) -> Self {
        self.sources.push(source);
        self
    }

    #[must_use]
    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }

    #[must_use]
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    #[must_use]
    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens = tokens;
        self
    }

    #[must_use]
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Whether this bucket records an absorbed error.
    pub fn has_error(&self) -> bool {
        self.details
            .get(Self::ERROR_KEY)
            .map(|v| !matches!(v, Value::Null))
            .unwrap_or(false)
    }

    /// The recorded error message, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.details.get(Self::ERROR_KEY).and_then(Value::as_str)
    }

    /// Total item count across all sources.
    pub fn item_count(&self) -> usize {
        self.sources.iter().map(|s| s.items.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_maps_common_aliases() {
        let raw = json!({
            "headline": "Qubit milestone",
            "snippet": "A short take.",
            "body": "Full article text.",
            "url": "https://example.com/a",
            "date": "2025-03-01",
            "byline": "A. Researcher"
        });
        let item = ResearchItem::normalize(&raw);
        assert_eq!(item.title.as_deref(), Some("Qubit milestone"));
        assert_eq!(item.summary.as_deref(), Some("A short take."));
        assert_eq!(item.content.as_deref(), Some("Full article text."));
        assert_eq!(item.source.as_deref(), Some("https://example.com/a"));
        assert_eq!(item.published.as_deref(), Some("2025-03-01"));
        assert_eq!(item.authors.as_deref(), Some("A. Researcher"));
    }

    #[test]
    fn normalize_falls_back_to_summary_then_title() {
        let raw = json!({"title": "Only a title"});
        let item = ResearchItem::normalize(&raw);
        assert_eq!(item.content.as_deref(), Some("Only a title"));
    }

    #[test]
    fn normalize_string_becomes_content() {
        let item = ResearchItem::normalize(&json!("plain finding"));
        assert_eq!(item.index_text().as_deref(), Some("plain finding"));
        assert!(item.title.is_none());
    }

    #[test]
    fn index_text_skips_blank_fields() {
        let item = ResearchItem {
            content: Some("   ".into()),
            summary: Some("usable summary".into()),
            ..Default::default()
        };
        assert_eq!(item.index_text().as_deref(), Some("usable summary"));
    }

    #[test]
    fn empty_item_has_no_index_text() {
        assert_eq!(ResearchItem::default().index_text(), None);
    }

    #[test]
    fn error_bucket_reports_error() {
        let bucket = ResultBucket::from_error("provider unreachable");
        assert!(bucket.has_error());
        assert_eq!(bucket.error_message(), Some("provider unreachable"));
        assert!(bucket.sources.is_empty());
    }

    #[test]
    fn note_bucket_is_not_an_error() {
        let bucket = ResultBucket::from_note("no data available for indexing");
        assert!(!bucket.has_error());
        assert_eq!(
            bucket.details.get(ResultBucket::NOTE_KEY),
            Some(&json!("no data available for indexing"))
        );
    }

    #[test]
    fn mode_caps_match_contract() {
        assert_eq!(Mode::Simple.item_cap(), 2);
        assert_eq!(Mode::Extended.item_cap(), 10);
    }
}
