//! Pattern table: abbreviations and what they expand to

use std::fmt;
use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Default format of the `date` provider
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";
/// Default format of the `time` provider
pub const DEFAULT_TIME_FORMAT: &str = "%I:%M %p";

/// Zero-argument text source evaluated when its pattern matches
#[derive(Clone)]
pub struct Provider(Arc<dyn Fn() -> String + Send + Sync>);

impl Provider {
    pub fn new(f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Local date/time rendered with a strftime `format`
    pub fn local_time(format: &str) -> Result<Self, TableError> {
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(TableError::InvalidFormat(format.to_string()));
        }
        let format = format.to_string();
        Ok(Self::new(move || Local::now().format(&format).to_string()))
    }

    pub fn call(&self) -> String {
        (self.0)()
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Provider(..)")
    }
}

/// What a hotstring expands to
#[derive(Debug, Clone)]
pub enum Action {
    /// Fixed text
    Literal(String),
    /// Text computed at match time
    Provider(Provider),
}

impl Action {
    /// Text to type for this action, evaluating providers now
    pub fn expansion(&self) -> String {
        match self {
            Action::Literal(text) => text.clone(),
            Action::Provider(provider) => provider.call(),
        }
    }
}

/// A single abbreviation and its action
#[derive(Debug, Clone)]
pub struct HotstringEntry {
    pattern: String,
    action: Action,
}

impl HotstringEntry {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Pattern length in characters
    pub fn len(&self) -> usize {
        self.pattern.chars().count()
    }
}

/// Provider objects accepted in table files
#[derive(Debug, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case", deny_unknown_fields)]
enum ProviderSpec {
    Date { format: Option<String> },
    Time { format: Option<String> },
}

impl ProviderSpec {
    fn build(self) -> Result<Provider, TableError> {
        match self {
            ProviderSpec::Date { format } => {
                Provider::local_time(format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT))
            }
            ProviderSpec::Time { format } => {
                Provider::local_time(format.as_deref().unwrap_or(DEFAULT_TIME_FORMAT))
            }
        }
    }
}

/// Ordered pattern → action mapping
///
/// Insertion order decides which entry wins when several patterns match
/// at once.
#[derive(Debug, Clone, Default)]
pub struct PatternTable {
    entries: Vec<HotstringEntry>,
}

impl PatternTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry
    ///
    /// Replacing keeps the entry at its original position.
    pub fn insert(
        &mut self,
        pattern: impl Into<String>,
        action: Action,
    ) -> Result<&mut Self, TableError> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(TableError::EmptyPattern);
        }
        match self.entries.iter_mut().find(|e| e.pattern == pattern) {
            Some(entry) => entry.action = action,
            None => self.entries.push(HotstringEntry { pattern, action }),
        }
        Ok(self)
    }

    pub fn literal(
        &mut self,
        pattern: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<&mut Self, TableError> {
        self.insert(pattern, Action::Literal(text.into()))
    }

    pub fn provider(
        &mut self,
        pattern: impl Into<String>,
        provider: Provider,
    ) -> Result<&mut Self, TableError> {
        self.insert(pattern, Action::Provider(provider))
    }

    /// Parse a JSON object of pattern → action, in file order
    ///
    /// A string value is a literal; an object with a `provider` key is a
    /// date/time provider. Anything else is rejected.
    pub fn from_json(text: &str) -> Result<Self, TableError> {
        let object: Map<String, Value> = serde_json::from_str(text)?;
        let mut table = Self::new();
        for (pattern, value) in object {
            let action = match value {
                Value::String(text) => Action::Literal(text),
                Value::Object(_) => {
                    let spec: ProviderSpec = serde_json::from_value(value).map_err(|e| {
                        TableError::UnrecognizedAction {
                            pattern: pattern.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                    Action::Provider(spec.build()?)
                }
                other => {
                    return Err(TableError::UnrecognizedAction {
                        pattern,
                        reason: format!("expected text or a provider object, found {other}"),
                    })
                }
            };
            table.insert(pattern, action)?;
        }
        Ok(table)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HotstringEntry> {
        self.entries.iter()
    }

    #[cfg(test)]
    pub fn get(&self, pattern: &str) -> Option<&HotstringEntry> {
        self.entries.iter().find(|e| e.pattern == pattern)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Length in characters of the longest pattern
    pub fn max_pattern_len(&self) -> usize {
        self.entries.iter().map(HotstringEntry::len).max().unwrap_or(0)
    }
}

/// Errors that can occur while building a pattern table
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("hotstring patterns must not be empty")]
    EmptyPattern,

    #[error("unrecognized action for {pattern:?}: {reason}")]
    UnrecognizedAction { pattern: String, reason: String },

    #[error("invalid date/time format {0:?}")]
    InvalidFormat(String),

    #[error("invalid hotstring table: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_insertion_order_is_kept() {
        let mut table = PatternTable::new();
        table.literal("dz", "X").unwrap().literal("/dz", "Y").unwrap();
        let patterns: Vec<_> = table.iter().map(|e| e.pattern()).collect();
        assert_eq!(patterns, vec!["dz", "/dz"]);
        assert_eq!(table.max_pattern_len(), 3);
    }

    #[test]
    fn test_reinsert_replaces_in_place() {
        let mut table = PatternTable::new();
        table
            .literal("/a", "one")
            .unwrap()
            .literal("/b", "two")
            .unwrap()
            .literal("/a", "three")
            .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.iter().next().unwrap().action().expansion(), "three");
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let mut table = PatternTable::new();
        assert!(matches!(
            table.literal("", "x"),
            Err(TableError::EmptyPattern)
        ));
    }

    #[test]
    fn test_pattern_length_counts_characters() {
        let mut table = PatternTable::new();
        table.literal("/é", "e").unwrap();
        assert_eq!(table.max_pattern_len(), 2);
    }

    #[test]
    fn test_provider_is_called_per_expansion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let action = Action::Provider(Provider::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            format!("call {n}")
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(action.expansion(), "call 1");
        assert_eq!(action.expansion(), "call 2");
    }

    #[test]
    fn test_from_json_keeps_file_order() {
        let table = PatternTable::from_json(
            r#"{
                "/zz": "last alphabetically, first in file",
                "/aa": "first alphabetically",
                "/date": {"provider": "date"},
                "/time": {"provider": "time", "format": "%H:%M"}
            }"#,
        )
        .unwrap();
        let patterns: Vec<_> = table.iter().map(|e| e.pattern()).collect();
        assert_eq!(patterns, vec!["/zz", "/aa", "/date", "/time"]);
        assert!(matches!(
            table.get("/date").unwrap().action(),
            Action::Provider(_)
        ));
        assert_eq!(table.get("/time").unwrap().action().expansion().len(), 5);
    }

    #[test]
    fn test_from_json_rejects_unknown_shapes() {
        let err = PatternTable::from_json(r#"{"/n": 42}"#).unwrap_err();
        assert!(matches!(err, TableError::UnrecognizedAction { ref pattern, .. } if pattern == "/n"));

        let err = PatternTable::from_json(r#"{"/x": {"provider": "weather"}}"#).unwrap_err();
        assert!(matches!(err, TableError::UnrecognizedAction { .. }));

        let err = PatternTable::from_json(r#"{"/x": ["a"]}"#).unwrap_err();
        assert!(matches!(err, TableError::UnrecognizedAction { .. }));
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        assert!(matches!(
            PatternTable::from_json(r#"{"": "x"}"#),
            Err(TableError::EmptyPattern)
        ));
        assert!(matches!(
            PatternTable::from_json(r#"{"/d": {"provider": "date", "format": "%Q"}}"#),
            Err(TableError::InvalidFormat(_))
        ));
        assert!(matches!(
            PatternTable::from_json("[1, 2]"),
            Err(TableError::Json(_))
        ));
    }
}
