//! Conversation history data model
//!
//! This module defines the [`ConversationEntry`] record and the lenient
//! parsing rules shared by the local and Drive-backed stores.
//!
//! A history is a JSON array of entries, written pretty-printed. Readers
//! tolerate compact or pretty form; an empty, missing, or malformed file
//! degrades to an empty history rather than an error, favoring
//! availability of the assistant over strict correctness of an old log.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single persisted conversation message.
///
/// Entries are immutable once written; a history only ever grows by
/// appending new entries, so insertion order is chronological order.
///
/// # Examples
///
/// ```
/// use echovault::history::ConversationEntry;
///
/// let entry = ConversationEntry::new("user", "hello");
/// assert_eq!(entry.sender, "user");
/// assert_eq!(entry.message, "hello");
/// assert!(!entry.timestamp.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    /// RFC 3339 timestamp generated at write time.
    pub timestamp: String,

    /// Short string identifying the message origin, e.g. `"user"`,
    /// `"assistant"`, `"system"`.
    pub sender: String,

    /// Free-text message content.
    pub message: String,
}

impl ConversationEntry {
    /// Creates a new entry with the current UTC time as its timestamp.
    pub fn new(sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            sender: sender.into(),
            message: message.into(),
        }
    }
}

/// Parses history file content, degrading to an empty history on any
/// malformed input.
///
/// Returns an empty vector when the content is blank, is not valid JSON,
/// or is valid JSON but not an array of entries. Parse failures are
/// logged at `warn` level; this function never errors.
///
/// # Examples
///
/// ```
/// use echovault::history::parse_history;
///
/// assert!(parse_history("").is_empty());
/// assert!(parse_history("not json").is_empty());
/// assert!(parse_history("{}").is_empty());
///
/// let parsed = parse_history(r#"[{"timestamp":"2024-01-01T00:00:00Z","sender":"user","message":"hi"}]"#);
/// assert_eq!(parsed.len(), 1);
/// assert_eq!(parsed[0].message, "hi");
/// ```
pub fn parse_history(content: &str) -> Vec<ConversationEntry> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<ConversationEntry>>(content) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Malformed history content, treating as empty: {}", e);
            Vec::new()
        }
    }
}

/// Serializes a history to the pretty-printed JSON array form used by
/// both stores.
pub fn render_history(entries: &[ConversationEntry]) -> Result<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}
