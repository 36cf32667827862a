//! Local filesystem history store
//!
//! Persists the conversation history as a single pretty-printed JSON
//! array file under a per-user data directory. Every failure mode
//! degrades to an empty history or a skipped write with a log line;
//! storage problems never surface as errors to the conversation loop.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::{Settings, HISTORY_DIR_ENV};
use crate::error::Result;
use crate::history::{parse_history, render_history, ConversationEntry};
use crate::store::HistoryStore;

/// History store backed by a JSON file on the local filesystem.
pub struct LocalHistoryStore {
    path: PathBuf,
    // Serializes the read-append-write cycle so concurrent saves cannot
    // interleave and drop entries.
    save_lock: Mutex<()>,
}

impl LocalHistoryStore {
    /// Creates a store from settings, resolving the history directory.
    ///
    /// Directory precedence: the `ECHOVAULT_HISTORY_DIR` environment
    /// variable, then `local_storage_path` from settings, then the
    /// per-user data directory. Relative overrides are anchored to the
    /// working directory at construction time.
    ///
    /// The directory is created eagerly; creation failure is logged and
    /// deferred, since the target may become writable before the first
    /// save.
    pub fn new(settings: &Settings) -> Self {
        let dir = resolve_history_dir(settings);
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), "failed to create history directory: {e}");
        }
        let path = dir.join(&settings.history_filename);
        tracing::debug!(path = %path.display(), "local history store initialized");
        Self {
            path,
            save_lock: Mutex::new(()),
        }
    }

    /// Creates a store pointed at an explicit file path. Used by tests
    /// and by callers that manage their own layout.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            save_lock: Mutex::new(()),
        }
    }

    /// Full path of the history file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_save(&self, sender: &str, message: &str) -> Result<()> {
        let mut entries = self.try_load()?;
        entries.push(ConversationEntry::new(sender, message));

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let rendered = render_history(&entries)?;
        std::fs::write(&self.path, rendered)?;
        Ok(())
    }

    fn try_load(&self) -> Result<Vec<ConversationEntry>> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no history file yet; starting empty");
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(parse_history(&content))
    }
}

#[async_trait]
impl HistoryStore for LocalHistoryStore {
    async fn save(&self, sender: &str, message: &str) -> bool {
        let _guard = self.save_lock.lock().await;
        match self.try_save(sender, message) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(path = %self.path.display(), "failed to save history: {e}");
                false
            }
        }
    }

    async fn load(&self) -> Vec<ConversationEntry> {
        match self.try_load() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(path = %self.path.display(), "failed to load history: {e}");
                Vec::new()
            }
        }
    }

    async fn authenticate(&self) -> bool {
        // Local storage needs no credentials.
        true
    }
}

/// Resolves the directory the history file lives in.
fn resolve_history_dir(settings: &Settings) -> PathBuf {
    if let Ok(dir) = std::env::var(HISTORY_DIR_ENV) {
        if !dir.is_empty() {
            tracing::debug!(%dir, "history directory overridden via {HISTORY_DIR_ENV}");
            return absolutize(PathBuf::from(dir));
        }
    }

    if let Some(path) = &settings.local_storage_path {
        return absolutize(path.clone());
    }

    match crate::config::data_dir() {
        Ok(dir) => dir.join("history"),
        Err(e) => {
            tracing::warn!("could not determine data directory ({e}); using .echovault/history");
            PathBuf::from(".echovault").join("history")
        }
    }
}

/// Anchors a relative path to the working directory at resolution time,
/// so later cwd changes do not move the history file mid-session.
fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> LocalHistoryStore {
        LocalHistoryStore::with_path(dir.path().join("echo_chat_history.json"))
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(store.save("user", "hello").await);
        assert!(store.save("assistant", "hi there").await);

        let loaded = store.load().await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].sender, "user");
        assert_eq!(loaded[0].message, "hello");
        assert_eq!(loaded[1].sender, "assistant");
        assert_eq!(loaded[1].message, "hi there");
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_returns_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "not json at all").unwrap();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_non_array_json_returns_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{}").unwrap();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_appends_to_existing_history() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save("user", "one").await;
        store.save("user", "two").await;
        store.save("user", "three").await;

        let loaded = store.load().await;
        let messages: Vec<&str> = loaded.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_save_onto_corrupt_file_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "garbage").unwrap();

        assert!(store.save("user", "recovered").await);
        let loaded = store.load().await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].message, "recovered");
    }

    #[tokio::test]
    async fn test_save_creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store =
            LocalHistoryStore::with_path(dir.path().join("deep").join("nested").join("h.json"));
        assert!(store.save("user", "x").await);
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_entries_have_timestamps() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save("user", "hi").await;

        let loaded = store.load().await;
        assert!(chrono::DateTime::parse_from_rfc3339(&loaded[0].timestamp).is_ok());
    }

    #[tokio::test]
    async fn test_authenticate_always_succeeds() {
        let dir = TempDir::new().unwrap();
        assert!(store_in(&dir).authenticate().await);
    }

    #[tokio::test]
    async fn test_file_is_pretty_printed_json_array() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save("user", "hi").await;

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.trim_start().starts_with('['));
        assert!(raw.contains('\n'), "history file should be pretty-printed");
    }

    #[test]
    fn test_relative_storage_path_anchored_to_cwd() {
        let settings = Settings {
            local_storage_path: Some(PathBuf::from("rel").join("history")),
            ..Settings::default()
        };

        let dir = resolve_history_dir(&settings);
        assert!(dir.is_absolute(), "resolved dir must be absolute: {dir:?}");
        assert!(dir.ends_with(PathBuf::from("rel").join("history")));
    }

    #[test]
    fn test_absolute_storage_path_used_verbatim() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            local_storage_path: Some(dir.path().to_path_buf()),
            ..Settings::default()
        };
        assert_eq!(resolve_history_dir(&settings), dir.path());
    }

    #[tokio::test]
    async fn test_concurrent_saves_lose_no_entries() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(store_in(&dir));

        let mut tasks = Vec::new();
        for i in 0..8 {
            let store = std::sync::Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store.save("user", format!("writer {i}").as_str()).await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap());
        }

        // The save lock serializes read-append-write cycles, so all
        // eight entries land.
        assert_eq!(store.load().await.len(), 8);
    }
}
