//! Conversation history storage
//!
//! A [`HistoryStore`] persists the conversation as an ordered list of
//! entries. Two backends exist: the local filesystem and Google Drive.
//! [`init_store`] selects between them from settings, falling back to
//! local storage when the cloud backend cannot be set up, and
//! [`StorageHandle`] carries the active store through the application so
//! the backend can be swapped at runtime.

pub mod cloud;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::{Settings, StorageMode};
use crate::history::ConversationEntry;

pub use cloud::DriveHistoryStore;
pub use local::LocalHistoryStore;

/// Persistence backend for conversation history.
///
/// Implementations absorb their own failures: `save` reports success as
/// a boolean and `load` returns an empty history when the backend is
/// unreadable. The conversation loop keeps running either way.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends one message to the persisted history: reads the current
    /// history, adds an entry with a fresh timestamp, and writes the
    /// full list back. Returns `false` when the write did not happen.
    async fn save(&self, sender: &str, message: &str) -> bool;

    /// Loads the full history. Returns an empty list when nothing is
    /// stored or the stored content is unreadable.
    async fn load(&self) -> Vec<ConversationEntry>;

    /// Runs the backend's credential check eagerly. Backends without
    /// credentials return `true` immediately.
    async fn authenticate(&self) -> bool;
}

/// Builds the history store selected by `storage_mode`.
///
/// Cloud mode constructs a Drive store and runs its credential check
/// immediately. A valid cached token is enough; the client-secret file
/// is only consulted when an interactive consent flow is needed. When
/// the check fails (no usable token and no client-secret file, declined
/// consent, dead network) the factory logs the reason and falls back to
/// local storage rather than failing. The fallback decision is made
/// here, once, so callers always receive a usable store.
///
/// The cloud path may block on the interactive consent flow, so run
/// this off the UI thread.
pub async fn init_store(settings: &Settings, http: Arc<reqwest::Client>) -> Arc<dyn HistoryStore> {
    match settings.storage_mode {
        StorageMode::Local => {
            tracing::info!("using local history storage");
            Arc::new(LocalHistoryStore::new(settings))
        }
        StorageMode::Cloud => match try_init_cloud(settings, http).await {
            Ok(store) => {
                tracing::info!("using drive history storage");
                store
            }
            Err(e) => {
                tracing::warn!("drive storage unavailable ({e}); falling back to local storage");
                Arc::new(LocalHistoryStore::new(settings))
            }
        },
    }
}

async fn try_init_cloud(
    settings: &Settings,
    http: Arc<reqwest::Client>,
) -> crate::error::Result<Arc<dyn HistoryStore>> {
    let store = DriveHistoryStore::new(settings, http)?;
    store.try_authenticate(false).await?;
    Ok(Arc::new(store))
}

/// Shared handle to the active history store.
///
/// The handle is created once at startup and passed to whoever needs
/// storage; there is no process-global store. [`reinitialize`] swaps the
/// backend in place, for example after the user flips `storage_mode` in
/// settings. In-flight operations on the previous store complete
/// normally against the old backend.
///
/// [`reinitialize`]: StorageHandle::reinitialize
#[derive(Clone)]
pub struct StorageHandle {
    inner: Arc<RwLock<Arc<dyn HistoryStore>>>,
}

impl StorageHandle {
    /// Creates a handle by running store selection against settings.
    pub async fn initialize(settings: &Settings, http: Arc<reqwest::Client>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(init_store(settings, http).await)),
        }
    }

    /// Wraps an already constructed store.
    pub fn from_store(store: Arc<dyn HistoryStore>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Returns the currently active store.
    pub async fn active(&self) -> Arc<dyn HistoryStore> {
        self.inner.read().await.clone()
    }

    /// Re-runs store selection and swaps the active store. All clones of
    /// this handle observe the new backend on their next `active` call.
    pub async fn reinitialize(&self, settings: &Settings, http: Arc<reqwest::Client>) {
        let store = init_store(settings, http).await;
        *self.inner.write().await = store;
    }
}
