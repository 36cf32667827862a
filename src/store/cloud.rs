//! Google Drive history store
//!
//! Mirrors the local store's file format on the user's cloud drive: one
//! JSON array file inside a named application folder. The folder and
//! file are resolved lazily on first use and their identifiers cached
//! for the lifetime of the store; access tokens are re-checked on every
//! operation so mid-session expiry triggers a silent refresh.
//!
//! Every save rewrites the whole remote file. That is O(history) bytes
//! per message, acceptable for a personal chat log.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::Settings;
use crate::drive::auth::AuthManager;
use crate::drive::client::DriveClient;
use crate::drive::resolver::{DriveResolver, HISTORY_MIME_TYPE};
use crate::error::Result;
use crate::history::{parse_history, render_history, ConversationEntry};
use crate::store::HistoryStore;

/// Lazily resolved remote identifiers.
#[derive(Default)]
struct RemoteState {
    file_id: Option<String>,
}

/// History store backed by a file on Google Drive.
pub struct DriveHistoryStore {
    auth: AuthManager,
    client: DriveClient,
    folder_name: String,
    history_filename: String,
    state: Mutex<RemoteState>,
    // Serializes the download-append-upload cycle so concurrent saves
    // cannot interleave and drop entries.
    save_lock: Mutex<()>,
}

impl DriveHistoryStore {
    /// Creates a Drive store from settings.
    ///
    /// Construction is cheap and offline; no network traffic or consent
    /// prompt happens until the first operation.
    ///
    /// # Errors
    ///
    /// Fails only when the credentials or token path cannot be resolved
    /// (no usable home directory).
    pub fn new(settings: &Settings, http: Arc<reqwest::Client>) -> Result<Self> {
        let auth = AuthManager::new(
            Arc::clone(&http),
            settings.credentials_path()?,
            settings.token_path()?,
        );
        Ok(Self::with_components(
            auth,
            DriveClient::new(http),
            settings.remote_folder_name.clone(),
            settings.history_filename.clone(),
        ))
    }

    /// Assembles a store from pre-built components. Tests use this to
    /// inject a client pointed at a mock server.
    pub fn with_components(
        auth: AuthManager,
        client: DriveClient,
        folder_name: String,
        history_filename: String,
    ) -> Self {
        Self {
            auth,
            client,
            folder_name,
            history_filename,
            state: Mutex::new(RemoteState::default()),
            save_lock: Mutex::new(()),
        }
    }

    /// Runs the credential check eagerly, optionally discarding any
    /// stored token first so the consent page is always shown.
    ///
    /// Resolves the remote folder and file as a side effect, so a
    /// successful call means subsequent saves and loads will not pause
    /// for interactive consent.
    pub async fn try_authenticate(&self, force_reauth: bool) -> Result<()> {
        let token = self.auth.access_token(force_reauth).await?;
        let mut state = self.state.lock().await;
        // Resolve even when cached: forced re-auth may follow an account
        // switch, which invalidates previously resolved identifiers.
        if force_reauth || state.file_id.is_none() {
            state.file_id = Some(self.resolve_file(&token).await?);
        }
        Ok(())
    }

    /// Returns the history file id, resolving folder and file on first
    /// use. At most one resolution cycle runs per call; there is no
    /// retry loop.
    async fn ensure_file_id(&self, token: &str) -> Result<String> {
        let mut state = self.state.lock().await;
        if let Some(id) = &state.file_id {
            return Ok(id.clone());
        }
        let id = self.resolve_file(token).await?;
        state.file_id = Some(id.clone());
        Ok(id)
    }

    async fn resolve_file(&self, token: &str) -> Result<String> {
        let resolver = DriveResolver::new(&self.client);
        let folder_id = resolver.ensure_folder(token, &self.folder_name).await?;
        resolver
            .ensure_file(token, &folder_id, &self.history_filename)
            .await
    }

    async fn try_save(&self, sender: &str, message: &str) -> Result<()> {
        let token = self.auth.access_token(false).await?;
        let file_id = self.ensure_file_id(&token).await?;

        let current = self.client.download_file(&token, &file_id).await?;
        let mut entries = parse_history(&current);
        entries.push(ConversationEntry::new(sender, message));

        let rendered = render_history(&entries)?;
        self.client
            .update_file(&token, &file_id, rendered, HISTORY_MIME_TYPE)
            .await
    }

    async fn try_load(&self) -> Result<Vec<ConversationEntry>> {
        let token = self.auth.access_token(false).await?;
        let file_id = self.ensure_file_id(&token).await?;
        let content = self.client.download_file(&token, &file_id).await?;
        Ok(parse_history(&content))
    }
}

#[async_trait]
impl HistoryStore for DriveHistoryStore {
    async fn save(&self, sender: &str, message: &str) -> bool {
        let _guard = self.save_lock.lock().await;
        match self.try_save(sender, message).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("failed to save history to drive: {e}");
                false
            }
        }
    }

    async fn load(&self) -> Vec<ConversationEntry> {
        match self.try_load().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("failed to load history from drive: {e}");
                Vec::new()
            }
        }
    }

    async fn authenticate(&self) -> bool {
        match self.try_authenticate(false).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("drive authentication failed: {e}");
                false
            }
        }
    }
}
