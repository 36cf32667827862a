//! Token lifecycle management for the Drive backend
//!
//! [`AuthManager`] is the single entry point the storage layer uses to
//! obtain an access token. It layers the pieces of this module: cached
//! tokens from the [`TokenStore`], silent refresh via [`OAuthFlow`], and
//! the full interactive consent flow as a last resort.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::drive::auth::client_secrets::ClientSecrets;
use crate::drive::auth::flow::{OAuthFlow, OAuthFlowConfig, DEFAULT_CONSENT_TIMEOUT, DRIVE_FILE_SCOPE};
use crate::drive::auth::token_store::TokenStore;
use crate::error::Result;

/// Manages OAuth credentials for the Drive backend.
///
/// The manager never holds tokens in memory across calls; every request
/// for an access token consults the persisted [`TokenStore`], so separate
/// stores sharing one token file observe each other's refreshes.
pub struct AuthManager {
    http: Arc<reqwest::Client>,
    token_store: TokenStore,
    secrets_path: PathBuf,
    scopes: Vec<String>,
    redirect_port: u16,
    consent_timeout: Duration,
}

impl AuthManager {
    /// Creates a new `AuthManager`.
    ///
    /// `secrets_path` points at the OAuth client-secret file; it is not
    /// read until a token actually has to be acquired, so a missing file
    /// only fails when interactive authorization becomes necessary.
    pub fn new(http: Arc<reqwest::Client>, secrets_path: PathBuf, token_path: PathBuf) -> Self {
        Self {
            http,
            token_store: TokenStore::new(token_path),
            secrets_path,
            scopes: vec![DRIVE_FILE_SCOPE.to_string()],
            redirect_port: 0,
            consent_timeout: DEFAULT_CONSENT_TIMEOUT,
        }
    }

    /// Overrides the consent-flow timeout. Mainly useful in tests.
    pub fn with_consent_timeout(mut self, timeout: Duration) -> Self {
        self.consent_timeout = timeout;
        self
    }

    /// Returns a valid access token, acquiring or refreshing as needed.
    ///
    /// Resolution order:
    ///
    /// 1. A stored token that is not expired is returned as-is.
    /// 2. An expired token with a refresh token is refreshed silently;
    ///    the refreshed credential is persisted before returning.
    /// 3. Otherwise the full interactive consent flow runs.
    ///
    /// `force_reauth` skips steps 1 and 2 and deletes any persisted
    /// token first, so the user is always shown the consent page.
    ///
    /// A failed refresh (revoked or invalid grant) deletes the persisted
    /// token and falls through to the interactive flow rather than
    /// surfacing the refresh error.
    ///
    /// # Errors
    ///
    /// Returns an error when the client-secret file is missing or
    /// malformed, or when the interactive flow itself fails.
    pub async fn access_token(&self, force_reauth: bool) -> Result<String> {
        if force_reauth {
            tracing::info!("forcing re-authorization; discarding stored token");
            self.token_store.delete()?;
        } else if let Some(token) = self.token_store.load()? {
            if !token.is_expired() {
                tracing::debug!("using cached access token");
                return Ok(token.access_token);
            }

            if let Some(refresh_token) = token.refresh_token.clone() {
                tracing::debug!("access token expired; attempting silent refresh");
                match self.flow()?.refresh(&refresh_token).await {
                    Ok(refreshed) => {
                        self.token_store.save(&refreshed)?;
                        return Ok(refreshed.access_token);
                    }
                    Err(e) => {
                        tracing::warn!(
                            "token refresh failed ({e}); falling back to interactive authorization"
                        );
                        self.token_store.delete()?;
                    }
                }
            } else {
                tracing::debug!("stored token expired with no refresh token");
            }
        }

        let token = self.flow()?.authorize().await?;
        self.token_store.save(&token)?;
        Ok(token.access_token)
    }

    /// Builds an [`OAuthFlow`], loading client secrets from disk.
    ///
    /// Secrets are re-read on every flow construction so a credential
    /// file dropped in after startup is picked up without a restart.
    fn flow(&self) -> Result<OAuthFlow> {
        let secrets = ClientSecrets::load(&self.secrets_path)?;
        let config = OAuthFlowConfig {
            secrets,
            scopes: self.scopes.clone(),
            redirect_port: self.redirect_port,
            consent_timeout: self.consent_timeout,
        };
        Ok(OAuthFlow::new(Arc::clone(&self.http), config))
    }
}
