//! OAuth token persistence
//!
//! Tokens are stored as a flat JSON object in a per-user token file so the
//! record stays portable and inspectable. Writing replaces the file
//! wholesale; there is no partial update.
//!
//! A token file that cannot be parsed is treated the same as a missing
//! one: the caller re-runs the authorization flow rather than failing.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ---------------------------------------------------------------------------
// StoredToken
// ---------------------------------------------------------------------------

/// A persisted OAuth token bundle.
///
/// `expiry` is an absolute UTC timestamp computed from the `expires_in`
/// seconds the token endpoint returns, stored alongside the access token
/// so that expiry can be determined without a server round-trip.
///
/// # Examples
///
/// ```
/// use echovault::drive::auth::token_store::StoredToken;
///
/// let token = StoredToken {
///     access_token: "tok".to_string(),
///     refresh_token: None,
///     expiry: None,
///     scopes: vec![],
///     token_uri: "https://oauth2.googleapis.com/token".to_string(),
/// };
///
/// // A token with no expiry is never considered expired.
/// assert!(!token.is_expired());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    /// The access token string issued by the authorization server.
    pub access_token: String,

    /// Refresh token used to obtain a new access token without re-running
    /// the interactive consent flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// UTC timestamp at which the access token expires. `None` means the
    /// token is treated as non-expiring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,

    /// OAuth scopes granted by the authorization server.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Token endpoint the record was issued by; kept in the file so the
    /// record is self-describing.
    pub token_uri: String,
}

impl StoredToken {
    /// Returns `true` when the access token is expired or about to expire.
    ///
    /// A 60-second buffer is applied so that callers have time to exchange
    /// the refresh token before the access token is rejected by the
    /// resource server. Tokens with no `expiry` are perpetually valid.
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            None => false,
            Some(expiry) => {
                let buffer = chrono::Duration::seconds(60);
                Utc::now() >= expiry - buffer
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TokenStore
// ---------------------------------------------------------------------------

/// File-backed accessor for the persisted token record.
///
/// # Examples
///
/// ```no_run
/// use std::path::PathBuf;
/// use echovault::drive::auth::token_store::{StoredToken, TokenStore};
///
/// # fn example() -> echovault::error::Result<()> {
/// let store = TokenStore::new(PathBuf::from("/home/user/.config/echo/token.json"));
/// if let Some(token) = store.load()? {
///     println!("cached token: {}", token.access_token);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Creates a token store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the persisted token record.
    ///
    /// Returns `Ok(None)` when the file does not exist, and also when the
    /// file exists but cannot be parsed; a corrupt token file means
    /// "re-authorize", never a hard failure.
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures other than a missing file.
    pub fn load(&self) -> Result<Option<StoredToken>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str::<StoredToken>(&contents) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                tracing::warn!(
                    "Token file {} is malformed ({}); will re-authenticate",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    /// Persists the token record, replacing the file wholesale.
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or the file write fails.
    pub fn save(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let rendered = serde_json::to_string_pretty(token)?;
        std::fs::write(&self.path, rendered)?;
        tracing::info!("Saved token to {}", self.path.display());
        Ok(())
    }

    /// Deletes the persisted token record.
    ///
    /// A missing file is a no-op, so this is safe to call when the caller
    /// is not sure whether a token was previously saved.
    ///
    /// # Errors
    ///
    /// Returns an error for I/O failures other than a missing file.
    pub fn delete(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn minimal_token(access_token: &str) -> StoredToken {
        StoredToken {
            access_token: access_token.to_string(),
            refresh_token: None,
            expiry: None,
            scopes: vec![],
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // StoredToken::is_expired
    // -----------------------------------------------------------------------

    #[test]
    fn test_token_is_expired_when_past_expiry() {
        let mut token = minimal_token("tok");
        token.expiry = Some(Utc::now() - Duration::seconds(1));
        assert!(token.is_expired());
    }

    #[test]
    fn test_token_is_expired_within_buffer_window() {
        // 30 seconds in the future is still within the 60-second buffer.
        let mut token = minimal_token("tok");
        token.expiry = Some(Utc::now() + Duration::seconds(30));
        assert!(token.is_expired());
    }

    #[test]
    fn test_token_not_expired_when_future_expiry() {
        let mut token = minimal_token("tok");
        token.expiry = Some(Utc::now() + Duration::hours(1));
        assert!(!token.is_expired());
    }

    #[test]
    fn test_token_not_expired_when_no_expiry() {
        assert!(!minimal_token("tok").is_expired());
    }

    // -----------------------------------------------------------------------
    // JSON round-trip
    // -----------------------------------------------------------------------

    #[test]
    fn test_token_roundtrip_through_json() {
        let original = StoredToken {
            access_token: "access_abc".to_string(),
            refresh_token: Some("refresh_xyz".to_string()),
            expiry: Some(DateTime::from_timestamp(1_800_000_000, 0).expect("valid timestamp")),
            scopes: vec!["https://www.googleapis.com/auth/drive.file".to_string()],
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
        };

        let json = serde_json::to_string(&original).expect("serialize");
        let restored: StoredToken = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(restored.access_token, original.access_token);
        assert_eq!(restored.refresh_token, original.refresh_token);
        assert_eq!(restored.expiry, original.expiry);
        assert_eq!(restored.scopes, original.scopes);
        assert_eq!(restored.token_uri, original.token_uri);
    }

    // -----------------------------------------------------------------------
    // File operations
    // -----------------------------------------------------------------------

    #[test]
    fn test_load_returns_none_when_file_absent() {
        let dir = tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().join("token.json"));
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn test_load_returns_none_when_file_malformed() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("token.json");
        std::fs::write(&path, "not a token").expect("write");
        let store = TokenStore::new(path);
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().join("nested").join("token.json"));

        let mut token = minimal_token("saved");
        token.refresh_token = Some("refresh".to_string());
        store.save(&token).expect("save");

        let loaded = store.load().expect("load").expect("present");
        assert_eq!(loaded.access_token, "saved");
        assert_eq!(loaded.refresh_token, Some("refresh".to_string()));
    }

    #[test]
    fn test_save_overwrites_wholesale() {
        let dir = tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().join("token.json"));

        store.save(&minimal_token("first")).expect("save first");
        store.save(&minimal_token("second")).expect("save second");

        let loaded = store.load().expect("load").expect("present");
        assert_eq!(loaded.access_token, "second");
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().join("token.json"));

        store.save(&minimal_token("tok")).expect("save");
        store.delete().expect("first delete");
        store.delete().expect("second delete is no-op");
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn test_persisted_file_is_flat_json_object() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("token.json");
        let store = TokenStore::new(path.clone());
        store.save(&minimal_token("tok")).expect("save");

        let raw = std::fs::read_to_string(&path).expect("read");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert!(value.is_object(), "token file must be a JSON object");
        assert_eq!(value["access_token"], "tok");
    }
}
