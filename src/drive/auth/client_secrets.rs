//! OAuth client-secret file parsing
//!
//! The interactive authorization flow is driven by a client-secret file in
//! the installed-application JSON format downloaded from the API console:
//!
//! ```json
//! {"installed": {"client_id": "...", "client_secret": "...",
//!                "auth_uri": "...", "token_uri": "...",
//!                "redirect_uris": ["http://localhost"]}}
//! ```
//!
//! The file identifies this application to the authorization server; it is
//! required before the consent flow can start, so a missing file fails
//! fast with an actionable message instead of a dead browser tab.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EchovaultError, Result};

/// Default authorization endpoint for installed applications.
fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

/// Default token endpoint for installed applications.
fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// OAuth client identity for an installed application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSecrets {
    /// OAuth client identifier issued by the API console.
    pub client_id: String,

    /// Client secret. Installed-app secrets are not confidential, but the
    /// token endpoint still requires the value.
    pub client_secret: String,

    /// Authorization endpoint URL.
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,

    /// Token endpoint URL, also used for refresh-token exchanges.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    /// Registered redirect URIs. The loopback flow ignores these and binds
    /// its own `127.0.0.1` listener, but the field is kept so a loaded
    /// file round-trips.
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

/// On-disk wrapper: the console nests the secrets under `"installed"`.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: ClientSecrets,
}

impl ClientSecrets {
    /// Loads and parses a client-secret file.
    ///
    /// # Errors
    ///
    /// Returns [`EchovaultError::Auth`] with an actionable message when
    /// the file is missing, and [`EchovaultError::Auth`] describing the
    /// parse failure when the content is not the installed-app format.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EchovaultError::Auth(format!(
                "Client secrets file not found at {}. Download your OAuth client \
                 credentials (installed application) and place the file there.",
                path.display()
            ))
            .into());
        }

        let contents = std::fs::read_to_string(path)?;
        let file: ClientSecretsFile = serde_json::from_str(&contents).map_err(|e| {
            EchovaultError::Auth(format!(
                "Client secrets file {} is not in the installed-application format: {}",
                path.display(),
                e
            ))
        })?;

        Ok(file.installed)
    }
}
