//! OAuth 2.0 authorization code flow with PKCE for the Drive backend
//!
//! This module implements the browser-based installed-application flow:
//! a loopback redirect listener is bound on `127.0.0.1`, the user's
//! browser is pointed at the consent page, and the returned authorization
//! code is exchanged for tokens at the token endpoint. Refresh-token
//! exchange lives here too.
//!
//! # Flow overview
//!
//! 1. Generate a PKCE challenge and a random `state` value.
//! 2. Bind a local TCP listener for the redirect callback.
//! 3. Build the authorization URL and open it in the user's browser.
//! 4. Wait (bounded by the consent timeout) for the callback connection,
//!    extract `code` and `state`.
//! 5. Validate `state`; exchange `code` for tokens.
//!
//! # References
//!
//! - RFC 6749 <https://www.rfc-editor.org/rfc/rfc6749>
//! - RFC 7636 PKCE <https://www.rfc-editor.org/rfc/rfc7636>

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use url::Url;

use crate::drive::auth::client_secrets::ClientSecrets;
use crate::drive::auth::pkce;
use crate::drive::auth::token_store::StoredToken;
use crate::error::{EchovaultError, Result};

/// The single OAuth scope the storage subsystem requests: access limited
/// to files created by this application, never the whole drive.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Default bound on how long the flow waits for the user to complete the
/// browser consent page.
pub const DEFAULT_CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// OAuthFlowConfig
// ---------------------------------------------------------------------------

/// Configuration for one run of the authorization code flow.
#[derive(Debug, Clone)]
pub struct OAuthFlowConfig {
    /// Client identity loaded from the client-secret file.
    pub secrets: ClientSecrets,

    /// OAuth scopes to request. The storage subsystem always passes
    /// [`DRIVE_FILE_SCOPE`] and nothing broader.
    pub scopes: Vec<String>,

    /// Local TCP port to bind for the redirect callback. Use `0` to let
    /// the OS assign a free port.
    pub redirect_port: u16,

    /// Bound on the wait for the user to complete the consent page. The
    /// original design waited forever; a stuck consent tab would wedge
    /// the calling worker thread permanently.
    pub consent_timeout: Duration,
}

impl OAuthFlowConfig {
    /// Creates a flow configuration with the drive-file scope and default
    /// timeout.
    pub fn new(secrets: ClientSecrets) -> Self {
        Self {
            secrets,
            scopes: vec![DRIVE_FILE_SCOPE.to_string()],
            redirect_port: 0,
            consent_timeout: DEFAULT_CONSENT_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// Token endpoint response (raw deserialization)
// ---------------------------------------------------------------------------

/// Raw JSON response from the OAuth token endpoint.
#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    /// Converts the raw response into a [`StoredToken`].
    ///
    /// `expires_in` seconds become an absolute UTC `expiry`. A refresh
    /// response commonly omits `refresh_token`; `fallback_refresh`
    /// preserves the previously granted one in that case.
    fn into_stored_token(self, token_uri: &str, fallback_refresh: Option<String>) -> StoredToken {
        let expiry = self.expires_in.map(|secs| {
            // Clamp to chrono's representable range.
            let secs = i64::try_from(secs).unwrap_or(i64::MAX / 1000).min(i64::MAX / 1000);
            chrono::Utc::now() + chrono::Duration::seconds(secs)
        });

        let scopes = self
            .scope
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(fallback_refresh),
            expiry,
            scopes,
            token_uri: token_uri.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// OAuthFlow
// ---------------------------------------------------------------------------

/// Drives the authorization code flow and refresh exchanges.
///
/// An `OAuthFlow` does not persist tokens; that is the responsibility of
/// [`TokenStore`](super::token_store::TokenStore) and
/// [`AuthManager`](super::manager::AuthManager).
pub struct OAuthFlow {
    http: Arc<reqwest::Client>,
    config: OAuthFlowConfig,
}

impl OAuthFlow {
    /// Creates a new `OAuthFlow` for the given configuration.
    pub fn new(http: Arc<reqwest::Client>, config: OAuthFlowConfig) -> Self {
        Self { http, config }
    }

    /// Runs the full interactive authorization code flow.
    ///
    /// Blocks (asynchronously) until the user completes the consent page
    /// or the configured consent timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns [`EchovaultError::Auth`] when the redirect listener cannot
    /// be bound, the consent wait times out, the `state` nonce does not
    /// match, or the token endpoint rejects the exchange.
    pub async fn authorize(&self) -> Result<StoredToken> {
        let pkce_challenge = pkce::generate()?;
        let state = generate_state();

        let listener =
            tokio::net::TcpListener::bind(format!("127.0.0.1:{}", self.config.redirect_port))
                .await
                .map_err(|e| {
                    EchovaultError::Auth(format!("failed to bind redirect listener: {e}"))
                })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| EchovaultError::Auth(format!("failed to get local address: {e}")))?;
        let redirect_uri = format!("http://127.0.0.1:{}/callback", local_addr.port());

        let auth_url = self.build_authorization_url(
            &redirect_uri,
            &state,
            &pkce_challenge.challenge,
        )?;

        eprintln!(
            "Open the following URL in your browser to authorize Echo:\n{}",
            auth_url
        );
        try_open_browser(&auth_url);

        let code = tokio::time::timeout(
            self.config.consent_timeout,
            self.accept_callback(listener, &state),
        )
        .await
        .map_err(|_| {
            EchovaultError::Auth(format!(
                "consent flow timed out after {} seconds",
                self.config.consent_timeout.as_secs()
            ))
        })??;

        self.exchange_code(&code, &redirect_uri, &pkce_challenge.verifier)
            .await
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// The previously granted refresh token is carried forward when the
    /// endpoint does not return a new one.
    ///
    /// # Errors
    ///
    /// Returns [`EchovaultError::Auth`] if the token endpoint request
    /// fails or the response cannot be parsed.
    pub async fn refresh(&self, refresh_token: &str) -> Result<StoredToken> {
        let mut params: HashMap<&str, &str> = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", &self.config.secrets.client_id);
        params.insert("client_secret", &self.config.secrets.client_secret);

        let resp = self
            .http
            .post(&self.config.secrets.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| EchovaultError::Auth(format!("refresh token request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EchovaultError::Auth(format!(
                "refresh token endpoint returned {status}: {body}"
            ))
            .into());
        }

        let raw: TokenResponse = resp.json().await.map_err(|e| {
            EchovaultError::Auth(format!("failed to parse refresh token response: {e}"))
        })?;

        Ok(raw.into_stored_token(
            &self.config.secrets.token_uri,
            Some(refresh_token.to_string()),
        ))
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    /// Builds the authorization URL with all required query parameters.
    ///
    /// `access_type=offline` and `prompt=consent` ensure the token
    /// endpoint issues a refresh token for the installed application.
    fn build_authorization_url(
        &self,
        redirect_uri: &str,
        state: &str,
        code_challenge: &str,
    ) -> Result<String> {
        let mut url = Url::parse(&self.config.secrets.auth_uri)
            .map_err(|e| EchovaultError::Auth(format!("invalid authorization endpoint URL: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &self.config.secrets.client_id);
            query.append_pair("redirect_uri", redirect_uri);
            query.append_pair("scope", &self.config.scopes.join(" "));
            query.append_pair("state", state);
            query.append_pair("code_challenge", code_challenge);
            query.append_pair("code_challenge_method", "S256");
            query.append_pair("access_type", "offline");
            query.append_pair("prompt", "consent");
        }

        Ok(url.to_string())
    }

    /// Accepts a single TCP connection on the callback listener, parses
    /// the HTTP GET request line to extract `code` and `state` query
    /// parameters, validates the `state` nonce, sends a success page, and
    /// returns the authorization `code`.
    async fn accept_callback(
        &self,
        listener: tokio::net::TcpListener,
        expected_state: &str,
    ) -> Result<String> {
        let (stream, _peer) = listener.accept().await.map_err(|e| {
            EchovaultError::Auth(format!("failed to accept OAuth callback connection: {e}"))
        })?;

        // Move to a blocking task so we can use std I/O for simple HTTP
        // request parsing without pulling in a full HTTP server.
        let expected_state = expected_state.to_string();
        let code = tokio::task::spawn_blocking(move || -> Result<String> {
            let std_stream = stream
                .into_std()
                .map_err(|e| EchovaultError::Auth(format!("stream conversion failed: {e}")))?;
            // Tokio sockets are nonblocking; std reads need blocking mode.
            std_stream
                .set_nonblocking(false)
                .map_err(|e| EchovaultError::Auth(format!("stream mode change failed: {e}")))?;

            let mut write_stream = std_stream
                .try_clone()
                .map_err(|e| EchovaultError::Auth(format!("stream clone failed: {e}")))?;

            let reader = BufReader::new(std_stream);
            let mut request_line = String::new();

            for line in reader.lines() {
                let line = line.map_err(|e| {
                    EchovaultError::Auth(format!("failed to read callback request: {e}"))
                })?;
                // HTTP headers end at the first empty line.
                if line.is_empty() {
                    break;
                }
                if request_line.is_empty() {
                    request_line = line;
                }
            }

            // Respond immediately so the browser does not spin.
            let response = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\nAuthorization successful. You may close this tab.";
            let _ = write_stream.write_all(response.as_bytes());

            // Parse request line: "GET /callback?code=...&state=... HTTP/1.1"
            let path = request_line.split_whitespace().nth(1).unwrap_or("/");
            let query_string = path.split_once('?').map(|x| x.1).unwrap_or("");
            let params = parse_query_string(query_string);

            let state = params.get("state").cloned().unwrap_or_default();
            if state != expected_state {
                return Err(
                    EchovaultError::Auth("state mismatch in OAuth callback".to_string()).into(),
                );
            }

            params.get("code").cloned().ok_or_else(|| {
                EchovaultError::Auth("authorization code missing from callback".to_string()).into()
            })
        })
        .await
        .map_err(|e| EchovaultError::Auth(format!("callback task panicked: {e}")))??;

        Ok(code)
    }

    /// Exchanges an authorization code for tokens at the token endpoint.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<StoredToken> {
        let mut params: HashMap<&str, &str> = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", redirect_uri);
        params.insert("client_id", &self.config.secrets.client_id);
        params.insert("client_secret", &self.config.secrets.client_secret);
        params.insert("code_verifier", code_verifier);

        let resp = self
            .http
            .post(&self.config.secrets.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| EchovaultError::Auth(format!("token exchange request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(
                EchovaultError::Auth(format!("token endpoint returned {status}: {body}")).into(),
            );
        }

        let raw: TokenResponse = resp
            .json()
            .await
            .map_err(|e| EchovaultError::Auth(format!("failed to parse token response: {e}")))?;

        Ok(raw.into_stored_token(&self.config.secrets.token_uri, None))
    }
}

// ---------------------------------------------------------------------------
// Utility functions
// ---------------------------------------------------------------------------

/// Generates a cryptographically random state nonce: 16 random bytes
/// encoded as base64url without padding.
fn generate_state() -> String {
    use rand::RngCore as _;
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Attempts to open the authorization URL in the user's default browser.
///
/// Errors are intentionally ignored; if the browser does not open the
/// user can copy the URL from stderr.
fn try_open_browser(url: &str) {
    #[cfg(target_os = "macos")]
    {
        let _ = std::process::Command::new("open").arg(url).spawn();
    }
    #[cfg(target_os = "linux")]
    {
        let _ = std::process::Command::new("xdg-open").arg(url).spawn();
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        // On other platforms the user must copy the URL manually.
        let _ = url;
    }
}

/// Parses a URL query string into a key-value map.
///
/// Values are percent-decoded. Duplicate keys are overwritten by the last
/// occurrence.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for pair in query.split('&') {
        let mut iter = pair.splitn(2, '=');
        let key = iter.next().unwrap_or("").to_string();
        let value = iter.next().unwrap_or("").to_string();
        if !key.is_empty() {
            map.insert(key, percent_decode(&value));
        }
    }
    map
}

/// Performs minimal percent-decoding of a URL query parameter value.
///
/// Converts `+` to space and `%XX` sequences to the corresponding byte.
/// Decoding works on raw bytes so multi-byte UTF-8 sequences split
/// across several `%XX` escapes reassemble correctly.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'+' {
            out.push(b' ');
            i += 1;
        } else if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
            out.push(bytes[i]);
            i += 1;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
