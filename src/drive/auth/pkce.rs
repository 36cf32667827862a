//! PKCE S256 challenge generation
//!
//! Implements the Proof Key for Code Exchange extension to OAuth 2.0
//! (RFC 7636), `S256` method. The authorization endpoint used by the
//! Drive consent flow accepts PKCE for installed applications, and using
//! it means a leaked authorization code cannot be redeemed by another
//! process.
//!
//! # How PKCE works
//!
//! 1. The client generates a high-entropy random `code_verifier`.
//! 2. The client computes SHA-256 of the verifier and base64url-encodes it
//!    to produce the `code_challenge`.
//! 3. The authorization request includes `code_challenge` and
//!    `code_challenge_method=S256`.
//! 4. The token exchange request includes the original `code_verifier`,
//!    proving possession to the authorization server.
//!
//! # References
//!
//! - RFC 7636 <https://www.rfc-editor.org/rfc/rfc7636>

use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// A PKCE S256 challenge pair consisting of a verifier and its derived
/// challenge value.
///
/// # Examples
///
/// ```
/// use echovault::drive::auth::pkce::generate;
///
/// let challenge = generate().expect("PKCE generation must not fail");
/// assert_eq!(challenge.method, "S256");
/// assert_eq!(challenge.verifier.len(), 43);
/// ```
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// The code verifier: a base64url-encoded (no padding) random string
    /// of exactly 43 characters derived from 32 random bytes. Sent to the
    /// token endpoint in the `code_verifier` parameter.
    pub verifier: String,

    /// The code challenge: the base64url-encoded (no padding) SHA-256
    /// digest of the UTF-8 representation of [`Self::verifier`]. Sent to
    /// the authorization endpoint in the `code_challenge` parameter.
    pub challenge: String,

    /// The challenge method. Always `"S256"`.
    pub method: String,
}

/// Generates a fresh PKCE S256 challenge.
///
/// The verifier is 32 cryptographically random bytes encoded as a
/// base64url string without padding (43 characters). The challenge is the
/// base64url-encoded SHA-256 digest of the verifier string's UTF-8 bytes,
/// as specified in RFC 7636 section 4.2.
///
/// # Errors
///
/// Infallible in practice; returns `Result` so callers can use `?`
/// uniformly.
pub fn generate() -> Result<PkceChallenge> {
    use rand::RngCore as _;

    let mut random_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut random_bytes);

    let verifier = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes);

    // RFC 7636 section 4.2: ASCII(BASE64URL(SHA256(ASCII(code_verifier))))
    let digest = Sha256::digest(verifier.as_bytes());
    let challenge = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest.as_slice());

    Ok(PkceChallenge {
        verifier,
        challenge,
        method: "S256".to_string(),
    })
}
