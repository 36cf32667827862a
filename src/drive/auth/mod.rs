//! OAuth 2.0 authentication for the Drive backend
//!
//! Implements the authorization code flow with PKCE for an installed
//! application, file-backed token persistence, and automatic refresh.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ AuthManager  │  token lifecycle: cache → refresh → consent flow
//! └──────┬───────┘
//!        │
//!   ┌────┴─────┬─────────────┬──────────────┐
//!   ▼          ▼             ▼              ▼
//! OAuthFlow  TokenStore  ClientSecrets    pkce
//! (consent,  (token.json  (credentials   (RFC 7636
//!  refresh)   on disk)     .json)         S256)
//! ```
//!
//! The storage layer only ever talks to [`AuthManager::access_token`];
//! everything else in this module is plumbing behind it.

pub mod client_secrets;
pub mod flow;
pub mod manager;
pub mod pkce;
pub mod token_store;

pub use client_secrets::ClientSecrets;
pub use flow::{OAuthFlow, OAuthFlowConfig, DRIVE_FILE_SCOPE};
pub use manager::AuthManager;
pub use token_store::{StoredToken, TokenStore};
