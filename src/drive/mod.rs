//! Google Drive integration: REST client, remote path resolution, and
//! OAuth authentication.

pub mod auth;
pub mod client;
pub mod resolver;

pub use auth::AuthManager;
pub use client::{DriveClient, DriveFile};
pub use resolver::DriveResolver;
