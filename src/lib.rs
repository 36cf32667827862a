//! # echovault
//!
//! Conversation history storage for the Echo desktop assistant.
//!
//! The crate persists a conversation as an ordered JSON array of
//! timestamped entries, either on the local filesystem or on the user's
//! Google Drive, behind one [`HistoryStore`](store::HistoryStore) trait.
//! Backend selection, cloud fallback, and runtime swapping live in
//! [`store`]; OAuth credential handling and the Drive REST surface live
//! in [`drive`]; [`config`] loads the settings file that drives it all.
//!
//! ```no_run
//! use std::sync::Arc;
//! use echovault::config::Settings;
//! use echovault::store::StorageHandle;
//!
//! # async fn run() -> echovault::error::Result<()> {
//! let settings = Settings::load(&Settings::default_path()?);
//! let handle = StorageHandle::initialize(&settings, Arc::new(reqwest::Client::new())).await;
//!
//! let store = handle.active().await;
//! store.save("user", "hello").await;
//! let history = store.load().await;
//! println!("{} entries", history.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod drive;
pub mod error;
pub mod history;
pub mod store;

pub use config::{Settings, StorageMode};
pub use error::{EchovaultError, Result};
pub use history::ConversationEntry;
pub use store::{HistoryStore, StorageHandle};
