use std::sync::Arc;

use tempfile::TempDir;

use echovault::config::{Settings, StorageMode};
use echovault::store::{init_store, StorageHandle};

fn settings_in(dir: &TempDir, mode: StorageMode) -> Settings {
    Settings {
        storage_mode: mode,
        local_storage_path: Some(dir.path().to_path_buf()),
        credentials_file: dir
            .path()
            .join("credentials.json")
            .to_string_lossy()
            .into_owned(),
        token_file: dir.path().join("token.json").to_string_lossy().into_owned(),
        ..Settings::default()
    }
}

/// Local mode always yields a working store.
#[tokio::test]
async fn test_local_mode_yields_usable_store() {
    let dir = TempDir::new().unwrap();
    let store = init_store(
        &settings_in(&dir, StorageMode::Local),
        Arc::new(reqwest::Client::new()),
    )
    .await;

    assert!(store.authenticate().await);
    assert!(store.save("user", "hello").await);
    assert_eq!(store.load().await.len(), 1);
}

/// Cloud mode with no credentials file on disk falls back to local
/// storage; history keeps flowing to the local file.
#[tokio::test]
async fn test_cloud_mode_without_credentials_degrades_to_local() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir, StorageMode::Cloud);
    let store = init_store(&settings, Arc::new(reqwest::Client::new())).await;

    assert!(store.save("user", "offline").await);
    assert!(
        dir.path().join(&settings.history_filename).exists(),
        "fallback must write to the local history file"
    );
}

/// The fallback decision is deterministic: repeated factory runs against
/// the same broken cloud configuration give the same local behavior.
#[tokio::test]
async fn test_fallback_is_deterministic_across_runs() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir, StorageMode::Cloud);
    let http = Arc::new(reqwest::Client::new());

    let first = init_store(&settings, Arc::clone(&http)).await;
    first.save("user", "one").await;

    let second = init_store(&settings, http).await;
    let loaded = second.load().await;
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].message, "one");
}

/// Flipping the storage mode in settings and reinitializing the handle
/// swaps the backend without restarting anything.
#[tokio::test]
async fn test_handle_reinitialize_after_mode_change() {
    let dir = TempDir::new().unwrap();
    let http = Arc::new(reqwest::Client::new());

    let handle =
        StorageHandle::initialize(&settings_in(&dir, StorageMode::Local), Arc::clone(&http)).await;
    handle
        .active()
        .await
        .save("user", "before switch")
        .await;

    // Cloud mode is misconfigured here, so the swap lands on local
    // again; the point is that the handle swaps live and history on the
    // shared local file remains readable.
    handle
        .reinitialize(&settings_in(&dir, StorageMode::Cloud), http)
        .await;

    let loaded = handle.active().await.load().await;
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].message, "before switch");
}
