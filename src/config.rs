//! Configuration management for Echovault
//!
//! This module handles loading, merging, and saving the storage settings
//! file (`settings.json`). Loaded values are deep-merged onto the built-in
//! defaults so that settings files written by older versions keep working
//! when new default fields are introduced, and unknown keys are preserved
//! across a load/save round-trip.
//!
//! A configuration error never blocks startup: an unreadable or malformed
//! settings file degrades to the defaults with a logged diagnostic.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EchovaultError, Result};

/// Environment variable overriding the client-secret file location.
pub const CREDENTIALS_FILE_ENV: &str = "ECHOVAULT_CREDENTIALS_FILE";

/// Environment variable overriding the local history directory.
pub const HISTORY_DIR_ENV: &str = "ECHOVAULT_HISTORY_DIR";

/// Which persistence medium the factory should construct.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Append history to a JSON file on local disk.
    #[default]
    Local,
    /// Persist history to a file on the user's cloud drive.
    ///
    /// Accepts the legacy `"google_drive"` value written by earlier
    /// settings files.
    #[serde(alias = "google_drive", alias = "drive")]
    Cloud,
}

/// Storage settings loaded from `settings.json`.
///
/// Every field has a documented default; a settings file containing only
/// `{"storage_mode": "cloud"}` yields a fully populated configuration.
/// Keys this version does not know about are captured in `extra` and
/// written back verbatim by [`Settings::save`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Which store variant the factory constructs.
    #[serde(default)]
    pub storage_mode: StorageMode,

    /// Optional override for the local history directory. `None` selects
    /// the per-user default data directory.
    #[serde(default)]
    pub local_storage_path: Option<PathBuf>,

    /// Filename of the history JSON file, local and remote.
    #[serde(default = "default_history_filename")]
    pub history_filename: String,

    /// OAuth client-secret file. Relative paths resolve against the
    /// application config directory.
    #[serde(default = "default_credentials_file", alias = "google_drive_credentials_file")]
    pub credentials_file: String,

    /// Persisted OAuth token file. Relative paths resolve against the
    /// application config directory.
    #[serde(default = "default_token_file", alias = "google_drive_token_file")]
    pub token_file: String,

    /// Human-readable name of the remote folder holding the history file.
    #[serde(default = "default_remote_folder_name", alias = "google_drive_folder_name")]
    pub remote_folder_name: String,

    /// Unknown keys, preserved across load/save so that settings written
    /// by newer or older versions are not silently dropped.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn default_history_filename() -> String {
    "echo_chat_history.json".to_string()
}

fn default_credentials_file() -> String {
    "credentials.json".to_string()
}

fn default_token_file() -> String {
    "token.json".to_string()
}

fn default_remote_folder_name() -> String {
    "Echo History".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::default(),
            local_storage_path: None,
            history_filename: default_history_filename(),
            credentials_file: default_credentials_file(),
            token_file: default_token_file(),
            remote_folder_name: default_remote_folder_name(),
            extra: serde_json::Map::new(),
        }
    }
}

impl Settings {
    /// Loads settings from `path`, deep-merging file content onto the
    /// defaults.
    ///
    /// A missing, unreadable, or malformed file degrades to the defaults
    /// with a logged diagnostic; this function never blocks startup with
    /// an error. Environment overrides are applied after the merge.
    pub fn load(path: &Path) -> Self {
        let mut settings = match Self::try_load(path) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(
                    "Error loading settings from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        };

        // Settings written before the move to JSON tokens still name the
        // old pickled token file; rewrite it so the token store reads the
        // JSON format.
        if settings.token_file == "token.pickle" {
            tracing::warn!("Migrating legacy token filename token.pickle to token.json");
            settings.token_file = default_token_file();
        }

        settings.apply_env_overrides();
        settings
    }

    fn try_load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(
                "Settings file not found at {}. Using defaults.",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let mut loaded: Value = serde_json::from_str(&contents)?;
        rename_legacy_keys(&mut loaded);

        let mut merged = serde_json::to_value(Self::default())?;
        deep_merge(&mut merged, loaded);

        Ok(serde_json::from_value(merged)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(credentials) = std::env::var(CREDENTIALS_FILE_ENV) {
            tracing::debug!(credentials = %credentials, "Env override: {}", CREDENTIALS_FILE_ENV);
            self.credentials_file = credentials;
        }
        if let Ok(dir) = std::env::var(HISTORY_DIR_ENV) {
            tracing::debug!(dir = %dir, "Env override: {}", HISTORY_DIR_ENV);
            self.local_storage_path = Some(PathBuf::from(dir));
        }
    }

    /// Saves settings to `path`, pretty-printed, creating parent
    /// directories as needed. Unknown keys captured at load time are
    /// written back.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let rendered = serde_json::to_string_pretty(self)?;
        std::fs::write(path, rendered)?;
        tracing::info!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Default location of the settings file in the per-user config
    /// directory.
    pub fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("settings.json"))
    }

    /// Absolute path of the client-secret file: the configured value
    /// used verbatim when absolute, otherwise resolved against the
    /// application config directory.
    pub fn credentials_path(&self) -> Result<PathBuf> {
        resolve_config_relative(&self.credentials_file)
    }

    /// Absolute path of the persisted token file, resolved like
    /// [`Settings::credentials_path`].
    pub fn token_path(&self) -> Result<PathBuf> {
        resolve_config_relative(&self.token_file)
    }
}

fn resolve_config_relative(value: &str) -> Result<PathBuf> {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(config_dir()?.join(path))
    }
}

/// Renames settings keys written by earlier releases to their current
/// names. The merge onto serialized defaults would otherwise present
/// both the old and new key to the deserializer.
fn rename_legacy_keys(loaded: &mut Value) {
    const RENAMES: [(&str, &str); 3] = [
        ("google_drive_credentials_file", "credentials_file"),
        ("google_drive_token_file", "token_file"),
        ("google_drive_folder_name", "remote_folder_name"),
    ];
    if let Value::Object(map) = loaded {
        for (old, new) in RENAMES {
            if let Some(value) = map.remove(old) {
                map.entry(new.to_string()).or_insert(value);
            }
        }
    }
}

/// Recursively merges `update` onto `base`. Objects merge key-by-key;
/// any other value in `update` replaces the value in `base`.
fn deep_merge(base: &mut Value, update: Value) {
    match (base, update) {
        (Value::Object(base_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, update) => *base = update,
    }
}

/// Per-user config directory for the Echo application.
pub fn config_dir() -> Result<PathBuf> {
    let dirs = project_dirs()?;
    Ok(dirs.config_dir().to_path_buf())
}

/// Per-user data directory, parent of the default history directory.
pub fn data_dir() -> Result<PathBuf> {
    let dirs = project_dirs()?;
    Ok(dirs.data_dir().to_path_buf())
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "echovault", "echo")
        .ok_or_else(|| EchovaultError::Config("Could not determine user directories".into()).into())
}
