//! Minimal Google Drive v3 REST client
//!
//! Covers exactly the surface the history store needs: file search,
//! folder and file creation, media upload, and media download. All
//! requests carry a bearer token supplied by the caller; this client
//! knows nothing about token acquisition.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::{EchovaultError, Result};

/// Default base URL for the Drive v3 API.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";

/// MIME type Drive uses to mark folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// A file or folder entry returned by the Drive API.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Thin wrapper over the Drive v3 REST endpoints.
pub struct DriveClient {
    http: Arc<reqwest::Client>,
    api_base: String,
}

impl DriveClient {
    /// Creates a client against the production Drive API.
    pub fn new(http: Arc<reqwest::Client>) -> Self {
        Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Creates a client against an alternate base URL. Used by tests to
    /// point at a mock server.
    pub fn with_api_base(http: Arc<reqwest::Client>, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
        }
    }

    /// Searches for files matching a Drive query expression.
    ///
    /// Only `id` and `name` are requested per entry. Trashed items are
    /// the caller's concern; queries built by the resolver always add
    /// `trashed = false`.
    pub async fn list_files(&self, access_token: &str, query: &str) -> Result<Vec<DriveFile>> {
        let url = format!("{}/drive/v3/files", self.api_base);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("q", query), ("fields", "files(id, name)")])
            .send()
            .await?;

        let resp = check_status(resp, "file search").await?;
        let list: FileListResponse = resp.json().await?;
        Ok(list.files)
    }

    /// Creates a folder, optionally inside a parent folder.
    pub async fn create_folder(
        &self,
        access_token: &str,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<DriveFile> {
        let mut metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
        });
        if let Some(parent) = parent_id {
            metadata["parents"] = serde_json::json!([parent]);
        }

        let url = format!("{}/drive/v3/files", self.api_base);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&metadata)
            .send()
            .await?;

        let resp = check_status(resp, "folder creation").await?;
        Ok(resp.json().await?)
    }

    /// Creates an empty file entry (metadata only, no content).
    ///
    /// Content is set afterwards with [`update_file`](Self::update_file);
    /// the two-step shape keeps uploads on the plain media endpoint.
    pub async fn create_file(
        &self,
        access_token: &str,
        name: &str,
        parent_id: Option<&str>,
        mime_type: &str,
    ) -> Result<DriveFile> {
        let mut metadata = serde_json::json!({
            "name": name,
            "mimeType": mime_type,
        });
        if let Some(parent) = parent_id {
            metadata["parents"] = serde_json::json!([parent]);
        }

        let url = format!("{}/drive/v3/files", self.api_base);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&metadata)
            .send()
            .await?;

        let resp = check_status(resp, "file creation").await?;
        Ok(resp.json().await?)
    }

    /// Replaces the content of an existing file via media upload.
    pub async fn update_file(
        &self,
        access_token: &str,
        file_id: &str,
        content: String,
        mime_type: &str,
    ) -> Result<()> {
        let url = format!("{}/upload/drive/v3/files/{}", self.api_base, file_id);
        let resp = self
            .http
            .patch(&url)
            .bearer_auth(access_token)
            .query(&[("uploadType", "media")])
            .header(reqwest::header::CONTENT_TYPE, mime_type.to_string())
            .body(content)
            .send()
            .await?;

        check_status(resp, "media upload").await?;
        Ok(())
    }

    /// Downloads the raw content of a file.
    pub async fn download_file(&self, access_token: &str, file_id: &str) -> Result<String> {
        let url = format!("{}/drive/v3/files/{}", self.api_base, file_id);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("alt", "media")])
            .send()
            .await?;

        let resp = check_status(resp, "media download").await?;
        Ok(resp.text().await?)
    }
}

/// Maps a non-success HTTP status to a [`EchovaultError::Drive`] carrying
/// both the status and the response body, which Drive fills with a
/// structured error message.
async fn check_status(resp: reqwest::Response, operation: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(EchovaultError::Drive(format!("{operation} failed with {status}: {body}")).into())
}
