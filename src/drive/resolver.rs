//! Find-or-create resolution of the remote history folder and file
//!
//! Resolution is idempotent: repeated runs against unchanged remote
//! state return the same identifiers without creating duplicates. When
//! the history file has to be created it is immediately seeded with an
//! empty JSON array so a subsequent load sees a well-formed document.

use crate::drive::client::{DriveClient, DriveFile, FOLDER_MIME_TYPE};
use crate::error::Result;

/// MIME type the history file is created and uploaded with.
pub const HISTORY_MIME_TYPE: &str = "application/json";

/// Resolves named folders and files to Drive identifiers.
pub struct DriveResolver<'a> {
    client: &'a DriveClient,
}

impl<'a> DriveResolver<'a> {
    pub fn new(client: &'a DriveClient) -> Self {
        Self { client }
    }

    /// Returns the id of the named top-level folder, creating it when no
    /// match exists.
    ///
    /// Trashed folders never match. If several folders share the name,
    /// the first search result wins; under the drive.file scope only
    /// objects this application created are visible, so duplicates only
    /// arise from races between instances.
    pub async fn ensure_folder(&self, access_token: &str, name: &str) -> Result<String> {
        let query = format!(
            "mimeType = '{}' and name = '{}' and trashed = false",
            FOLDER_MIME_TYPE,
            escape_query_value(name)
        );
        let matches = self.client.list_files(access_token, &query).await?;

        if let Some(folder) = matches.first() {
            tracing::debug!(id = %folder.id, %name, "found existing remote folder");
            return Ok(folder.id.clone());
        }

        tracing::info!(%name, "remote folder not found; creating");
        let folder = self.client.create_folder(access_token, name, None).await?;
        Ok(folder.id)
    }

    /// Returns the id of the named file inside `folder_id`, creating and
    /// seeding it with `[]` when no match exists.
    pub async fn ensure_file(
        &self,
        access_token: &str,
        folder_id: &str,
        name: &str,
    ) -> Result<String> {
        let query = format!(
            "name = '{}' and '{}' in parents and trashed = false",
            escape_query_value(name),
            escape_query_value(folder_id)
        );
        let matches = self.client.list_files(access_token, &query).await?;

        if let Some(file) = matches.first() {
            tracing::debug!(id = %file.id, %name, "found existing history file");
            return Ok(file.id.clone());
        }

        tracing::info!(%name, "history file not found; creating empty history");
        let file: DriveFile = self
            .client
            .create_file(access_token, name, Some(folder_id), HISTORY_MIME_TYPE)
            .await?;
        self.client
            .update_file(access_token, &file.id, "[]".to_string(), HISTORY_MIME_TYPE)
            .await?;
        Ok(file.id)
    }
}

/// Escapes a value for interpolation into a Drive query expression.
///
/// Drive queries delimit strings with single quotes and use backslash as
/// the escape character, so both must be escaped in user-supplied names.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param_contains};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_escape_query_value_plain() {
        assert_eq!(escape_query_value("Echo History"), "Echo History");
    }

    #[test]
    fn test_escape_query_value_quotes_and_backslashes() {
        assert_eq!(escape_query_value("it's"), "it\\'s");
        assert_eq!(escape_query_value("a\\b"), "a\\\\b");
    }

    #[tokio::test]
    async fn test_ensure_folder_returns_existing_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [
                    {"id": "first", "name": "Echo History"},
                    {"id": "second", "name": "Echo History"}
                ]
            })))
            .mount(&server)
            .await;

        let client = DriveClient::with_api_base(Arc::new(reqwest::Client::new()), server.uri());
        let resolver = DriveResolver::new(&client);

        // First match wins; no creation request is issued.
        let id = resolver.ensure_folder("tok", "Echo History").await.unwrap();
        assert_eq!(id, "first");
    }

    #[tokio::test]
    async fn test_ensure_folder_creates_when_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"files": []})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "created", "name": "Echo History"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = DriveClient::with_api_base(Arc::new(reqwest::Client::new()), server.uri());
        let resolver = DriveResolver::new(&client);

        let id = resolver.ensure_folder("tok", "Echo History").await.unwrap();
        assert_eq!(id, "created");
    }

    #[tokio::test]
    async fn test_ensure_file_seeds_new_file_with_empty_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"files": []})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "newfile", "name": "echo_chat_history.json"
            })))
            .expect(1)
            .mount(&server)
            .await;
        // The seed upload must happen exactly once.
        Mock::given(method("PATCH"))
            .and(path("/upload/drive/v3/files/newfile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "newfile", "name": "echo_chat_history.json"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = DriveClient::with_api_base(Arc::new(reqwest::Client::new()), server.uri());
        let resolver = DriveResolver::new(&client);

        let id = resolver
            .ensure_file("tok", "folder1", "echo_chat_history.json")
            .await
            .unwrap();
        assert_eq!(id, "newfile");
    }

    #[tokio::test]
    async fn test_ensure_file_query_filters_by_parent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param_contains("q", "'folder1' in parents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{"id": "existing", "name": "echo_chat_history.json"}]
            })))
            .mount(&server)
            .await;

        let client = DriveClient::with_api_base(Arc::new(reqwest::Client::new()), server.uri());
        let resolver = DriveResolver::new(&client);

        let id = resolver
            .ensure_file("tok", "folder1", "echo_chat_history.json")
            .await
            .unwrap();
        assert_eq!(id, "existing");
    }
}
