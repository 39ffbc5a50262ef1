//! Google Drive API client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use dbferry_common::{Error, RemoteObject, RemoteStore, Result};

/// Google Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Google Drive upload API base URL.
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Multipart boundary for metadata+media uploads.
const UPLOAD_BOUNDARY: &str = "dbferry_boundary";

/// Fields requested on every file response.
const FILE_FIELDS: &str = "id,name,mimeType,modifiedTime";

/// Google Drive file metadata from the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: String,
    /// File name.
    pub name: String,
    /// MIME type.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Modified time.
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
}

/// Response from listing files.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Google Drive API client holding the bearer token for one run.
pub struct DriveClient {
    http: Client,
    access_token: String,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    /// Create a new Drive client with an already-valid access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        let http = Client::builder()
            .user_agent("dbferry/0.1")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            access_token: access_token.into(),
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
        }
    }

    /// Override the API endpoints (tests).
    pub fn with_base_urls(mut self, api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.upload_base = upload_base.into();
        self
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Upload a file into a folder via a multipart/related request:
    /// a JSON metadata part followed by the media part.
    pub async fn upload_file(
        &self,
        name: &str,
        folder_id: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<DriveFile> {
        let url = format!("{}/files?uploadType=multipart", self.upload_base);

        let metadata = serde_json::json!({
            "name": name,
            "mimeType": mime_type,
            "parents": [folder_id],
        });

        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| Error::Serialization(format!("Failed to encode metadata: {}", e)))?;

        let mut body = Vec::with_capacity(data.len() + metadata_json.len() + 256);

        // Metadata part
        body.extend_from_slice(format!("--{}\r\n", UPLOAD_BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(metadata_json.as_bytes());
        body.extend_from_slice(b"\r\n");

        // Media part
        body.extend_from_slice(format!("--{}\r\n", UPLOAD_BOUNDARY).as_bytes());
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
        body.extend_from_slice(&data);
        body.extend_from_slice(b"\r\n");

        // End boundary
        body.extend_from_slice(format!("--{}--", UPLOAD_BOUNDARY).as_bytes());

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", UPLOAD_BOUNDARY),
            )
            .query(&[("fields", FILE_FIELDS)])
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload file: {}", e)))?;

        self.handle_response(response).await
    }

    /// List all files in a folder, following pagination.
    pub async fn list_files(&self, folder_id: &str) -> Result<Vec<DriveFile>> {
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = format!("{}/files", self.api_base);
            let query = format!("'{}' in parents and trashed = false", folder_id);

            let mut request = self
                .http
                .get(&url)
                .header(header::AUTHORIZATION, self.auth_header())
                .query(&[
                    ("q", query.as_str()),
                    ("fields", "files(id,name,mimeType,modifiedTime),nextPageToken"),
                    ("pageSize", "1000"),
                ]);

            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::Network(format!("Failed to list folder: {}", e)))?;

            let list_response: FileListResponse = self.handle_response(response).await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Listed {} files in folder {}", all_files.len(), folder_id);

        Ok(all_files)
    }

    /// Delete a file by id.
    pub async fn delete_file(&self, file_id: &str) -> Result<()> {
        let url = format!("{}/files/{}", self.api_base, file_id);

        let response = self
            .http
            .delete(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to delete file: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::NOT_FOUND {
            Err(Error::NotFound(format!("File not found: {}", file_id)))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Network(format!(
                "Delete failed: {} - {}",
                status, body
            )))
        }
    }

    /// Handle an API response with status mapping.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
        } else if status == StatusCode::NOT_FOUND {
            Err(Error::NotFound("Resource not found".to_string()))
        } else if status == StatusCode::UNAUTHORIZED {
            Err(Error::Auth("Invalid or expired token".to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Network(format!("API error: {} - {}", status, body)))
        }
    }
}

fn to_remote_object(file: DriveFile) -> RemoteObject {
    RemoteObject {
        id: file.id,
        name: file.name,
        // An object without a modification timestamp is never eligible for
        // pruning; treat it as current.
        modified: file.modified_time.unwrap_or_else(Utc::now),
    }
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn upload(
        &self,
        name: &str,
        folder_id: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<RemoteObject> {
        let file = self.upload_file(name, folder_id, mime_type, data).await?;
        Ok(to_remote_object(file))
    }

    async fn list_folder(&self, folder_id: &str) -> Result<Vec<RemoteObject>> {
        let files = self.list_files(folder_id).await?;
        Ok(files.into_iter().map(to_remote_object).collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.delete_file(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_file_deserializes_camel_case() {
        let json = r#"{
            "id": "abc123",
            "name": "app_2024-01-01T00:00:00Z.sql.gz",
            "mimeType": "application/gzip",
            "modifiedTime": "2024-01-01T00:00:00Z"
        }"#;

        let file: DriveFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.id, "abc123");
        assert_eq!(file.mime_type.as_deref(), Some("application/gzip"));
        assert!(file.modified_time.is_some());
    }

    #[test]
    fn test_list_response_parses_page_token() {
        let json = r#"{
            "files": [{"id": "1", "name": "a.sql"}],
            "nextPageToken": "page2"
        }"#;

        let response: FileListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.files.len(), 1);
        assert_eq!(response.next_page_token.as_deref(), Some("page2"));

        let last_page: FileListResponse = serde_json::from_str(r#"{"files": []}"#).unwrap();
        assert!(last_page.next_page_token.is_none());
    }

    #[test]
    fn test_remote_object_without_timestamp_is_treated_as_current() {
        let file: DriveFile = serde_json::from_str(r#"{"id": "1", "name": "a.sql"}"#).unwrap();

        let before = Utc::now();
        let object = to_remote_object(file);

        assert!(object.modified >= before);
    }

    #[test]
    fn test_base_url_override() {
        let client = DriveClient::new("token")
            .with_base_urls("http://localhost:1/drive", "http://localhost:1/upload");

        assert_eq!(client.api_base, "http://localhost:1/drive");
        assert_eq!(client.upload_base, "http://localhost:1/upload");
    }
}
