//! Folder listing against Google Drive.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::{ListingError, SessionCredential};

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const PAGE_SIZE: &str = "1000";
const FIELDS: &str = "files(id,name,mimeType,modifiedTime)";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// A file found under a remote folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub modified_time: Option<String>,
}

/// Enumerates the files under a remote folder, subfolders included.
#[async_trait]
pub trait ResourceLister: Send + Sync {
    async fn list(
        &self,
        credential: &SessionCredential,
        folder_id: &str,
    ) -> Result<Vec<ResourceDescriptor>, ListingError>;
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<ResourceDescriptor>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Clone)]
pub struct DriveLister {
    http: Client,
    files_url: String,
}

impl Default for DriveLister {
    fn default() -> Self {
        Self::with_http_client(Client::new())
    }
}

impl DriveLister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_http_client(http: Client) -> Self {
        Self {
            http,
            files_url: DRIVE_FILES_URL.to_string(),
        }
    }

    pub fn with_files_url(mut self, files_url: impl Into<String>) -> Self {
        self.files_url = files_url.into();
        self
    }

    fn request_url(&self, folder_id: &str) -> Result<Url, ListingError> {
        let mut url = Url::parse(&self.files_url)?;
        url.query_pairs_mut()
            .append_pair("q", &folder_query(folder_id))
            .append_pair("pageSize", PAGE_SIZE)
            .append_pair("fields", FIELDS)
            .append_pair("supportsAllDrives", "true")
            .append_pair("includeItemsFromAllDrives", "true");
        Ok(url)
    }

    async fn list_children(
        &self,
        credential: &SessionCredential,
        folder_id: &str,
    ) -> Result<Vec<ResourceDescriptor>, ListingError> {
        let url = self.request_url(folder_id)?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&credential.access_token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            return Err(ListingError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        let list: FileList =
            serde_json::from_str(&body).map_err(|err| ListingError::InvalidResponse {
                message: err.to_string(),
                body,
            })?;

        debug!(folder_id, count = list.files.len(), "listed drive folder");
        Ok(list.files)
    }
}

impl ResourceDescriptor {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

#[async_trait]
impl ResourceLister for DriveLister {
    async fn list(
        &self,
        credential: &SessionCredential,
        folder_id: &str,
    ) -> Result<Vec<ResourceDescriptor>, ListingError> {
        if folder_id.trim().is_empty() {
            return Err(ListingError::EmptyFolderId);
        }

        // A folder can be reachable through several parents.
        let mut seen = HashSet::from([folder_id.to_string()]);
        let mut queue = VecDeque::from([folder_id.to_string()]);
        let mut files = Vec::new();

        while let Some(current) = queue.pop_front() {
            for entry in self.list_children(credential, &current).await? {
                if entry.is_folder() {
                    if seen.insert(entry.id.clone()) {
                        queue.push_back(entry.id);
                    }
                } else {
                    files.push(entry);
                }
            }
        }

        debug!(folder_id, folders = seen.len(), count = files.len(), "listed drive tree");
        Ok(files)
    }
}

fn folder_query(folder_id: &str) -> String {
    let escaped = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}' in parents and trashed = false")
}
