//! Drive API v3 gateway
//!
//! Forms have no delete endpoint of their own; a form is removed by deleting
//! its backing Drive file. Folder placement also goes through Drive.

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::client::{ApiCall, GoogleClient};
use super::constants;
use super::errors::ApiError;
use super::models::drive::{DriveFile, Permission};

const FILE_FIELDS: &str = "id,name,mimeType,parents,webViewLink,trashed";

/// Capability interface over `files.*` and `permissions.*`
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Delete a file; an already-missing file counts as deleted
    async fn delete(&self, cancel: &CancellationToken, file_id: &str) -> Result<(), ApiError>;

    async fn get(&self, cancel: &CancellationToken, file_id: &str) -> Result<DriveFile, ApiError>;

    /// Patch metadata (name, description, ...). Parent changes go through
    /// [`move_to_folder`](Self::move_to_folder).
    async fn update(&self, cancel: &CancellationToken, file_id: &str, metadata: &DriveFile) -> Result<DriveFile, ApiError>;

    /// Make `folder_id` the only parent; returns the new parent list
    async fn move_to_folder(&self, cancel: &CancellationToken, file_id: &str, folder_id: &str) -> Result<Vec<String>, ApiError>;

    async fn get_parents(&self, cancel: &CancellationToken, file_id: &str) -> Result<Vec<String>, ApiError>;

    /// Create a file or folder from metadata. Never retried.
    async fn create_file(&self, cancel: &CancellationToken, metadata: &DriveFile) -> Result<DriveFile, ApiError>;

    /// Never retried.
    async fn create_permission(
        &self,
        cancel: &CancellationToken,
        file_id: &str,
        permission: &Permission,
        send_notification_email: bool,
    ) -> Result<Permission, ApiError>;

    async fn get_permission(&self, cancel: &CancellationToken, file_id: &str, permission_id: &str) -> Result<Permission, ApiError>;

    /// An already-missing permission counts as deleted
    async fn delete_permission(&self, cancel: &CancellationToken, file_id: &str, permission_id: &str) -> Result<(), ApiError>;
}

#[derive(Debug, Default, Deserialize)]
struct ParentsOnly {
    #[serde(default)]
    parents: Vec<String>,
}

pub struct HttpDriveApi {
    client: GoogleClient,
    base_url: String,
}

impl HttpDriveApi {
    pub fn new(client: GoogleClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn absent_is_ok(result: Result<(), ApiError>) -> Result<(), ApiError> {
    match result {
        Err(ApiError::NotFound { resource, id }) => {
            debug!("{} {} already absent", resource, id);
            Ok(())
        }
        other => other,
    }
}

#[async_trait]
impl DriveApi for HttpDriveApi {
    async fn delete(&self, cancel: &CancellationToken, file_id: &str) -> Result<(), ApiError> {
        let url = constants::drive_file(&self.base_url, file_id);
        let call = ApiCall::new("files.delete", "file", file_id);
        let result = self
            .client
            .send_empty(cancel, &call, |http| {
                http.delete(&url).query(&[("supportsAllDrives", "true")])
            })
            .await;
        absent_is_ok(result)?;
        info!("Deleted Drive file {}", file_id);
        Ok(())
    }

    async fn get(&self, cancel: &CancellationToken, file_id: &str) -> Result<DriveFile, ApiError> {
        let url = constants::drive_file(&self.base_url, file_id);
        let call = ApiCall::new("files.get", "file", file_id);
        self.client
            .send(cancel, &call, |http| {
                http.get(&url)
                    .query(&[("fields", FILE_FIELDS), ("supportsAllDrives", "true")])
            })
            .await
    }

    async fn update(&self, cancel: &CancellationToken, file_id: &str, metadata: &DriveFile) -> Result<DriveFile, ApiError> {
        let url = constants::drive_file(&self.base_url, file_id);
        let call = ApiCall::new("files.update", "file", file_id);
        // parents are read-only on update; strip them from the body
        let body = DriveFile {
            parents: Vec::new(),
            ..metadata.clone()
        };
        self.client
            .send(cancel, &call, |http| {
                http.patch(&url)
                    .query(&[("fields", FILE_FIELDS), ("supportsAllDrives", "true")])
                    .json(&body)
            })
            .await
    }

    async fn move_to_folder(&self, cancel: &CancellationToken, file_id: &str, folder_id: &str) -> Result<Vec<String>, ApiError> {
        let current = self.get_parents(cancel, file_id).await?;
        if current.len() == 1 && current[0] == folder_id {
            return Ok(current);
        }

        let remove = current
            .iter()
            .filter(|p| p.as_str() != folder_id)
            .cloned()
            .collect::<Vec<_>>()
            .join(",");

        let url = constants::drive_file(&self.base_url, file_id);
        let call = ApiCall::new("files.update", "file", file_id);
        let moved: ParentsOnly = self
            .client
            .send(cancel, &call, |http| {
                let mut request = http
                    .patch(&url)
                    .query(&[
                        ("addParents", folder_id),
                        ("fields", "id,parents"),
                        ("supportsAllDrives", "true"),
                    ]);
                if !remove.is_empty() {
                    request = request.query(&[("removeParents", remove.as_str())]);
                }
                request.json(&serde_json::json!({}))
            })
            .await?;

        info!("Moved Drive file {} into folder {}", file_id, folder_id);
        Ok(moved.parents)
    }

    async fn get_parents(&self, cancel: &CancellationToken, file_id: &str) -> Result<Vec<String>, ApiError> {
        let url = constants::drive_file(&self.base_url, file_id);
        let call = ApiCall::new("files.get", "file", file_id);
        let file: ParentsOnly = self
            .client
            .send(cancel, &call, |http| {
                http.get(&url)
                    .query(&[("fields", "parents"), ("supportsAllDrives", "true")])
            })
            .await?;
        Ok(file.parents)
    }

    async fn create_file(&self, cancel: &CancellationToken, metadata: &DriveFile) -> Result<DriveFile, ApiError> {
        let url = constants::drive_files(&self.base_url);
        let call = ApiCall::new("files.create", "file", metadata.name.clone().unwrap_or_default());
        self.client
            .send_once(cancel, &call, |http| {
                http.post(&url)
                    .query(&[("fields", FILE_FIELDS), ("supportsAllDrives", "true")])
                    .json(metadata)
            })
            .await
    }

    async fn create_permission(
        &self,
        cancel: &CancellationToken,
        file_id: &str,
        permission: &Permission,
        send_notification_email: bool,
    ) -> Result<Permission, ApiError> {
        let url = constants::drive_permissions(&self.base_url, file_id);
        let call = ApiCall::new("permissions.create", "file", file_id);
        let notify = if send_notification_email { "true" } else { "false" };
        self.client
            .send_once(cancel, &call, |http| {
                http.post(&url)
                    .query(&[("sendNotificationEmail", notify), ("supportsAllDrives", "true")])
                    .json(permission)
            })
            .await
    }

    async fn get_permission(&self, cancel: &CancellationToken, file_id: &str, permission_id: &str) -> Result<Permission, ApiError> {
        let url = constants::drive_permission(&self.base_url, file_id, permission_id);
        let call = ApiCall::new("permissions.get", "permission", format!("{}#{}", file_id, permission_id));
        self.client
            .send(cancel, &call, |http| {
                http.get(&url).query(&[("supportsAllDrives", "true")])
            })
            .await
    }

    async fn delete_permission(&self, cancel: &CancellationToken, file_id: &str, permission_id: &str) -> Result<(), ApiError> {
        let url = constants::drive_permission(&self.base_url, file_id, permission_id);
        let call = ApiCall::new("permissions.delete", "permission", format!("{}#{}", file_id, permission_id));
        let result = self
            .client
            .send_empty(cancel, &call, |http| {
                http.delete(&url).query(&[("supportsAllDrives", "true")])
            })
            .await;
        absent_is_ok(result)
    }
}
