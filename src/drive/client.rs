//! Drive REST v3 client
//!
//! Implements `RemoteStore` over plain HTTPS with the shared Drive HTTP
//! client. Every request carries a bearer token from the `TokenSource`;
//! non-2xx responses are turned into `DriveError::Api` with Google's own
//! error message so the retry executor can classify them by status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::auth::TokenSource;
use super::{escape_query, is_text_like, ChildKind, ItemUpdate, Page, RemoteItem, RemoteStore, FOLDER_MIME};
use crate::error::DriveError;
use crate::http_client::drive_client;

pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

const PAGE_SIZE: &str = "100";
const FILE_FIELDS: &str = "id, name, mimeType, parents, createdTime, modifiedTime, size";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiFile {
    id: String,
    name: String,
    mime_type: String,
    #[serde(default)]
    parents: Vec<String>,
    created_time: Option<DateTime<Utc>>,
    modified_time: Option<DateTime<Utc>>,
    /// int64 fields arrive as JSON strings
    size: Option<String>,
}

impl From<ApiFile> for RemoteItem {
    fn from(file: ApiFile) -> Self {
        RemoteItem {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            parents: file.parents,
            created_time: file.created_time,
            modified_time: file.modified_time,
            size: file.size.and_then(|s| s.parse().ok()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<ApiFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Query selecting the non-trashed children of `parent_id`
pub fn children_query(parent_id: &str, kind: ChildKind) -> String {
    let mut q = format!("'{}' in parents and trashed = false", escape_query(parent_id));
    if kind == ChildKind::Folders {
        q.push_str(&format!(" and mimeType = '{}'", FOLDER_MIME));
    }
    q
}

/// Query selecting a folder by exact name under `parent_id`
pub fn folder_query(name: &str, parent_id: &str) -> String {
    format!(
        "name = '{}' and '{}' in parents and mimeType = '{}' and trashed = false",
        escape_query(name),
        escape_query(parent_id),
        FOLDER_MIME
    )
}

/// Export format for Google-native documents, `None` for regular files
fn export_mime(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "application/vnd.google-apps.spreadsheet" => Some("text/csv"),
        m if m.starts_with("application/vnd.google-apps.") => Some("text/plain"),
        _ => None,
    }
}

fn api_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| {
            if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body.trim().to_string()
            }
        })
}

pub struct DriveClient {
    tokens: Arc<TokenSource>,
    base_url: String,
}

impl DriveClient {
    pub fn new(tokens: Arc<TokenSource>) -> Self {
        Self {
            tokens,
            base_url: DRIVE_API_BASE.to_string(),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, DriveError> {
        let token = self.tokens.access_token().await?;
        let resp = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| DriveError::from_transport(&e))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(DriveError::Api {
            status: status.as_u16(),
            message: api_message(status.as_u16(), &body),
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, DriveError> {
        let resp = self.send(request).await?;
        let bytes = resp.bytes().await.map_err(|e| DriveError::from_transport(&e))?;
        serde_json::from_slice(&bytes).map_err(|e| DriveError::Decode(e.to_string()))
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.base_url)
    }
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn list_children(
        &self,
        parent_id: &str,
        kind: ChildKind,
        page_token: Option<&str>,
    ) -> Result<Page, DriveError> {
        let q = children_query(parent_id, kind);
        let fields = format!("nextPageToken, files({})", FILE_FIELDS);
        let mut request = drive_client().get(self.files_url()).query(&[
            ("q", q.as_str()),
            ("pageSize", PAGE_SIZE),
            ("orderBy", "name"),
            ("fields", fields.as_str()),
        ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let list: FileList = self.send_json(request).await?;
        Ok(Page {
            items: list.files.into_iter().map(RemoteItem::from).collect(),
            next_page_token: list.next_page_token,
        })
    }

    async fn find_folder(&self, name: &str, parent_id: &str) -> Result<Option<RemoteItem>, DriveError> {
        let q = folder_query(name, parent_id);
        let request = drive_client().get(self.files_url()).query(&[
            ("q", q.as_str()),
            ("pageSize", "1"),
            ("fields", "files(id, name, mimeType, parents)"),
        ]);

        let list: FileList = self.send_json(request).await?;
        Ok(list.files.into_iter().next().map(RemoteItem::from))
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<RemoteItem, DriveError> {
        let body = json!({
            "name": name,
            "mimeType": FOLDER_MIME,
            "parents": [parent_id],
        });
        let request = drive_client()
            .post(self.files_url())
            .query(&[("fields", FILE_FIELDS)])
            .json(&body);

        let file: ApiFile = self.send_json(request).await?;
        Ok(file.into())
    }

    async fn update_item(&self, id: &str, update: &ItemUpdate) -> Result<RemoteItem, DriveError> {
        let mut params: Vec<(&str, &str)> = vec![("fields", FILE_FIELDS)];
        if let Some(add) = &update.add_parent {
            params.push(("addParents", add.as_str()));
        }
        if let Some(remove) = &update.remove_parent {
            params.push(("removeParents", remove.as_str()));
        }

        let body = match &update.name {
            Some(name) => json!({ "name": name }),
            None => json!({}),
        };
        let request = drive_client()
            .patch(format!("{}/{}", self.files_url(), id))
            .query(&params)
            .json(&body);

        let file: ApiFile = self.send_json(request).await?;
        Ok(file.into())
    }

    async fn download_text(&self, item: &RemoteItem, limit: usize) -> Result<Option<String>, DriveError> {
        if !is_text_like(&item.mime_type) {
            return Ok(None);
        }

        let request = match export_mime(&item.mime_type) {
            Some(export) => drive_client()
                .get(format!("{}/{}/export", self.files_url(), item.id))
                .query(&[("mimeType", export)]),
            // UTF-8 needs at most 4 bytes per character
            None => drive_client()
                .get(format!("{}/{}", self.files_url(), item.id))
                .query(&[("alt", "media")])
                .header(reqwest::header::RANGE, format!("bytes=0-{}", limit.saturating_mul(4))),
        };

        let resp = self.send(request).await?;
        let bytes = resp.bytes().await.map_err(|e| DriveError::from_transport(&e))?;
        let text: String = String::from_utf8_lossy(&bytes).chars().take(limit).collect();
        Ok(Some(text))
    }
}
