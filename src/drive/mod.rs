//! Remote file store access
//!
//! ## Layout
//!
//! ```text
//! client.rs   Drive REST v3 implementation of RemoteStore
//! auth.rs     OAuth2 bootstrap, token persistence and refresh
//! retry.rs    bounded exponential backoff around single remote calls
//! lister.rs   paged and recursive listing (the tree walker)
//! folder.rs   find-or-create of nested folder paths
//! mover.rs    move / move+rename mutations and batch moves
//! ```

pub mod auth;
pub mod client;
pub mod folder;
pub mod lister;
pub mod mover;
pub mod retry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DriveError;

pub use client::DriveClient;
pub use folder::FolderResolver;
pub use lister::{Lister, SkippedSubtree, Walk};
pub use retry::RetryPolicy;

/// Content type the store uses for folders
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// Alias the store accepts for the user's root folder
pub const ROOT_ID: &str = "root";

/// Snapshot of one node (file or folder) in the remote store.
///
/// Never mutated locally; a fresh fetch is needed to observe changes.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteItem {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    /// A node can have zero, one or several parents
    pub parents: Vec<String>,
    pub created_time: Option<DateTime<Utc>>,
    pub modified_time: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

impl RemoteItem {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME
    }

    /// Size to report to the classifier; folders never carry one
    pub fn classification_size(&self) -> Option<u64> {
        if self.is_folder() {
            None
        } else {
            self.size
        }
    }

    /// First parent, the one a move removes the item from
    pub fn first_parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }

    /// Fill the metadata a mutation response left out from an earlier snapshot
    /// of the same item. Identity, name and parents always come from `self`.
    pub fn with_metadata_from(mut self, earlier: &RemoteItem) -> Self {
        self.created_time = self.created_time.or(earlier.created_time);
        self.modified_time = self.modified_time.or(earlier.modified_time);
        self.size = self.size.or(earlier.size);
        self
    }
}

/// Which children a listing should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    All,
    Folders,
}

/// One page of a listing
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<RemoteItem>,
    pub next_page_token: Option<String>,
}

/// Fields to change on an existing item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub add_parent: Option<String>,
    pub remove_parent: Option<String>,
}

impl ItemUpdate {
    pub fn move_to(new_parent: &str, old_parent: &str) -> Self {
        Self {
            name: None,
            add_parent: Some(new_parent.to_string()),
            remove_parent: Some(old_parent.to_string()),
        }
    }
}

/// Capabilities the reorganization engine needs from the remote store.
///
/// Listings only ever return items that are not trashed.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list_children(
        &self,
        parent_id: &str,
        kind: ChildKind,
        page_token: Option<&str>,
    ) -> Result<Page, DriveError>;

    async fn find_folder(&self, name: &str, parent_id: &str)
        -> Result<Option<RemoteItem>, DriveError>;

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<RemoteItem, DriveError>;

    async fn update_item(&self, id: &str, update: &ItemUpdate) -> Result<RemoteItem, DriveError>;

    /// Text content of a file, cut to `limit` characters. `Ok(None)` when the
    /// content type has no useful text representation.
    async fn download_text(&self, item: &RemoteItem, limit: usize)
        -> Result<Option<String>, DriveError>;
}

/// Escape a value for use inside a single-quoted Drive query literal
pub fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Content types worth downloading as text for content analysis
pub fn is_text_like(mime_type: &str) -> bool {
    mime_type.starts_with("text/")
        || matches!(
            mime_type,
            "application/json"
                | "application/xml"
                | "application/x-yaml"
                | "application/vnd.google-apps.document"
                | "application/vnd.google-apps.spreadsheet"
                | "application/vnd.google-apps.presentation"
        )
}
