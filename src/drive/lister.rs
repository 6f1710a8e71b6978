//! Remote tree walker
//!
//! Pages through folder listings through the retry executor, with a fixed
//! pause between pages and before each subfolder so a large tree does not
//! burst through the API rate limit. Recursive walks prefer partial results:
//! a subtree that cannot be listed is recorded and skipped.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::{ChildKind, RemoteItem, RemoteStore, RetryPolicy};
use crate::cancel::CancelFlag;
use crate::error::DriveError;

/// Pause between page fetches of one listing
pub const PAGE_DELAY: Duration = Duration::from_millis(100);

/// Pause before descending into a subfolder
pub const SUBFOLDER_DELAY: Duration = Duration::from_millis(200);

/// Deepest folder level a recursive walk will list (the start folder is 0)
pub const MAX_DEPTH: usize = 20;

/// A subtree the walk could not list
#[derive(Debug)]
pub struct SkippedSubtree {
    pub folder_id: String,
    pub folder_name: String,
    pub error: DriveError,
}

/// Result of a recursive walk: every file found plus the subtrees left out
#[derive(Debug, Default)]
pub struct Walk {
    pub items: Vec<RemoteItem>,
    pub skipped: Vec<SkippedSubtree>,
}

impl Walk {
    pub fn first_error(&self) -> Option<&DriveError> {
        self.skipped.first().map(|s| &s.error)
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Bookkeeping shared across one recursive walk
#[derive(Default)]
struct WalkState {
    walk: Walk,
    visited_folders: HashSet<String>,
    seen_files: HashSet<String>,
}

type WalkFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DriveError>> + Send + 'a>>;

pub struct Lister<'a> {
    store: &'a dyn RemoteStore,
    policy: RetryPolicy,
    cancel: CancelFlag,
    page_delay: Duration,
    subfolder_delay: Duration,
}

impl<'a> Lister<'a> {
    pub fn new(store: &'a dyn RemoteStore, policy: RetryPolicy, cancel: CancelFlag) -> Self {
        Self {
            store,
            policy,
            cancel,
            page_delay: PAGE_DELAY,
            subfolder_delay: SUBFOLDER_DELAY,
        }
    }

    /// All non-trashed children of `folder_id`, ordered by name
    pub async fn list_folder(&self, folder_id: &str) -> Result<Vec<RemoteItem>, DriveError> {
        self.list_kind(folder_id, ChildKind::All).await
    }

    /// Only the subfolders of `folder_id`, ordered by name
    pub async fn list_subfolders(&self, folder_id: &str) -> Result<Vec<RemoteItem>, DriveError> {
        self.list_kind(folder_id, ChildKind::Folders).await
    }

    async fn list_kind(&self, folder_id: &str, kind: ChildKind) -> Result<Vec<RemoteItem>, DriveError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = page_token.clone();
            let page = self
                .policy
                .run(&self.cancel, folder_id, || {
                    self.store.list_children(folder_id, kind, token.as_deref())
                })
                .await?;

            tracing::debug!(
                folder = folder_id,
                count = page.items.len(),
                total = items.len() + page.items.len(),
                "Listed page"
            );
            items.extend(page.items);

            match page.next_page_token {
                Some(next) if !next.is_empty() => {
                    page_token = Some(next);
                    tokio::time::sleep(self.page_delay).await;
                }
                _ => break,
            }
        }

        tracing::info!(folder = folder_id, count = items.len(), "Folder listed");
        Ok(items)
    }

    /// Every file below `folder_id`, depth first. Folders are descended into,
    /// not returned. Fails only if `folder_id` itself cannot be listed or the
    /// run is cancelled; unlistable subtrees end up in `Walk::skipped`.
    pub async fn list_recursive(&self, folder_id: &str) -> Result<Walk, DriveError> {
        let mut state = WalkState::default();
        self.walk_folder(folder_id.to_string(), 0, &mut state).await?;
        Ok(state.walk)
    }

    fn walk_folder<'s>(&'s self, folder_id: String, depth: usize, state: &'s mut WalkState) -> WalkFuture<'s> {
        Box::pin(async move {
            if depth > MAX_DEPTH {
                tracing::warn!(folder = %folder_id, depth, "Maximum folder depth reached");
                return Err(DriveError::DepthExceeded { folder_id, depth });
            }
            state.visited_folders.insert(folder_id.clone());

            let children = self.list_folder(&folder_id).await?;

            for child in children {
                if !child.is_folder() {
                    if state.seen_files.insert(child.id.clone()) {
                        state.walk.items.push(child);
                    }
                    continue;
                }

                if state.visited_folders.contains(&child.id) {
                    tracing::debug!(folder = %child.name, id = %child.id, "Folder already visited, skipping");
                    continue;
                }

                tracing::debug!(folder = %child.name, depth, "Entering subfolder");
                tokio::time::sleep(self.subfolder_delay).await;
                if self.cancel.is_cancelled() {
                    return Err(DriveError::Cancelled);
                }

                if let Err(error) = self.walk_folder(child.id.clone(), depth + 1, state).await {
                    if error.is_cancelled() {
                        return Err(error);
                    }
                    tracing::error!(folder = %child.name, error = %error, "Failed to list folder, continuing");
                    state.walk.skipped.push(SkippedSubtree {
                        folder_id: child.id,
                        folder_name: child.name,
                        error,
                    });
                }
            }

            Ok(())
        })
    }
}
