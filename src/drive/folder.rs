//! Find-or-create of nested folder paths
//!
//! Every segment of a slash-delimited path is looked up by exact name under
//! the previous segment and created only when absent. Resolved folders are
//! memoized per `(parent, name)` for the rest of the run because Drive
//! search can lag behind a folder created seconds earlier.

use dashmap::DashMap;

use super::{RemoteStore, RetryPolicy};
use crate::cancel::CancelFlag;
use crate::error::DriveError;

/// Outcome of resolving one folder path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFolder {
    pub id: String,
    /// Normalized path (segments trimmed, empty segments dropped)
    pub path: String,
    /// At least one segment did not exist before this call
    pub is_new: bool,
}

/// Placeholder identifier handed out in dry-run for a folder that would be created
pub fn dry_run_placeholder(path: &str) -> String {
    format!("dry-run:{}", path)
}

/// Split a slash-delimited path into trimmed, non-empty segments
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').map(str::trim).filter(|s| !s.is_empty()).collect()
}

pub struct FolderResolver<'a> {
    store: &'a dyn RemoteStore,
    policy: RetryPolicy,
    cancel: CancelFlag,
    dry_run: bool,
    memo: DashMap<(String, String), String>,
}

impl<'a> FolderResolver<'a> {
    pub fn new(store: &'a dyn RemoteStore, policy: RetryPolicy, cancel: CancelFlag, dry_run: bool) -> Self {
        Self {
            store,
            policy,
            cancel,
            dry_run,
            memo: DashMap::new(),
        }
    }

    /// Resolve a single folder `name` directly under `parent_id`.
    /// Returns the folder id and whether it had to be created.
    pub async fn find_or_create(&self, name: &str, parent_id: &str) -> Result<(String, bool), DriveError> {
        let key = (parent_id.to_string(), name.to_string());
        if let Some(id) = self.memo.get(&key) {
            return Ok((id.value().clone(), false));
        }

        let found = self
            .policy
            .run(&self.cancel, name, || self.store.find_folder(name, parent_id))
            .await
            .map_err(|e| e.context("look up folder", name))?;

        if let Some(folder) = found {
            tracing::debug!(folder = name, id = %folder.id, "Found existing folder");
            self.memo.insert(key, folder.id.clone());
            return Ok((folder.id, false));
        }

        let created = self
            .policy
            .run(&self.cancel, name, || self.store.create_folder(name, parent_id))
            .await
            .map_err(|e| e.context("create folder", name))?;

        tracing::info!(folder = name, parent = parent_id, id = %created.id, "Created folder");
        self.memo.insert(key, created.id.clone());
        Ok((created.id, true))
    }

    /// Resolve every segment of `path` under `root_id`, creating missing
    /// segments in order. An empty path resolves to `root_id` itself.
    pub async fn find_or_create_path(&self, path: &str, root_id: &str) -> Result<ResolvedFolder, DriveError> {
        let segments = path_segments(path);
        let normalized = segments.join("/");
        let mut parent = root_id.to_string();
        let mut is_new = false;

        for (index, segment) in segments.iter().enumerate() {
            if self.dry_run {
                match self.find_only(segment, &parent).await? {
                    Some(id) => parent = id,
                    None => {
                        let missing = segments[..=index].join("/");
                        tracing::info!(dry_run = true, folder = %missing, path = %normalized, "Would create folder");
                        return Ok(ResolvedFolder {
                            id: dry_run_placeholder(&normalized),
                            path: normalized,
                            is_new: true,
                        });
                    }
                }
            } else {
                let (id, created) = self.find_or_create(segment, &parent).await?;
                is_new |= created;
                parent = id;
            }
        }

        Ok(ResolvedFolder {
            id: parent,
            path: normalized,
            is_new,
        })
    }

    async fn find_only(&self, name: &str, parent_id: &str) -> Result<Option<String>, DriveError> {
        let key = (parent_id.to_string(), name.to_string());
        if let Some(id) = self.memo.get(&key) {
            return Ok(Some(id.value().clone()));
        }
        let found = self
            .policy
            .run(&self.cancel, name, || self.store.find_folder(name, parent_id))
            .await
            .map_err(|e| e.context("look up folder", name))?;
        Ok(found.map(|folder| {
            self.memo.insert(key, folder.id.clone());
            folder.id
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{root, MemoryStore};

    fn resolver(store: &MemoryStore, dry_run: bool) -> FolderResolver<'_> {
        FolderResolver::new(store, RetryPolicy::default(), CancelFlag::new(), dry_run)
    }

    #[test]
    fn test_path_segments() {
        assert_eq!(path_segments("Trabalho/Relatórios"), vec!["Trabalho", "Relatórios"]);
        assert_eq!(path_segments(" a // b /"), vec!["a", "b"]);
        assert!(path_segments("").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_find_or_create_path_is_idempotent() {
        let store = MemoryStore::new();
        let folders = resolver(&store, false);

        let first = folders.find_or_create_path("Trabalho/Relatórios", root()).await.unwrap();
        let second = folders.find_or_create_path("Trabalho/Relatórios", root()).await.unwrap();

        assert_eq!(first.id, second.id);
        assert!(first.is_new);
        assert!(!second.is_new);
        assert_eq!(store.create_calls(), 2);
        assert_eq!(store.folder_count("Trabalho", root()), 1);

        // A fresh resolver has no memo but still finds what exists
        let again = resolver(&store, false)
            .find_or_create_path("Trabalho/Relatórios", root())
            .await
            .unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(store.create_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_segments_nest_under_previous() {
        let store = MemoryStore::new();
        let resolved = resolver(&store, false)
            .find_or_create_path("a/b/c", root())
            .await
            .unwrap();

        let c = store.item(&resolved.id);
        assert_eq!(c.name, "c");
        let b = store.item(&c.parents[0]);
        assert_eq!(b.name, "b");
        let a = store.item(&b.parents[0]);
        assert_eq!(a.name, "a");
        assert_eq!(a.parents, vec![root().to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_existing_prefix_is_reused() {
        let store = MemoryStore::new();
        let work = store.add_folder("Trabalho", root());

        let resolved = resolver(&store, false)
            .find_or_create_path("Trabalho/2024", root())
            .await
            .unwrap();

        assert_eq!(store.item(&resolved.id).parents, vec![work]);
        assert_eq!(store.create_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_is_retried() {
        let store = MemoryStore::new();
        store.fail_next("find:Docs", DriveError::Api { status: 502, message: "Bad Gateway".into() });

        let resolved = resolver(&store, false).find_or_create_path("Docs", root()).await.unwrap();
        assert!(resolved.is_new);
        assert_eq!(store.find_calls(), 2);
        assert_eq!(store.folder_count("Docs", root()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_failure_names_folder() {
        let store = MemoryStore::new();
        store.fail_next("create:Docs", DriveError::Api { status: 403, message: "Forbidden".into() });

        let err = resolver(&store, false)
            .find_or_create_path("Docs", root())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Docs"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_never_creates() {
        let store = MemoryStore::new();
        store.add_folder("Trabalho", root());

        let resolved = resolver(&store, true)
            .find_or_create_path("Trabalho/Novo", root())
            .await
            .unwrap();

        assert_eq!(resolved.id, dry_run_placeholder("Trabalho/Novo"));
        assert!(resolved.is_new);
        assert_eq!(store.create_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_path_is_root() {
        let store = MemoryStore::new();
        let resolved = resolver(&store, false).find_or_create_path(" / ", root()).await.unwrap();
        assert_eq!(resolved.id, root());
        assert!(!resolved.is_new);
    }
}
