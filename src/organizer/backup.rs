//! Backup staging
//!
//! Moves everything at the root into the backup folder (except the backup
//! folder itself) and returns the work queue for the decision loop. In
//! resume mode, or when the root has nothing new, the queue is the current
//! content of the backup tree instead.

use crate::cancel::CancelFlag;
use crate::drive::folder::{path_segments, FolderResolver};
use crate::drive::lister::{Lister, SkippedSubtree, Walk};
use crate::drive::mover::Mover;
use crate::drive::{RemoteItem, RemoteStore, RetryPolicy, ROOT_ID};
use crate::error::DriveError;

/// Progress hooks for the root-to-backup moves
///
/// All methods default to no-ops.
pub trait StageProgress: Send + Sync {
    fn start(&self, _total: u64) {}
    fn advance(&self, _item: &str, _moved: bool) {}
    fn finish(&self, _moved: usize, _failed: usize) {}
}

/// Reports nothing
pub struct SilentProgress;

impl StageProgress for SilentProgress {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageMode {
    /// Move root items into the backup first
    Fresh,
    /// Work from what is already inside the backup tree
    Resume,
}

/// Where the work queue came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkSource {
    RootItems,
    BackupTree,
}

#[derive(Debug)]
pub struct StageResult {
    pub backup_folder_id: String,
    /// Items to organize, with their parents as they are after staging
    pub work: Vec<RemoteItem>,
    pub moved: usize,
    pub failed: Vec<(RemoteItem, DriveError)>,
    pub source: WorkSource,
    /// Subtrees of the backup folder that could not be listed
    pub skipped_subtrees: Vec<SkippedSubtree>,
}

pub struct BackupStager<'a> {
    store: &'a dyn RemoteStore,
    policy: RetryPolicy,
    cancel: CancelFlag,
    dry_run: bool,
    progress: &'a dyn StageProgress,
}

impl<'a> BackupStager<'a> {
    pub fn new(store: &'a dyn RemoteStore, policy: RetryPolicy, cancel: CancelFlag, dry_run: bool) -> Self {
        Self {
            store,
            policy,
            cancel,
            dry_run,
            progress: &SilentProgress,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn StageProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Resolve `backup_path` and build the work queue.
    ///
    /// Fails when the backup folder cannot be resolved, the root cannot be
    /// listed or the run is cancelled. Individual move failures are reported
    /// in `StageResult::failed`.
    pub async fn stage(
        &self,
        resolver: &FolderResolver<'_>,
        backup_path: &str,
        mode: StageMode,
    ) -> Result<StageResult, DriveError> {
        let backup = resolver.find_or_create_path(backup_path, ROOT_ID).await?;
        tracing::info!(path = %backup.path, id = %backup.id, created = backup.is_new, "Backup folder ready");

        let lister = Lister::new(self.store, self.policy, self.cancel.clone());

        if mode == StageMode::Resume {
            tracing::info!("Resume mode: root items are left in place");
            return self.from_backup_tree(&lister, backup.id, backup.is_new).await;
        }

        let backup_root = path_segments(backup_path).first().copied().unwrap_or_default();
        let to_back_up: Vec<RemoteItem> = lister
            .list_folder(ROOT_ID)
            .await?
            .into_iter()
            .filter(|item| !(item.is_folder() && (item.name == backup_root || item.id == backup.id)))
            .collect();

        if to_back_up.is_empty() {
            tracing::info!("Nothing new at the root, checking the backup tree");
            return self.from_backup_tree(&lister, backup.id, backup.is_new).await;
        }

        tracing::info!(count = to_back_up.len(), "Moving root items into backup");
        self.progress.start(to_back_up.len() as u64);
        let mover = Mover::new(self.store, self.policy, self.cancel.clone(), self.dry_run);
        let batch = mover
            .move_items_with(&to_back_up, &backup.id, |item, moved| {
                self.progress.advance(&item.name, moved)
            })
            .await;
        self.progress.finish(batch.moved.len(), batch.failed.len());

        if batch.cancelled {
            return Err(DriveError::Cancelled);
        }

        Ok(StageResult {
            backup_folder_id: backup.id,
            moved: batch.moved.len(),
            work: batch.moved,
            failed: batch.failed,
            source: WorkSource::RootItems,
            skipped_subtrees: Vec::new(),
        })
    }

    async fn from_backup_tree(
        &self,
        lister: &Lister<'_>,
        backup_id: String,
        just_created: bool,
    ) -> Result<StageResult, DriveError> {
        // A folder that does not exist yet (dry-run placeholder) has nothing inside
        let walk = if self.dry_run && just_created {
            Walk::default()
        } else {
            lister.list_recursive(&backup_id).await?
        };

        tracing::info!(
            files = walk.items.len(),
            skipped_subtrees = walk.skipped.len(),
            "Backup tree listed"
        );

        Ok(StageResult {
            backup_folder_id: backup_id,
            work: walk.items,
            moved: 0,
            failed: Vec::new(),
            source: WorkSource::BackupTree,
            skipped_subtrees: walk.skipped,
        })
    }
}
