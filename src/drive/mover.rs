//! Move and move+rename mutations
//!
//! A move is a single `update_item` call that adds the new parent and
//! removes the item's current first parent. Batches never short-circuit:
//! each item's outcome is folded into a `BatchMove`.

use super::{ItemUpdate, RemoteItem, RemoteStore, RetryPolicy};
use crate::cancel::CancelFlag;
use crate::error::DriveError;

/// Accumulated result of moving several items
#[derive(Debug, Default)]
pub struct BatchMove {
    /// Items as returned by the store after the move (fresh parents)
    pub moved: Vec<RemoteItem>,
    pub failed: Vec<(RemoteItem, DriveError)>,
    /// The run was cancelled before every item was attempted
    pub cancelled: bool,
}

pub struct Mover<'a> {
    store: &'a dyn RemoteStore,
    policy: RetryPolicy,
    cancel: CancelFlag,
    dry_run: bool,
}

impl<'a> Mover<'a> {
    pub fn new(store: &'a dyn RemoteStore, policy: RetryPolicy, cancel: CancelFlag, dry_run: bool) -> Self {
        Self {
            store,
            policy,
            cancel,
            dry_run,
        }
    }

    /// Move `item` under `new_parent`, detaching it from its first parent
    pub async fn move_item(&self, item: &RemoteItem, new_parent: &str) -> Result<RemoteItem, DriveError> {
        self.apply(item, new_parent, None).await
    }

    /// Move `item` under `new_parent` and rename it in the same call
    pub async fn move_and_rename(
        &self,
        item: &RemoteItem,
        new_parent: &str,
        new_name: &str,
    ) -> Result<RemoteItem, DriveError> {
        let rename = (new_name != item.name).then_some(new_name);
        self.apply(item, new_parent, rename).await
    }

    async fn apply(
        &self,
        item: &RemoteItem,
        new_parent: &str,
        new_name: Option<&str>,
    ) -> Result<RemoteItem, DriveError> {
        let old_parent = item.first_parent();
        let action = if new_name.is_some() { "move and rename" } else { "move" };

        if old_parent == Some(new_parent) && new_name.is_none() {
            tracing::debug!(file = %item.name, "Already in target folder");
            return Ok(item.clone());
        }

        let update = ItemUpdate {
            name: new_name.map(str::to_string),
            add_parent: (old_parent != Some(new_parent)).then(|| new_parent.to_string()),
            remove_parent: old_parent
                .filter(|old| *old != new_parent)
                .map(str::to_string),
        };

        if self.dry_run {
            tracing::info!(
                dry_run = true,
                file = %item.name,
                to = new_parent,
                renamed = new_name.unwrap_or(""),
                "Would {}",
                action
            );
            return Ok(simulate(item, &update));
        }

        let updated = self
            .policy
            .run(&self.cancel, &item.id, || self.store.update_item(&item.id, &update))
            .await
            .map_err(|e| e.context(action, &item.name))?
            .with_metadata_from(item);

        tracing::info!(
            file = %item.name,
            id = %item.id,
            to = new_parent,
            renamed = new_name.unwrap_or(""),
            "Item moved"
        );
        Ok(updated)
    }

    /// Move every item under `new_parent`, calling `on_item(item, succeeded)`
    /// after each attempt. Individual failures are recorded and the batch
    /// goes on; cancellation stops it.
    pub async fn move_items_with<F>(&self, items: &[RemoteItem], new_parent: &str, mut on_item: F) -> BatchMove
    where
        F: FnMut(&RemoteItem, bool) + Send,
    {
        let mut batch = BatchMove::default();

        for item in items {
            if self.cancel.is_cancelled() {
                batch.cancelled = true;
                break;
            }

            match self.move_item(item, new_parent).await {
                Ok(moved) => {
                    on_item(item, true);
                    batch.moved.push(moved);
                }
                Err(e) if e.is_cancelled() => {
                    batch.cancelled = true;
                    break;
                }
                Err(e) => {
                    tracing::error!(file = %item.name, error = %e, "Move failed, continuing");
                    on_item(item, false);
                    batch.failed.push((item.clone(), e));
                }
            }
        }

        batch
    }
}

/// Local view of `item` after `update`, used when nothing is sent in dry-run
fn simulate(item: &RemoteItem, update: &ItemUpdate) -> RemoteItem {
    let mut result = item.clone();
    if let Some(name) = &update.name {
        result.name = name.clone();
    }
    if let Some(old) = &update.remove_parent {
        result.parents.retain(|p| p != old);
    }
    if let Some(new) = &update.add_parent {
        result.parents.insert(0, new.clone());
    }
    result
}
