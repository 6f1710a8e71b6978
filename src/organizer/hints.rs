//! Folder hints handed to every classification call
//!
//! Seeded from the live top-level folder listing and only ever grown, so
//! later files in a run see the folders earlier files were moved into.

use std::collections::BTreeSet;

use crate::drive::folder::path_segments;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderHintSet {
    folders: BTreeSet<String>,
}

impl FolderHintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for name in names {
            set.insert(name.as_ref());
        }
        set
    }

    /// Add a folder path (normalized to `a/b` form). Returns true if it was new.
    pub fn insert(&mut self, path: &str) -> bool {
        let normalized = path_segments(path).join("/");
        if normalized.is_empty() {
            return false;
        }
        self.folders.insert(normalized)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.folders.contains(&path_segments(path).join("/"))
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// Snapshot in sorted order, the shape the classifier takes
    pub fn to_vec(&self) -> Vec<String> {
        self.folders.iter().cloned().collect()
    }
}
