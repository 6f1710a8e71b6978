//! In-memory collaborators for tests

use async_trait::async_trait;
use chrono::DateTime;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::classifier::{Classifier, FileMetadata, Suggestion};
use crate::drive::{ChildKind, ItemUpdate, Page, RemoteItem, RemoteStore, FOLDER_MIME, ROOT_ID};
use crate::error::{ClassifyError, DriveError};

#[derive(Default)]
struct StoreState {
    nodes: HashMap<String, RemoteItem>,
    contents: HashMap<String, String>,
    failures: HashMap<String, VecDeque<DriveError>>,
    next_id: usize,
    list_calls: usize,
    find_calls: usize,
    create_calls: usize,
    updates: Vec<(String, ItemUpdate)>,
}

/// Remote store kept in a HashMap, with scripted failures keyed by
/// `"list:<parent>"`, `"find:<name>"`, `"create:<name>"` or `"update:<id>"`.
pub struct MemoryStore {
    state: Mutex<StoreState>,
    page_size: usize,
    partial_updates: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(100)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            page_size: page_size.max(1),
            partial_updates: false,
        }
    }

    /// Answer `update_item` with identity, name and parents only, the way a
    /// narrow `fields` selector does
    pub fn with_partial_updates(mut self) -> Self {
        self.partial_updates = true;
        self
    }

    fn insert(&self, name: &str, mime: &str, parent: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let seq = state.next_id;
        let id = format!("id-{}", seq);
        state.nodes.insert(
            id.clone(),
            RemoteItem {
                id: id.clone(),
                name: name.to_string(),
                mime_type: mime.to_string(),
                parents: vec![parent.to_string()],
                created_time: DateTime::from_timestamp(1_700_000_000, 0),
                modified_time: DateTime::from_timestamp(1_700_000_000 + seq as i64, 0),
                size: if mime == FOLDER_MIME { None } else { Some(1024) },
            },
        );
        id
    }

    pub fn add_folder(&self, name: &str, parent: &str) -> String {
        self.insert(name, FOLDER_MIME, parent)
    }

    pub fn add_file(&self, name: &str, mime: &str, parent: &str) -> String {
        self.insert(name, mime, parent)
    }

    pub fn add_parent(&self, id: &str, parent: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(node) = state.nodes.get_mut(id) {
            node.parents.push(parent.to_string());
        }
    }

    pub fn set_content(&self, id: &str, text: &str) {
        self.state.lock().unwrap().contents.insert(id.to_string(), text.to_string());
    }

    pub fn fail_next(&self, key: &str, err: DriveError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(key.to_string())
            .or_default()
            .push_back(err);
    }

    pub fn item(&self, id: &str) -> RemoteItem {
        self.state.lock().unwrap().nodes[id].clone()
    }

    /// Names of the children of `parent`, sorted
    pub fn child_names(&self, parent: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut names: Vec<String> = state
            .nodes
            .values()
            .filter(|n| n.parents.iter().any(|p| p == parent))
            .map(|n| n.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of folders called `name` directly under `parent`
    pub fn folder_count(&self, name: &str, parent: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .values()
            .filter(|n| n.is_folder() && n.name == name && n.parents.iter().any(|p| p == parent))
            .count()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn find_calls(&self) -> usize {
        self.state.lock().unwrap().find_calls
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    pub fn updates(&self) -> Vec<(String, ItemUpdate)> {
        self.state.lock().unwrap().updates.clone()
    }

    fn take_failure(state: &mut StoreState, key: &str) -> Option<DriveError> {
        state.failures.get_mut(key).and_then(|q| q.pop_front())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_children(
        &self,
        parent_id: &str,
        kind: ChildKind,
        page_token: Option<&str>,
    ) -> Result<Page, DriveError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if let Some(err) = Self::take_failure(&mut state, &format!("list:{}", parent_id)) {
            return Err(err);
        }

        let mut items: Vec<RemoteItem> = state
            .nodes
            .values()
            .filter(|n| n.parents.iter().any(|p| p == parent_id))
            .filter(|n| kind == ChildKind::All || n.is_folder())
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        let offset: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (offset + self.page_size).min(items.len());
        let next_page_token = (end < items.len()).then(|| end.to_string());
        Ok(Page {
            items: items[offset.min(end)..end].to_vec(),
            next_page_token,
        })
    }

    async fn find_folder(
        &self,
        name: &str,
        parent_id: &str,
    ) -> Result<Option<RemoteItem>, DriveError> {
        let mut state = self.state.lock().unwrap();
        state.find_calls += 1;
        if let Some(err) = Self::take_failure(&mut state, &format!("find:{}", name)) {
            return Err(err);
        }
        let mut matches: Vec<&RemoteItem> = state
            .nodes
            .values()
            .filter(|n| n.is_folder() && n.name == name && n.parents.iter().any(|p| p == parent_id))
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches.first().map(|n| (*n).clone()))
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<RemoteItem, DriveError> {
        {
            let mut state = self.state.lock().unwrap();
            state.create_calls += 1;
            if let Some(err) = Self::take_failure(&mut state, &format!("create:{}", name)) {
                return Err(err);
            }
        }
        let id = self.add_folder(name, parent_id);
        Ok(self.item(&id))
    }

    async fn update_item(&self, id: &str, update: &ItemUpdate) -> Result<RemoteItem, DriveError> {
        let mut state = self.state.lock().unwrap();
        state.updates.push((id.to_string(), update.clone()));
        if let Some(err) = Self::take_failure(&mut state, &format!("update:{}", id)) {
            return Err(err);
        }
        let node = state.nodes.get_mut(id).ok_or_else(|| DriveError::Api {
            status: 404,
            message: format!("File not found: {}", id),
        })?;
        if let Some(name) = &update.name {
            node.name = name.clone();
        }
        if let Some(old) = &update.remove_parent {
            node.parents.retain(|p| p != old);
        }
        if let Some(new) = &update.add_parent {
            if !node.parents.contains(new) {
                node.parents.push(new.clone());
            }
        }
        if self.partial_updates {
            return Ok(RemoteItem {
                created_time: None,
                modified_time: None,
                size: None,
                ..node.clone()
            });
        }
        Ok(node.clone())
    }

    async fn download_text(
        &self,
        item: &RemoteItem,
        limit: usize,
    ) -> Result<Option<String>, DriveError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .contents
            .get(&item.id)
            .map(|text| text.chars().take(limit).collect()))
    }
}

/// Classifier that answers from a name → suggestion table and records calls
#[derive(Default)]
pub struct ScriptedClassifier {
    answers: Mutex<HashMap<String, Suggestion>>,
    described: Mutex<HashMap<String, Suggestion>>,
    failures: Mutex<HashMap<String, VecDeque<ClassifyError>>>,
    batch_calls: Mutex<Vec<Vec<String>>>,
    description_calls: Mutex<Vec<(String, String)>>,
    content_calls: Mutex<Vec<(String, String)>>,
    hints_seen: Mutex<Vec<Vec<String>>>,
    omitted: Mutex<HashSet<String>>,
    delay: Option<Duration>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, name: &str, suggestion: Suggestion) -> Self {
        self.answers.lock().unwrap().insert(name.to_string(), suggestion);
        self
    }

    /// Suggestion returned once the user describes (or content-analyzes) `name`
    pub fn on_description(self, name: &str, suggestion: Suggestion) -> Self {
        self.described.lock().unwrap().insert(name.to_string(), suggestion);
        self
    }

    /// Queue a failure for the next call about `name`; repeat to fail several calls
    pub fn fail_for(self, name: &str, err: ClassifyError) -> Self {
        self.failures
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .push_back(err);
        self
    }

    /// Leave `name` out of the next batch answer that includes it
    pub fn omit_once(self, name: &str) -> Self {
        self.omitted.lock().unwrap().insert(name.to_string());
        self
    }

    /// Make every batch call take `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn batch_calls(&self) -> Vec<Vec<String>> {
        self.batch_calls.lock().unwrap().clone()
    }

    pub fn description_calls(&self) -> Vec<(String, String)> {
        self.description_calls.lock().unwrap().clone()
    }

    pub fn content_calls(&self) -> Vec<(String, String)> {
        self.content_calls.lock().unwrap().clone()
    }

    pub fn hints_seen(&self) -> Vec<Vec<String>> {
        self.hints_seen.lock().unwrap().clone()
    }

    fn lookup(&self, name: &str, table: &Mutex<HashMap<String, Suggestion>>) -> Result<Suggestion, ClassifyError> {
        if let Some(err) = self.failures.lock().unwrap().get_mut(name).and_then(|q| q.pop_front()) {
            return Err(err);
        }
        Ok(table
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| Suggestion::fallback(name)))
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify_batch(
        &self,
        files: &[FileMetadata],
        existing_folders: &[String],
    ) -> Result<Vec<Suggestion>, ClassifyError> {
        self.batch_calls
            .lock()
            .unwrap()
            .push(files.iter().map(|f| f.name.clone()).collect());
        self.hints_seen.lock().unwrap().push(existing_folders.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        files
            .iter()
            .filter(|f| !self.omitted.lock().unwrap().remove(&f.name))
            .map(|f| self.lookup(&f.name, &self.answers))
            .collect()
    }

    async fn classify_with_content(
        &self,
        file: &FileMetadata,
        content: &str,
        _existing_folders: &[String],
    ) -> Result<Suggestion, ClassifyError> {
        self.content_calls
            .lock()
            .unwrap()
            .push((file.name.clone(), content.to_string()));
        self.lookup(&file.name, &self.described)
    }

    async fn classify_with_description(
        &self,
        file: &FileMetadata,
        description: &str,
        _existing_folders: &[String],
    ) -> Result<Suggestion, ClassifyError> {
        self.description_calls
            .lock()
            .unwrap()
            .push((file.name.clone(), description.to_string()));
        self.lookup(&file.name, &self.described)
    }
}

pub fn suggestion(folder: &str, name: &str, confidence: f64) -> Suggestion {
    Suggestion {
        filename: name.to_string(),
        suggested_folder: folder.to_string(),
        suggested_name: name.to_string(),
        reason: "test".to_string(),
        confidence,
        needs_content: false,
    }
}

pub fn root() -> &'static str {
    ROOT_ID
}
