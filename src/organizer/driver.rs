//! Reorganization driver
//!
//! Sequences one run: stage the backup, seed the folder hints, then for each
//! file get (or batch-fetch) a suggestion, run the decision loop and apply
//! the outcome. Files are handled strictly one at a time.

use std::fmt;
use std::future::Future;

use super::backup::{BackupStager, SilentProgress, StageMode, StageProgress};
use super::decision::{
    step, DecisionContext, DecisionOutcome, DecisionState, Effect, Event, Reclassify, SkipReason, TextPrompt,
};
use super::display;
use super::hints::FolderHintSet;
use super::prompt::Prompter;
use crate::cancel::CancelFlag;
use crate::classifier::{cache_key, ClassificationCache, Classifier, FileMetadata, Suggestion, MAX_CONTEXT_CHARS};
use crate::console::Input;
use crate::drive::folder::{path_segments, FolderResolver};
use crate::drive::lister::Lister;
use crate::drive::mover::Mover;
use crate::drive::{is_text_like, RemoteItem, RemoteStore, RetryPolicy, ROOT_ID};
use crate::error::{AppError, ClassifyError, DriveError};

/// Immutable settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizeOptions {
    /// Slash-delimited backup folder path under the root
    pub backup_path: String,
    pub resume: bool,
    pub dry_run: bool,
    /// Files classified per AI call on a cache miss
    pub batch_size: usize,
}

impl Default for OrganizeOptions {
    fn default() -> Self {
        Self {
            backup_path: "backup".to_string(),
            resume: false,
            dry_run: false,
            batch_size: 20,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Quit,
    Cancelled,
    BudgetExhausted,
    NothingToDo,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Quit => "stopped by user",
            Self::Cancelled => "cancelled early",
            Self::BudgetExhausted => "stopped, AI budget exhausted",
            Self::NothingToDo => "nothing to organize",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub organized: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Files in the work queue
    pub total: usize,
    /// Root items moved into the backup this run
    pub backed_up: usize,
    pub outcome: RunOutcome,
}

impl RunSummary {
    fn new(total: usize, backed_up: usize) -> Self {
        Self {
            organized: 0,
            skipped: 0,
            failed: 0,
            total,
            backed_up,
            outcome: RunOutcome::Completed,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            RunOutcome::Completed => writeln!(f, "🎉 Organization complete!")?,
            RunOutcome::NothingToDo => return write!(f, "✅ Nothing to organize!"),
            RunOutcome::Cancelled => {
                writeln!(f, "⚠️  {} organized, cancelled early.", self.organized)?
            }
            other => writeln!(f, "Organization {}.", other)?,
        }
        writeln!(f, "   ✅ Organized: {}", self.organized)?;
        writeln!(f, "   ⏭️  Skipped: {}", self.skipped)?;
        writeln!(f, "   ❌ Failed: {}", self.failed)?;
        write!(f, "   📁 Total: {}", self.total)
    }
}

/// What the decision loop produced for one file
enum Decision {
    Outcome(DecisionOutcome),
    Cancelled,
}

pub struct Reorganizer<'a> {
    store: &'a dyn RemoteStore,
    classifier: &'a dyn Classifier,
    prompter: &'a dyn Prompter,
    progress: &'a dyn StageProgress,
    options: OrganizeOptions,
    policy: RetryPolicy,
    cancel: CancelFlag,
    cache: ClassificationCache,
}

impl<'a> Reorganizer<'a> {
    pub fn new(
        store: &'a dyn RemoteStore,
        classifier: &'a dyn Classifier,
        prompter: &'a dyn Prompter,
        options: OrganizeOptions,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            store,
            classifier,
            prompter,
            progress: &SilentProgress,
            options,
            policy: RetryPolicy::default(),
            cancel,
            cache: ClassificationCache::new(),
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn StageProgress) -> Self {
        self.progress = progress;
        self
    }

    pub fn cache(&self) -> &ClassificationCache {
        &self.cache
    }

    /// Run the whole reorganization. Errors are setup failures (backup
    /// folder, root listing); everything per-file is counted.
    pub async fn run(&self) -> Result<RunSummary, AppError> {
        let opts = &self.options;
        let resolver = FolderResolver::new(self.store, self.policy, self.cancel.clone(), opts.dry_run);

        if opts.dry_run {
            self.prompter.show("🔍 DRY-RUN: no file will be moved\n");
        }

        let mode = if opts.resume {
            self.prompter
                .show("↩️  Resume mode: using the files in the backup folder. Root items will not be moved.");
            StageMode::Resume
        } else {
            StageMode::Fresh
        };

        self.prompter
            .show(&format!("📦 Preparing backup folder '{}'...", opts.backup_path));
        let staged = match BackupStager::new(self.store, self.policy, self.cancel.clone(), opts.dry_run)
            .with_progress(self.progress)
            .stage(&resolver, &opts.backup_path, mode)
            .await
        {
            Ok(staged) => staged,
            Err(e) if e.is_cancelled() => {
                let mut summary = RunSummary::new(0, 0);
                summary.outcome = RunOutcome::Cancelled;
                return Ok(summary);
            }
            Err(e) => return Err(e.into()),
        };

        for (item, error) in &staged.failed {
            self.prompter
                .show(&format!("   ❌ Could not back up '{}': {}", item.name, error));
        }
        for subtree in &staged.skipped_subtrees {
            self.prompter.show(&format!(
                "   ⚠️  Skipped folder '{}': {}",
                subtree.folder_name, subtree.error
            ));
        }

        let files: Vec<RemoteItem> = staged.work.into_iter().filter(|i| !i.is_folder()).collect();
        let mut summary = RunSummary::new(files.len(), staged.moved);
        if files.is_empty() {
            summary.outcome = RunOutcome::NothingToDo;
            return Ok(summary);
        }

        let mut hints = self.seed_hints().await;
        let mover = Mover::new(self.store, self.policy, self.cancel.clone(), opts.dry_run);

        self.prompter
            .show(&format!("\n🗂️  Organizing {} files...", files.len()));
        self.prompter.show(&display::legend());

        for (index, file) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.outcome = RunOutcome::Cancelled;
                break;
            }

            self.prompter
                .show(&display::file_header(index + 1, files.len(), file));

            let outcome = match self.suggestion_for(&files[index..], &hints).await {
                Ok(suggestion) => match self.decide(file, suggestion, &hints).await {
                    Decision::Outcome(outcome) => outcome,
                    Decision::Cancelled => {
                        summary.outcome = RunOutcome::Cancelled;
                        break;
                    }
                },
                Err(ClassifyError::BudgetExceeded { spent, limit }) => {
                    tracing::warn!(spent, limit, "AI budget exhausted, stopping");
                    self.prompter.show(&format!(
                        "   💸 AI budget exhausted (${:.4} of ${:.2}), stopping.",
                        spent, limit
                    ));
                    summary.outcome = RunOutcome::BudgetExhausted;
                    break;
                }
                Err(ClassifyError::Cancelled) => {
                    summary.outcome = RunOutcome::Cancelled;
                    break;
                }
                Err(e) => {
                    tracing::error!(file = %file.name, error = %e, "Classification failed");
                    self.prompter.show(&format!("   ❌ Could not classify: {}", e));
                    DecisionOutcome::Skip(SkipReason::ClassificationFailed)
                }
            };

            match outcome {
                DecisionOutcome::Move { folder, name } => {
                    match self.apply(&resolver, &mover, file, &folder, &name).await {
                        Ok(path) => {
                            summary.organized += 1;
                            if hints.insert(&path) {
                                tracing::debug!(folder = %path, "Folder added to hints");
                            }
                        }
                        Err(e) if e.is_cancelled() => {
                            summary.outcome = RunOutcome::Cancelled;
                            break;
                        }
                        Err(e) => {
                            tracing::error!(file = %file.name, folder = %folder, error = %e, "Failed to apply decision");
                            self.prompter.show(&format!("   ❌ {}", e));
                            summary.failed += 1;
                        }
                    }
                }
                DecisionOutcome::Skip(reason) => {
                    tracing::info!(file = %file.name, reason = ?reason, "File skipped");
                    self.prompter.show("   ⏭️  Skipped");
                    summary.skipped += 1;
                }
                DecisionOutcome::Quit => {
                    summary.outcome = RunOutcome::Quit;
                    break;
                }
            }
        }

        tracing::info!(
            organized = summary.organized,
            skipped = summary.skipped,
            failed = summary.failed,
            total = summary.total,
            outcome = %summary.outcome,
            "Run finished"
        );
        Ok(summary)
    }

    /// Top-level folder names, minus the backup folder. A listing failure
    /// only costs the hints.
    async fn seed_hints(&self) -> FolderHintSet {
        let backup_root = path_segments(&self.options.backup_path)
            .first()
            .map(|s| s.to_string())
            .unwrap_or_default();
        let lister = Lister::new(self.store, self.policy, self.cancel.clone());

        match lister.list_subfolders(ROOT_ID).await {
            Ok(folders) => {
                let hints = FolderHintSet::from_names(
                    folders
                        .iter()
                        .map(|f| f.name.as_str())
                        .filter(|name| *name != backup_root),
                );
                if !hints.is_empty() {
                    self.prompter
                        .show(&format!("   Existing folders known to the AI: {}", hints.len()));
                    tracing::info!(count = hints.len(), folders = ?hints.to_vec(), "Existing folders loaded");
                }
                hints
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list existing folders");
                FolderHintSet::new()
            }
        }
    }

    /// Suggestion for `pending[0]`, from the cache or from the AI. On a miss
    /// the next `batch_size` uncached files are classified in one call.
    async fn suggestion_for(&self, pending: &[RemoteItem], hints: &FolderHintSet) -> Result<Suggestion, ClassifyError> {
        let file = &pending[0];
        let key = cache_key(&file.name, &file.mime_type);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(file = %file.name, "Classification cache hit");
            return Ok(cached);
        }

        let folders = hints.to_vec();
        let mut batch: Vec<(String, FileMetadata)> = Vec::new();
        for item in pending {
            if batch.len() >= self.options.batch_size.max(1) {
                break;
            }
            let item_key = cache_key(&item.name, &item.mime_type);
            if self.cache.contains(&item_key) || batch.iter().any(|(k, _)| *k == item_key) {
                continue;
            }
            batch.push((item_key, FileMetadata::from(item)));
        }

        let metas: Vec<FileMetadata> = batch.iter().map(|(_, m)| m.clone()).collect();
        match self.until_cancelled(self.classifier.classify_batch(&metas, &folders)).await {
            Ok(suggestions) => {
                tracing::info!(files = metas.len(), returned = suggestions.len(), "Batch classified");
                // Position only identifies a file when the answer covers the whole batch
                let positional = suggestions.len() == batch.len();
                for (position, (item_key, meta)) in batch.iter().enumerate() {
                    let found = suggestions
                        .iter()
                        .find(|s| s.filename == meta.name)
                        .or_else(|| positional.then(|| suggestions.get(position)).flatten());
                    if let Some(s) = found {
                        self.cache.set(item_key, s.clone().normalized());
                    }
                }
            }
            Err(e @ (ClassifyError::BudgetExceeded { .. } | ClassifyError::Cancelled)) => return Err(e),
            Err(e) => {
                tracing::warn!(files = metas.len(), error = %e, "Batch classification failed, classifying individually");
            }
        }

        if let Some(suggestion) = self.cache.get(&key) {
            return Ok(suggestion);
        }

        let suggestion = self
            .until_cancelled(self.classifier.classify_single(&FileMetadata::from(file), &folders))
            .await?
            .normalized();
        self.cache.set(&key, suggestion.clone());
        Ok(suggestion)
    }

    /// Await an AI call, giving up as soon as the run is cancelled
    async fn until_cancelled<T>(
        &self,
        call: impl Future<Output = Result<T, ClassifyError>>,
    ) -> Result<T, ClassifyError> {
        tokio::select! {
            result = call => result,
            _ = self.cancel.cancelled() => Err(ClassifyError::Cancelled),
        }
    }

    /// Drive the decision state machine for one file through the prompter
    async fn decide(
        &self,
        file: &RemoteItem,
        mut suggestion: Suggestion,
        hints: &FolderHintSet,
    ) -> Decision {
        let key = cache_key(&file.name, &file.mime_type);
        self.prompter
            .show(&display::suggestion_block("AI suggestion", &file.name, &suggestion));

        let mut state = DecisionState::Presenting;
        let mut prompt = display::ACTION_PROMPT.to_string();

        loop {
            // An unreadable terminal ends the run like end of input
            let input = self.prompter.ask(&prompt).await.unwrap_or_else(|e| {
                tracing::warn!(file = %file.name, error = %e, "Could not read input, stopping");
                Input::Eof
            });
            let event = match &input {
                Input::Line(line) => Event::Line(line),
                Input::Eof => Event::Eof,
                Input::Cancelled => return Decision::Cancelled,
            };

            let ctx = DecisionContext {
                original_name: &file.name,
                suggestion: &suggestion,
            };
            let (next, effect) = step(&state, ctx, event);
            state = next;

            match effect {
                Effect::Finish(outcome) => {
                    if let DecisionOutcome::Skip(reason) = &outcome {
                        tracing::debug!(file = %file.name, reason = ?reason, "Decision: skip");
                    }
                    return Decision::Outcome(outcome);
                }
                Effect::AskAction { notice } => {
                    if let Some(notice) = notice {
                        self.prompter.show(&format!("   {}", notice));
                    }
                    prompt = display::ACTION_PROMPT.to_string();
                }
                Effect::AskText(text) => {
                    prompt = text_prompt(&text);
                }
                Effect::Reclassify(request) => {
                    match self.reclassify(file, request, hints).await {
                        Ok(Some(updated)) => {
                            self.cache.set(&key, updated.clone());
                            self.prompter
                                .show(&display::suggestion_block("New suggestion", &file.name, &updated));
                            suggestion = updated;
                        }
                        Ok(None) => {}
                        Err(ClassifyError::Cancelled) => return Decision::Cancelled,
                        Err(e) => {
                            tracing::error!(file = %file.name, error = %e, "Re-classification failed");
                            self.prompter.show(&format!(
                                "   ❌ Re-classification failed: {}\n   Keeping the current suggestion.",
                                e
                            ));
                        }
                    }
                    prompt = display::ACTION_PROMPT.to_string();
                }
            }
        }
    }

    /// New suggestion with extra context, or `None` when there was no
    /// usable content to send
    async fn reclassify(
        &self,
        file: &RemoteItem,
        request: Reclassify,
        hints: &FolderHintSet,
    ) -> Result<Option<Suggestion>, ClassifyError> {
        let meta = FileMetadata::from(file);
        let folders = hints.to_vec();

        match request {
            Reclassify::Description(description) => {
                self.prompter.show("   🤖 Re-analyzing with your description...");
                let suggestion = self
                    .until_cancelled(self.classifier.classify_with_description(&meta, &description, &folders))
                    .await?;
                Ok(Some(suggestion.normalized()))
            }
            Reclassify::Content => {
                let Some(content) = self.file_text(file).await? else {
                    return Ok(None);
                };
                self.prompter.show("   🤖 Re-analyzing with the file content...");
                let suggestion = self
                    .until_cancelled(self.classifier.classify_with_content(&meta, &content, &folders))
                    .await?;
                Ok(Some(suggestion.normalized()))
            }
        }
    }

    /// Up to `MAX_CONTEXT_CHARS` of the file's text, or `None` (with a
    /// notice) when it has none
    async fn file_text(&self, file: &RemoteItem) -> Result<Option<String>, ClassifyError> {
        if !is_text_like(&file.mime_type) {
            self.prompter
                .show("   Content analysis is only available for text documents.");
            return Ok(None);
        }

        let downloaded = self
            .policy
            .run(&self.cancel, &file.id, || self.store.download_text(file, MAX_CONTEXT_CHARS))
            .await;

        match downloaded {
            Ok(Some(text)) if !text.trim().is_empty() => Ok(Some(text)),
            Ok(_) => {
                self.prompter.show("   The file has no readable text.");
                Ok(None)
            }
            Err(e) if e.is_cancelled() => Err(ClassifyError::Cancelled),
            Err(e) => {
                tracing::error!(file = %file.name, error = %e, "Failed to download content");
                self.prompter
                    .show(&format!("   ❌ Could not read the file content: {}", e));
                Ok(None)
            }
        }
    }

    /// Resolve `folder` and move (renaming if needed) `file` into it.
    /// Returns the normalized folder path.
    async fn apply(
        &self,
        resolver: &FolderResolver<'_>,
        mover: &Mover<'_>,
        file: &RemoteItem,
        folder: &str,
        name: &str,
    ) -> Result<String, DriveError> {
        let target = resolver.find_or_create_path(folder, ROOT_ID).await?;
        mover.move_and_rename(file, &target.id, name).await?;

        if name != file.name {
            self.prompter.show(&format!("   ✅ Renamed to: {}", name));
        }
        self.prompter.show(&format!("   ✅ Moved to: {}", target.path));
        Ok(target.path)
    }
}

fn text_prompt(prompt: &TextPrompt) -> String {
    match prompt {
        TextPrompt::Description => "   Describe the file (e.g. monthly sales report): ".to_string(),
        TextPrompt::FolderPath { default } => format!("   New folder name [{}]: ", default),
        TextPrompt::FileName { default } => format!("   New file name [{}]: ", default),
        TextPrompt::NewFolder => "   Name of the new folder: ".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organizer::prompt::ScriptedPrompter;
    use std::time::Duration;
    use crate::testing::{root, suggestion, MemoryStore, ScriptedClassifier};

    fn options() -> OrganizeOptions {
        OrganizeOptions::default()
    }

    async fn run(
        store: &MemoryStore,
        classifier: &ScriptedClassifier,
        prompter: &ScriptedPrompter,
        options: OrganizeOptions,
    ) -> RunSummary {
        Reorganizer::new(store, classifier, prompter, options, CancelFlag::new())
            .run()
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_moves_file_into_suggested_folder() {
        let store = MemoryStore::new();
        let file = store.add_file("relatorio.pdf", "application/pdf", root());
        let classifier = ScriptedClassifier::new()
            .answer("relatorio.pdf", suggestion("Trabalho/Relatórios", "relatorio.pdf", 0.95));
        let prompter = ScriptedPrompter::new(&["m"]);

        let summary = run(&store, &classifier, &prompter, options()).await;

        assert_eq!(summary.organized, 1);
        assert_eq!(summary.total, 1);
        assert_eq!(summary.backed_up, 1);
        assert_eq!(summary.outcome, RunOutcome::Completed);

        let moved = store.item(&file);
        assert_eq!(moved.parents.len(), 1);
        let folder = store.item(&moved.parents[0]);
        assert_eq!(folder.name, "Relatórios");
        assert_eq!(store.item(&folder.parents[0]).name, "Trabalho");
        assert_eq!(store.child_names(root()), vec!["Trabalho", "backup"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_uses_backup_files_without_root_moves() {
        let store = MemoryStore::new();
        let backup = store.add_folder("backup", root());
        for name in ["1.txt", "2.txt", "3.txt"] {
            store.add_file(name, "text/plain", &backup);
        }
        let classifier = ScriptedClassifier::new();
        let prompter = ScriptedPrompter::new(&["p", "p", "p"]);
        let mut opts = options();
        opts.resume = true;

        let summary = run(&store, &classifier, &prompter, opts).await;

        assert_eq!(summary.total, 3);
        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.backed_up, 0);
        assert!(store.updates().is_empty());
        assert_eq!(classifier.batch_calls(), vec![vec!["1.txt", "2.txt", "3.txt"]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_prefetch_fills_cache() {
        let store = MemoryStore::new();
        let backup = store.add_folder("backup", root());
        for name in ["a.txt", "b.txt", "c.txt"] {
            store.add_file(name, "text/plain", &backup);
        }
        let classifier = ScriptedClassifier::new();
        let prompter = ScriptedPrompter::new(&["p", "p", "p"]);
        let mut opts = options();
        opts.batch_size = 2;

        let reorganizer = Reorganizer::new(&store, &classifier, &prompter, opts, CancelFlag::new());
        reorganizer.run().await.unwrap();

        assert_eq!(
            classifier.batch_calls(),
            vec![vec!["a.txt", "b.txt"], vec!["c.txt"]]
        );
        assert_eq!(reorganizer.cache().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_classified_once() {
        let store = MemoryStore::new();
        let backup = store.add_folder("backup", root());
        let old = store.add_folder("old", &backup);
        store.add_file("scan.pdf", "application/pdf", &backup);
        store.add_file("scan.pdf", "application/pdf", &old);
        let classifier = ScriptedClassifier::new();
        let prompter = ScriptedPrompter::new(&["p", "p"]);

        run(&store, &classifier, &prompter, options()).await;

        assert_eq!(classifier.batch_calls(), vec![vec!["scan.pdf"]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_folder_and_hints_grow() {
        let store = MemoryStore::new();
        store.add_folder("Fotos", root());
        let backup = store.add_folder("backup", root());
        store.add_file("a.pdf", "application/pdf", &backup);
        store.add_file("b.pdf", "application/pdf", &backup);
        let classifier = ScriptedClassifier::new();
        let prompter = ScriptedPrompter::new(&["c", "Financeiro/2024", "p"]);
        let mut opts = options();
        opts.batch_size = 1;
        opts.resume = true;

        let summary = run(&store, &classifier, &prompter, opts).await;

        assert_eq!(summary.organized, 1);
        assert_eq!(summary.skipped, 1);
        let hints = classifier.hints_seen();
        assert_eq!(hints[0], vec!["Fotos"]);
        assert_eq!(hints[1], vec!["Financeiro/2024", "Fotos"]);
        assert_eq!(store.folder_count("Financeiro", root()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_folder_empty_input_skips() {
        let store = MemoryStore::new();
        let backup = store.add_folder("backup", root());
        let file = store.add_file("a.pdf", "application/pdf", &backup);
        let classifier = ScriptedClassifier::new();
        let prompter = ScriptedPrompter::new(&["c", ""]);
        let mut opts = options();
        opts.resume = true;

        let summary = run(&store, &classifier, &prompter, opts).await;

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.organized, 0);
        assert_eq!(store.item(&file).parents, vec![backup]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rename_moves_and_renames_in_one_call() {
        let store = MemoryStore::new();
        let backup = store.add_folder("backup", root());
        let file = store.add_file("scan001.pdf", "application/pdf", &backup);
        let mut s = suggestion("Documentos", "scan001.pdf", 0.6);
        s.suggested_name = "contrato.pdf".into();
        let classifier = ScriptedClassifier::new().answer("scan001.pdf", s);
        let prompter = ScriptedPrompter::new(&["m"]);
        let mut opts = options();
        opts.resume = true;

        run(&store, &classifier, &prompter, opts).await;

        let moved = store.item(&file);
        assert_eq!(moved.name, "contrato.pdf");
        assert_eq!(store.item(&moved.parents[0]).name, "Documentos");
        // Remove-parent half points at the backup folder
        let (_, update) = store.updates().pop().unwrap();
        assert_eq!(update.remove_parent, Some(backup));
        assert_eq!(update.name.as_deref(), Some("contrato.pdf"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_describe_replaces_cached_suggestion() {
        let store = MemoryStore::new();
        let backup = store.add_folder("backup", root());
        let file = store.add_file("doc.pdf", "application/pdf", &backup);
        let classifier = ScriptedClassifier::new()
            .answer("doc.pdf", suggestion("Outros", "doc.pdf", 0.2))
            .on_description("doc.pdf", suggestion("Trabalho/Vendas", "doc.pdf", 0.9));
        let prompter = ScriptedPrompter::new(&["d", "monthly sales report", "m"]);
        let mut opts = options();
        opts.resume = true;

        let reorganizer = Reorganizer::new(&store, &classifier, &prompter, opts, CancelFlag::new());
        let summary = reorganizer.run().await.unwrap();

        assert_eq!(summary.organized, 1);
        assert_eq!(
            classifier.description_calls(),
            vec![("doc.pdf".to_string(), "monthly sales report".to_string())]
        );
        let cached = reorganizer.cache().get(&cache_key("doc.pdf", "application/pdf")).unwrap();
        assert_eq!(cached.suggested_folder, "Trabalho/Vendas");
        assert_eq!(store.item(&store.item(&file).parents[0]).name, "Vendas");
        assert!(prompter.output().contains("New suggestion"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_analyze_sends_file_content() {
        let store = MemoryStore::new();
        let backup = store.add_folder("backup", root());
        let file = store.add_file("notes.txt", "text/plain", &backup);
        store.set_content(&file, "Invoice 2024-03 for ACME");
        let classifier = ScriptedClassifier::new()
            .on_description("notes.txt", suggestion("Financeiro/Faturas", "notes.txt", 0.9));
        let prompter = ScriptedPrompter::new(&["a", "m"]);
        let mut opts = options();
        opts.resume = true;

        let summary = run(&store, &classifier, &prompter, opts).await;

        assert_eq!(summary.organized, 1);
        assert_eq!(
            classifier.content_calls(),
            vec![("notes.txt".to_string(), "Invoice 2024-03 for ACME".to_string())]
        );
        assert_eq!(store.item(&store.item(&file).parents[0]).name, "Faturas");
    }

    #[tokio::test(start_paused = true)]
    async fn test_analyze_binary_file_reprompts() {
        let store = MemoryStore::new();
        let backup = store.add_folder("backup", root());
        store.add_file("photo.jpg", "image/jpeg", &backup);
        let classifier = ScriptedClassifier::new();
        let prompter = ScriptedPrompter::new(&["a", "p"]);
        let mut opts = options();
        opts.resume = true;

        let summary = run(&store, &classifier, &prompter, opts).await;

        assert_eq!(summary.skipped, 1);
        assert!(classifier.content_calls().is_empty());
        assert!(prompter.output().contains("only available for text documents"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_stops_run() {
        let store = MemoryStore::new();
        let backup = store.add_folder("backup", root());
        store.add_file("a.txt", "text/plain", &backup);
        store.add_file("b.txt", "text/plain", &backup);
        let classifier = ScriptedClassifier::new();
        let prompter = ScriptedPrompter::new(&["q", "m"]);
        let mut opts = options();
        opts.resume = true;

        let summary = run(&store, &classifier, &prompter, opts).await;

        assert_eq!(summary.outcome, RunOutcome::Quit);
        assert_eq!(summary.organized, 0);
        assert_eq!(prompter.remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_of_input_quits() {
        let store = MemoryStore::new();
        let backup = store.add_folder("backup", root());
        store.add_file("a.txt", "text/plain", &backup);
        let classifier = ScriptedClassifier::new();
        let prompter = ScriptedPrompter::new(&[]);
        let mut opts = options();
        opts.resume = true;

        let summary = run(&store, &classifier, &prompter, opts).await;

        assert_eq!(summary.outcome, RunOutcome::Quit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_classification_failure_skips_file() {
        let store = MemoryStore::new();
        let backup = store.add_folder("backup", root());
        store.add_file("a.txt", "text/plain", &backup);
        store.add_file("b.txt", "text/plain", &backup);
        let parse_error = || ClassifyError::Parse {
            message: "expected value".into(),
            response: "oops".into(),
        };
        // Batch and single call for a.txt both fail
        let classifier = ScriptedClassifier::new()
            .fail_for("a.txt", parse_error())
            .fail_for("a.txt", parse_error());
        let prompter = ScriptedPrompter::new(&["m"]);
        let mut opts = options();
        opts.resume = true;
        opts.batch_size = 1;

        let summary = run(&store, &classifier, &prompter, opts).await;

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.organized, 1);
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(classifier.batch_calls(), vec![vec!["a.txt"], vec!["a.txt"], vec!["b.txt"]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_file_missing_from_batch_answer_is_classified_alone() {
        let store = MemoryStore::new();
        let backup = store.add_folder("backup", root());
        let a = store.add_file("a.jpg", "image/jpeg", &backup);
        let b = store.add_file("b.pdf", "application/pdf", &backup);
        // The batch answer only covers b.pdf
        let classifier = ScriptedClassifier::new()
            .answer("a.jpg", suggestion("Fotos", "a.jpg", 0.9))
            .answer("b.pdf", suggestion("Documentos", "b.pdf", 0.9))
            .omit_once("a.jpg");
        let prompter = ScriptedPrompter::new(&["m", "m"]);
        let mut opts = options();
        opts.resume = true;

        let summary = run(&store, &classifier, &prompter, opts).await;

        assert_eq!(summary.organized, 2);
        assert_eq!(classifier.batch_calls(), vec![vec!["a.jpg", "b.pdf"], vec!["a.jpg"]]);
        assert_eq!(store.item(&store.item(&a).parents[0]).name, "Fotos");
        assert_eq!(store.item(&store.item(&b).parents[0]).name, "Documentos");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_pending_classification() {
        let store = MemoryStore::new();
        let backup = store.add_folder("backup", root());
        store.add_file("a.txt", "text/plain", &backup);
        let classifier = ScriptedClassifier::new().with_delay(Duration::from_secs(600));
        let prompter = ScriptedPrompter::new(&["m"]);
        let mut opts = options();
        opts.resume = true;
        let cancel = CancelFlag::new();

        let trip = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trip.cancel();
        });

        let started = tokio::time::Instant::now();
        let summary = Reorganizer::new(&store, &classifier, &prompter, opts, cancel)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.outcome, RunOutcome::Cancelled);
        assert_eq!(summary.organized, 0);
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(prompter.remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_input_ends_run_with_summary() {
        let store = MemoryStore::new();
        let backup = store.add_folder("backup", root());
        store.add_file("a.txt", "text/plain", &backup);
        let classifier = ScriptedClassifier::new();
        let prompter = ScriptedPrompter::unreadable();
        let mut opts = options();
        opts.resume = true;

        let summary = run(&store, &classifier, &prompter, opts).await;

        assert_eq!(summary.outcome, RunOutcome::Quit);
        assert!(store.updates().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhausted_ends_run() {
        let store = MemoryStore::new();
        let backup = store.add_folder("backup", root());
        store.add_file("a.txt", "text/plain", &backup);
        let classifier = ScriptedClassifier::new()
            .fail_for("a.txt", ClassifyError::BudgetExceeded { spent: 5.01, limit: 5.0 });
        let prompter = ScriptedPrompter::new(&[]);
        let mut opts = options();
        opts.resume = true;

        let summary = run(&store, &classifier, &prompter, opts).await;

        assert_eq!(summary.outcome, RunOutcome::BudgetExhausted);
        assert_eq!(summary.skipped, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_move_is_counted_and_run_continues() {
        let store = MemoryStore::new();
        let backup = store.add_folder("backup", root());
        let a = store.add_file("a.txt", "text/plain", &backup);
        store.add_file("b.txt", "text/plain", &backup);
        store.fail_next(&format!("update:{}", a), DriveError::Api { status: 404, message: "File not found".into() });
        let classifier = ScriptedClassifier::new();
        let prompter = ScriptedPrompter::new(&["m", "m"]);
        let mut opts = options();
        opts.resume = true;

        let summary = run(&store, &classifier, &prompter, opts).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.organized, 1);
        assert!(prompter.output().contains("a.txt"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_file() {
        let store = MemoryStore::new();
        let backup = store.add_folder("backup", root());
        store.add_file("a.txt", "text/plain", &backup);
        let classifier = ScriptedClassifier::new();
        let prompter = ScriptedPrompter::new(&["m"]);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let summary = Reorganizer::new(&store, &classifier, &prompter, options(), cancel)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.outcome, RunOutcome::Cancelled);
        assert!(store.updates().is_empty());
        assert!(classifier.batch_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_to_do() {
        let store = MemoryStore::new();
        store.add_folder("backup", root());
        let classifier = ScriptedClassifier::new();
        let prompter = ScriptedPrompter::new(&[]);

        let summary = run(&store, &classifier, &prompter, options()).await;

        assert_eq!(summary.outcome, RunOutcome::NothingToDo);
        assert_eq!(summary.to_string(), "✅ Nothing to organize!");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_changes_nothing() {
        let store = MemoryStore::new();
        let file = store.add_file("relatorio.pdf", "application/pdf", root());
        let classifier = ScriptedClassifier::new()
            .answer("relatorio.pdf", suggestion("Trabalho", "relatorio.pdf", 0.9));
        let prompter = ScriptedPrompter::new(&["m"]);
        let mut opts = options();
        opts.dry_run = true;

        let summary = run(&store, &classifier, &prompter, opts).await;

        assert_eq!(summary.organized, 1);
        assert_eq!(store.create_calls(), 0);
        assert!(store.updates().is_empty());
        assert_eq!(store.item(&file).parents, vec![root().to_string()]);
    }

    #[test]
    fn test_summary_report() {
        let summary = RunSummary {
            organized: 4,
            skipped: 2,
            failed: 1,
            total: 7,
            backed_up: 7,
            outcome: RunOutcome::Cancelled,
        };
        let report = summary.to_string();
        assert!(report.starts_with("⚠️  4 organized, cancelled early."));
        assert!(report.contains("Skipped: 2"));
        assert!(report.contains("Failed: 1"));
        assert!(report.contains("Total: 7"));
    }
}
