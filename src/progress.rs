use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

use crate::organizer::StageProgress;

/// Backup progress bar on the terminal
pub struct CliProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgress {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl StageProgress for CliProgress {
    fn start(&self, total: u64) {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::with_template(
            "   {spinner:.cyan} Backup [{bar:40.cyan/dim}] {pos}/{len} {msg}",
        )
        .map(|s| s.progress_chars("█░░").tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));

        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn advance(&self, item: &str, moved: bool) {
        self.with_bar(|pb| {
            if !moved {
                pb.println(format!("   ❌ Could not move '{}'", item));
            }
            pb.set_message(item.to_string());
            pb.inc(1);
        });
    }

    fn finish(&self, moved: usize, failed: usize) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
        eprintln!(
            "  \x1b[32m✓\x1b[0m Backup complete: {} moved, {} failed",
            moved, failed
        );
    }
}
