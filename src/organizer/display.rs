//! Text blocks shown during the decision loop

use crate::classifier::Suggestion;
use crate::drive::RemoteItem;

pub const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

pub const ACTION_PROMPT: &str =
    "\n   Action? (m)ove / (d)escribe / (a)nalyze content / (r)ename folder / (n)ame file / (c)reate folder / (p)ass / (q)uit: ";

/// Human-readable byte size; unknown or zero sizes show as `N/A`
pub fn format_size(size: Option<u64>) -> String {
    const UNIT: u64 = 1024;
    let bytes = match size {
        Some(b) if b > 0 => b,
        _ => return "N/A".to_string(),
    };
    if bytes < UNIT {
        return format!("{} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let unit = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", bytes as f64 / div as f64, unit)
}

pub fn legend() -> String {
    [
        "   For each file you can:",
        "   (m) Move to the suggested folder (renaming if suggested)",
        "   (d) Describe the file so the AI can re-analyze it",
        "   (a) Analyze the file content",
        "   (r) Change the destination folder",
        "   (n) Change the file name",
        "   (c) Create a custom folder",
        "   (p) Pass (skip) the file",
        "   (q) Quit",
    ]
    .join("\n")
}

pub fn file_header(index: usize, total: usize, item: &RemoteItem) -> String {
    let created = item
        .created_time
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "{}\n📄 [{}/{}] {}\n   Type: {} | Size: {} | Created: {}",
        RULE,
        index,
        total,
        item.name,
        item.mime_type,
        format_size(item.classification_size()),
        created
    )
}

pub fn suggestion_block(title: &str, original_name: &str, suggestion: &Suggestion) -> String {
    let mut lines = vec![
        format!("\n   🤖 {}:", title),
        format!("      Folder: {}", suggestion.suggested_folder),
    ];
    if suggestion.renames(original_name) {
        lines.push(format!("      Name: {} → {}", original_name, suggestion.suggested_name));
    }
    lines.push(format!("      Reason: {}", suggestion.reason));
    lines.push(format!("      Confidence: {:.0}%", suggestion.confidence * 100.0));
    if suggestion.needs_content {
        lines.push("      ⚠️  The AI suggests analyzing the content for a better result (a)".to_string());
    }
    lines.join("\n")
}
