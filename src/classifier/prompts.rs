//! Prompts for the classification model

use std::fmt::Write;

use super::{truncate_context, FileMetadata};

/// System instruction; `language` is the language folder names are written in
pub fn system_prompt(language: &str) -> String {
    format!(
        r#"You are a file organization assistant. Your task is to analyze files and suggest the best folder and name to organize them.

Rules:
1. Analyze the file's name, type and metadata
2. Suggest an existing folder when it makes sense, or suggest creating a new one
3. Write folder names in {language}, clear and concise
4. Common categories: Documents, Photos, Videos, Music, Projects, Work, Studies, Finance, Personal, Settings, Backups (translated to {language})
5. Be specific when possible (e.g. "Work/Reports" rather than just "Work")
6. Suggest a better name when the file has a generic one (e.g. "document.pdf", "IMG_1234.jpg", "Untitled.docx")
7. Keep the original name if it is already descriptive
8. If you are unsure, set needs_content to true and use a low confidence
9. Always return a valid JSON array

ALWAYS answer with a JSON array of objects containing:
- filename: original file name
- suggested_folder: suggested folder (may be nested with /)
- suggested_name: suggested name (same as the original if it is already good)
- reason: short reason for the suggestion
- confidence: 0.0 to 1.0
- needs_content: true if the content is needed for a better classification"#
    )
}

fn write_folders(out: &mut String, heading: &str, existing_folders: &[String]) {
    if existing_folders.is_empty() {
        return;
    }
    let _ = writeln!(out, "{}", heading);
    for folder in existing_folders {
        let _ = writeln!(out, "- {}", folder);
    }
    out.push('\n');
}

fn size_label(size: Option<u64>) -> String {
    size.map(|s| format!("{} bytes", s)).unwrap_or_else(|| "unknown".to_string())
}

fn write_file_header(out: &mut String, file: &FileMetadata) {
    let _ = writeln!(out, "File: {}", file.name);
    let _ = writeln!(out, "Type: {}", file.mime_type);
    let _ = writeln!(out, "Size: {}\n", size_label(file.size));
}

pub fn batch_prompt(files: &[FileMetadata], existing_folders: &[String]) -> String {
    let mut out = String::from("Classify the following files and suggest the best folder for each one.\n\n");
    write_folders(
        &mut out,
        "Existing folders (prefer these when they fit):",
        existing_folders,
    );

    out.push_str("Files to classify:\n");
    for (i, file) in files.iter().enumerate() {
        let created = file
            .created_time
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());
        let _ = writeln!(
            out,
            "{}. Name: {} | Type: {} | Size: {} | Created: {}",
            i + 1,
            file.name,
            file.mime_type,
            size_label(file.size),
            created
        );
    }

    out.push_str("\nReturn a JSON array with the classification of each file.");
    out
}

pub fn content_prompt(file: &FileMetadata, content: &str, existing_folders: &[String]) -> String {
    let mut out = String::from("Classify the following file based on its name, metadata AND content.\n\n");
    write_folders(&mut out, "Existing folders:", existing_folders);
    write_file_header(&mut out, file);
    let _ = writeln!(out, "Content (first characters):\n---\n{}\n---", truncate_context(content));
    out.push_str("\nReturn a JSON array with the classification.");
    out
}

pub fn description_prompt(file: &FileMetadata, description: &str, existing_folders: &[String]) -> String {
    let mut out = String::from("Classify the following file based on its name, metadata AND the user's description.\n\n");
    write_folders(&mut out, "Existing folders:", existing_folders);
    write_file_header(&mut out, file);
    let _ = writeln!(out, "User description:\n---\n{}\n---\n", truncate_context(description));
    out.push_str("Based on this description, suggest the best folder and name for the file.\n");
    out.push_str("\nReturn a JSON array with the classification.");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::MAX_CONTEXT_CHARS;

    fn file(name: &str) -> FileMetadata {
        FileMetadata {
            name: name.to_string(),
            mime_type: "application/pdf".to_string(),
            size: Some(2048),
            created_time: None,
            modified_time: None,
        }
    }

    #[test]
    fn test_batch_prompt_numbers_files_and_lists_hints() {
        let prompt = batch_prompt(&[file("a.pdf"), file("b.pdf")], &["Financeiro".to_string()]);
        assert!(prompt.contains("1. Name: a.pdf | Type: application/pdf | Size: 2048 bytes"));
        assert!(prompt.contains("2. Name: b.pdf"));
        assert!(prompt.contains("- Financeiro"));
    }

    #[test]
    fn test_no_hint_section_without_folders() {
        let prompt = batch_prompt(&[file("a.pdf")], &[]);
        assert!(!prompt.contains("Existing folders"));
    }

    #[test]
    fn test_content_is_truncated() {
        let content = "x".repeat(MAX_CONTEXT_CHARS * 2);
        let prompt = content_prompt(&file("a.pdf"), &content, &[]);
        assert!(prompt.contains("... [truncated]"));
        assert!(prompt.len() < MAX_CONTEXT_CHARS * 2);
    }

    #[test]
    fn test_description_prompt_includes_description() {
        let prompt = description_prompt(&file("scan.pdf"), "monthly sales report", &[]);
        assert!(prompt.contains("monthly sales report"));
        assert!(prompt.contains("File: scan.pdf"));
    }

    #[test]
    fn test_system_prompt_language() {
        assert!(system_prompt("Portuguese").contains("folder names in Portuguese"));
    }
}
