//! Tolerant parsing of the model's JSON answer
//!
//! The model is asked for a bare JSON array but sometimes wraps it in a
//! markdown fence or answers with a single object.

use super::Suggestion;
use crate::error::ClassifyError;

/// Extract a JSON object from text that might contain markdown or prose
pub fn extract_json_object(text: &str) -> Option<&str> {
    if let Some(block) = fenced_block(text) {
        if block.starts_with('{') {
            return Some(block);
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Extract a JSON array from text that might contain markdown or prose
pub fn extract_json_array(text: &str) -> Option<&str> {
    if let Some(block) = fenced_block(text) {
        if block.starts_with('[') {
            return Some(block);
        }
    }
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

/// Contents of the first ``` or ```json block
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// Parse suggestions: JSON array first, then a single object, else a parse error
pub fn parse_suggestions(text: &str) -> Result<Vec<Suggestion>, ClassifyError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ClassifyError::EmptyResponse);
    }

    let array_err = match serde_json::from_str::<Vec<Suggestion>>(trimmed) {
        Ok(list) => return Ok(normalize(list)),
        Err(e) => e,
    };

    if let Some(array) = extract_json_array(trimmed) {
        if let Ok(list) = serde_json::from_str::<Vec<Suggestion>>(array) {
            return Ok(normalize(list));
        }
    }

    if let Some(object) = extract_json_object(trimmed) {
        if let Ok(single) = serde_json::from_str::<Suggestion>(object) {
            return Ok(normalize(vec![single]));
        }
    }

    Err(ClassifyError::Parse {
        message: array_err.to_string(),
        response: trimmed.to_string(),
    })
}

fn normalize(list: Vec<Suggestion>) -> Vec<Suggestion> {
    list.into_iter().map(Suggestion::normalized).collect()
}
