//! Utility functions.
//!
//! Helpers for picking structured data out of free-form model output.

use serde_json::Value;

/// Find the first JSON object or array embedded in `text`.
///
/// Models often wrap JSON in prose or code fences. Candidates span from
/// the first opening bracket to the last matching closing bracket, one per
/// bracket kind; the earliest one that parses wins.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed)
        && (value.is_object() || value.is_array())
    {
        return Some(value);
    }

    let mut candidates: Vec<(usize, &str)> = [('{', '}'), ('[', ']')]
        .iter()
        .filter_map(|&(open, close)| {
            let start = trimmed.find(open)?;
            let end = trimmed.rfind(close)?;
            (end > start).then(|| (start, &trimmed[start..=end]))
        })
        .collect();
    candidates.sort_by_key(|(start, _)| *start);

    candidates
        .into_iter()
        .find_map(|(_, candidate)| serde_json::from_str(candidate).ok())
}

/// Keep at most `max` whitespace-separated words.
pub fn truncate_words(text: &str, max: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max {
        return text.to_string();
    }
    words[..max].join(" ")
}

/// Collect the string entries of a JSON array, dropping anything else.
pub fn string_items(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    )
}
