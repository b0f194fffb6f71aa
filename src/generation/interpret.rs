//! Turning raw Generator output into field values.

use serde_json::Value;
use url::Url;

use super::{Field, FieldValue, GenerationError, OrientationHint};
use crate::utils::{extract_json, string_items, truncate_words};

/// Longest orientation message kept, in words.
pub const ORIENTATION_MAX_WORDS: usize = 80;

/// Interpret raw output for `field`.
pub fn interpret(field: Field, raw: &str) -> Result<FieldValue, GenerationError> {
    let malformed = |reason: &str| GenerationError::Malformed {
        field,
        reason: reason.to_string(),
    };

    match field {
        Field::Description => {
            let text = raw.trim();
            if text.is_empty() {
                return Err(malformed("empty description"));
            }
            Ok(FieldValue::Text(text.to_string()))
        }
        Field::Tools => parse_string_list(raw, "tools")
            .map(FieldValue::List)
            .ok_or_else(|| malformed("no tool list found")),
        Field::ColorizedImageUrl => first_url(raw)
            .map(FieldValue::Url)
            .ok_or_else(|| malformed("no image URL found")),
        Field::OrientationText => Ok(FieldValue::Orientation(normalize_orientation(raw))),
        Field::ImageUrl => Err(GenerationError::NotGeneratable(field)),
    }
}

/// Enforce the orientation contract on raw model output.
///
/// Malformed, non-JSON or non-object output is "no signal". A suppressed
/// popup never carries a message, and messages are capped in length.
pub fn normalize_orientation(raw: &str) -> OrientationHint {
    let Ok(Value::Object(result)) = serde_json::from_str::<Value>(raw.trim()) else {
        return OrientationHint::safe_default();
    };

    let show_popup = result
        .get("show_popup")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !show_popup {
        return OrientationHint::safe_default();
    }

    let message = result
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default();

    OrientationHint {
        show_popup,
        message: truncate_words(message, ORIENTATION_MAX_WORDS),
    }
}

/// Items of `{"<key>": [...]}` or of a bare array, wherever they sit in `raw`.
pub fn parse_string_list(raw: &str, key: &str) -> Option<Vec<String>> {
    let value = extract_json(raw)?;
    match &value {
        Value::Array(_) => string_items(&value),
        Value::Object(map) => map.get(key).and_then(string_items),
        _ => None,
    }
}

fn first_url(raw: &str) -> Option<String> {
    raw.split_whitespace()
        .map(|token| token.trim_matches(|c| matches!(c, '"' | '\'' | '[' | ']' | ',')))
        .find_map(|token| {
            Url::parse(token)
                .ok()
                .filter(|url| matches!(url.scheme(), "http" | "https"))
        })
        .map(String::from)
}
