use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::subtitle::strip_tags;

static BREAK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>").expect("break pattern is valid")
});

/// Reasons an oracle reply cannot be accepted; all are retried
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    #[error("reply is not a JSON array: {0}")]
    Unparseable(String),

    #[error("expected {expected} translations, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("element {index} is not a string")]
    ElementType { index: usize },

    #[error("translation {index} is empty")]
    EmptyTranslation { index: usize },
}

/// Remove a surrounding markdown code fence, if any
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    // Drop a language tag such as ```json
    let inner = match inner.find('\n') {
        Some(pos) if !inner[..pos].contains(['[', '{', '"']) => &inner[pos + 1..],
        _ => inner,
    };
    inner.trim()
}

fn decode_element(index: usize, value: Value, allow_nested_lines: bool) -> Result<String, ResponseError> {
    match value {
        Value::String(text) => Ok(text),
        Value::Array(lines) if allow_nested_lines => lines
            .into_iter()
            .map(|line| match line {
                Value::String(text) => Ok(text),
                _ => Err(ResponseError::ElementType { index }),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|lines| lines.join("\n")),
        _ => Err(ResponseError::ElementType { index }),
    }
}

/// Decode a reply into exactly `expected` translation strings.
///
/// The reply must be a top-level JSON array. Nested string arrays are joined
/// with newlines when `allow_nested_lines` is set; anything else is rejected.
pub fn decode_translations(raw: &str, expected: usize, allow_nested_lines: bool) -> Result<Vec<String>, ResponseError> {
    let body = strip_code_fences(raw);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ResponseError::Unparseable(e.to_string()))?;

    let Value::Array(elements) = value else {
        return Err(ResponseError::Unparseable("top-level value is not an array".to_string()));
    };

    if elements.len() != expected {
        return Err(ResponseError::CountMismatch {
            expected,
            actual: elements.len(),
        });
    }

    elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| decode_element(index, element, allow_nested_lines))
        .collect()
}

/// Normalize escape sequences, line breaks, markup and whitespace
pub fn normalize_translation(text: &str) -> String {
    let text = text.replace("\\n", "\n").replace("\\t", " ");
    let text = BREAK_REGEX.replace_all(&text, "\n");

    text.lines()
        .map(|line| strip_tags(line).split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
