use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{json, Value};

use crate::config::TranslateConfig;
use super::context::ContextWindow;

static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid")
});

/// Substitute `{name}` placeholders in one pass; unknown names are kept
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// JSON schema for a reply of exactly `count` translations
pub fn response_schema(count: usize, allow_nested_lines: bool) -> Value {
    let items = if allow_nested_lines {
        json!({
            "anyOf": [
                { "type": "string" },
                { "type": "array", "items": { "type": "string" } }
            ]
        })
    } else {
        json!({ "type": "string" })
    };

    json!({
        "type": "array",
        "items": items,
        "minItems": count,
        "maxItems": count
    })
}

/// Translation prompt with its semantic slots filled
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Fills prior pairs, batch sources and future sources into the templates
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_template: String,
    user_template: String,
    source_language: String,
    target_language: String,
}

impl PromptBuilder {
    pub fn new(config: &TranslateConfig) -> Self {
        Self {
            system_template: config.system_prompt.clone(),
            user_template: config.prompt_template.clone(),
            source_language: config.source_language.clone(),
            target_language: config.target_language.clone(),
        }
    }

    pub fn build(&self, window: &ContextWindow, batch_sources: &[String]) -> Prompt {
        let previous = window.render_previous();
        let future = window.render_future();
        let batch = serde_json::to_string_pretty(batch_sources).unwrap_or_else(|_| "[]".to_string());
        let count = batch_sources.len().to_string();

        let values = [
            ("source_language", self.source_language.as_str()),
            ("target_language", self.target_language.as_str()),
            ("previous", previous.as_str()),
            ("batch", batch.as_str()),
            ("future", future.as_str()),
            ("count", count.as_str()),
        ];

        Prompt {
            system: fill_template(&self.system_template, &values),
            user: fill_template(&self.user_template, &values),
        }
    }
}
