use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BisubError, Result};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional subtitle translator. \
Your task is to translate {source_language} subtitles to {target_language}.\n\
Provide natural-sounding translations that fit the provided context.";

const DEFAULT_PROMPT_TEMPLATE: &str = "Instructions:
- Keep the translation consistent with the previously translated subtitles.
- Do NOT translate word by word; translate in the context of previous translations and use the future subtitles to anticipate upcoming content.
- Translate idioms and colloquialisms naturally.
- Keep names, titles and honorifics untranslated.
- Lines starting with \"- \" are spoken by different speakers: keep one \"- \" line per speaker.
- Do not indicate inability to translate; always provide the best possible translation.

Previous subtitles [with the {target_language} translation in square brackets]:
{previous}

Current subtitles (JSON array of {count} strings):
{batch}

Future subtitles:
{future}

Respond ONLY with a JSON array of exactly {count} strings, holding the {target_language} translation of each current subtitle in the same order.";

const DEFAULT_REEVALUATE_SYSTEM_PROMPT: &str = "You improve the {target_language} translation of an already translated SRT subtitle file.

Every cue has this layout:
id
timestamp-from --> timestamp-to
{source_language} subtitle
{prefix}already translated {target_language} subtitle{suffix}

Only correct a translation if the context of the whole file was ignored, or if it is incomplete, ungrammatical, hard to understand or wrong. Keep \"<br>\" line breaks.

Respond ONLY with JSON, without markdown, in this structure:
{\"status\": true, \"updatedTranslations\": [{\"id\": 1, \"t\": \"improved translation without the surrounding markup\"}]}
Use \"status\": false and an empty \"updatedTranslations\" list when nothing had to be corrected.";

const DEFAULT_REEVALUATE_PROMPT_TEMPLATE: &str = "This is the SRT file to examine:\n{file}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub oracle: OracleConfig,
    pub translate: TranslateConfig,
    pub markup: MarkupConfig,
    pub reformat: ReformatConfig,
    pub reevaluate: ReevaluateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Ollama endpoint URL
    pub endpoint: String,
    /// Request timeout in seconds; a full streamed reply must arrive within it
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    pub source_language: String,
    pub target_language: String,
    /// Primary model used for translation
    pub model: String,
    pub temperature: f32,
    /// Higher quality model used once the primary model keeps failing validation
    pub fallback_model: Option<String>,
    pub fallback_temperature: f32,
    /// Number of cues submitted per oracle request
    pub batch_length: usize,
    /// Number of previous and of future cues given as context
    pub context_count: usize,
    /// Attempts per model before escalating
    pub max_attempts: u32,
    pub context_strategy: ContextStrategyKind,
    /// Accept nested string arrays as one multi-line translation
    pub allow_nested_lines: bool,
    pub context_length: Option<u32>,
    pub max_tokens: Option<i32>,
    pub system_prompt: String,
    pub prompt_template: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextStrategyKind {
    /// Derive the previous context from the track for every batch
    Window,
    /// Keep a bounded transcript of recorded pairs
    Transcript,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupConfig {
    /// Placed before a translation; its presence marks a cue as translated
    pub prefix: String,
    pub suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReformatConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReevaluateConfig {
    pub enabled: bool,
    pub model: String,
    pub temperature: f32,
    /// Must be large enough for the whole file to fit
    pub context_length: u32,
    pub max_attempts: u32,
    pub system_prompt: String,
    pub prompt_template: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            timeout_secs: 600,
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            source_language: "English".to_string(),
            target_language: "German".to_string(),
            model: "gemma2".to_string(),
            temperature: 0.0,
            fallback_model: None,
            fallback_temperature: 0.2,
            batch_length: 10,
            context_count: 15,
            max_attempts: 3,
            context_strategy: ContextStrategyKind::Window,
            allow_nested_lines: true,
            context_length: None,
            max_tokens: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            prefix: "<span style=\"color: yellow;\"><i>".to_string(),
            suffix: "</i></span>".to_string(),
        }
    }
}

impl Default for ReformatConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for ReevaluateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "llama3.1".to_string(),
            temperature: 0.0,
            context_length: 42500,
            max_attempts: 3,
            system_prompt: DEFAULT_REEVALUATE_SYSTEM_PROMPT.to_string(),
            prompt_template: DEFAULT_REEVALUATE_PROMPT_TEMPLATE.to_string(),
        }
    }
}

impl TranslateConfig {
    /// Fallback model, if one is configured and differs from the primary model
    pub fn distinct_fallback(&self) -> Option<&str> {
        self.fallback_model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty() && *model != self.model)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BisubError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| BisubError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BisubError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| BisubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.translate.batch_length == 0 {
            return Err(BisubError::Config("translate.batch_length must be at least 1".to_string()));
        }
        if self.translate.max_attempts == 0 {
            return Err(BisubError::Config("translate.max_attempts must be at least 1".to_string()));
        }
        if self.reevaluate.enabled && self.reevaluate.max_attempts == 0 {
            return Err(BisubError::Config("reevaluate.max_attempts must be at least 1".to_string()));
        }
        if self.markup.prefix.trim().is_empty() {
            return Err(BisubError::Config("markup.prefix must not be empty".to_string()));
        }
        if self.translate.model.trim().is_empty() {
            return Err(BisubError::Config("translate.model must not be empty".to_string()));
        }
        Ok(())
    }

    /// Every model the configured run will talk to
    pub fn required_models(&self) -> Vec<String> {
        let mut models = vec![self.translate.model.clone()];
        if let Some(fallback) = self.translate.distinct_fallback() {
            models.push(fallback.to_string());
        }
        if self.reevaluate.enabled && !models.contains(&self.reevaluate.model) {
            models.push(self.reevaluate.model.clone());
        }
        models
    }
}
