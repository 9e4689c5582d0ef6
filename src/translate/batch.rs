use std::ops::Range;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::{MarkupConfig, TranslateConfig};
use crate::error::{BisubError, Result};
use crate::oracle::{GenerateRequest, Oracle};
use crate::persist::Checkpoint;
use crate::reformat::check_utterances;
use crate::subtitle::Track;
use super::context::{create_strategy, ContextPair, ContextWindow};
use super::escalation::{AttemptState, EscalationPolicy, ModelChoice, Outcome};
use super::prompt::{response_schema, Prompt, PromptBuilder};
use super::response::{decode_translations, normalize_translation, ResponseError};

/// Counts for one driver run over a track
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Oracle batches that were translated and flushed
    pub batches: usize,
    /// Cues closed by this run
    pub translated: usize,
    /// Cues that were already closed and skipped
    pub skipped: usize,
}

/// Translates a track batch by batch, checkpointing after every batch
pub struct BatchTranslator<'a> {
    oracle: &'a dyn Oracle,
    config: TranslateConfig,
    markup: MarkupConfig,
    policy: EscalationPolicy,
    prompts: PromptBuilder,
    progress: ProgressBar,
}

impl<'a> BatchTranslator<'a> {
    pub fn new(oracle: &'a dyn Oracle, config: TranslateConfig, markup: MarkupConfig) -> Self {
        Self {
            oracle,
            policy: EscalationPolicy::from_config(&config),
            prompts: PromptBuilder::new(&config),
            config,
            markup,
            progress: ProgressBar::hidden(),
        }
    }

    /// Show a progress bar on the terminal while translating
    pub fn with_progress(mut self) -> Self {
        let progress = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cues ({eta})")
        {
            progress.set_style(style.progress_chars("#>-"));
        }
        self.progress = progress;
        self
    }

    /// Translate every open cue of the track.
    ///
    /// Closed cues are skipped, so a partially translated track resumes at
    /// its first open cue. A batch that exhausts all attempts aborts the run;
    /// everything flushed before it stays on disk.
    pub async fn translate_track(&self, track: &mut Track, checkpoint: &dyn Checkpoint) -> Result<BatchReport> {
        let mut report = BatchReport::default();

        if track.is_empty() || track.last_is_closed() {
            info!("Track is already translated, nothing to do");
            report.skipped = track.closed_count();
            return Ok(report);
        }

        let batch_length = self.config.batch_length.max(1);
        let mut strategy = create_strategy(self.config.context_strategy, self.config.context_count);

        self.progress.set_length(track.len() as u64);
        self.progress.set_position(0);

        let mut pos = 0;
        while pos < track.len() {
            if track.is_closed(pos) {
                if let Some(pair) = track.get(pos).and_then(ContextPair::from_cue) {
                    strategy.record(&[pair]);
                }
                report.skipped += 1;
                pos += 1;
                self.progress.inc(1);
                continue;
            }

            let end = (pos..track.len())
                .take(batch_length)
                .find(|&index| track.is_closed(index))
                .unwrap_or_else(|| (pos + batch_length).min(track.len()));

            for cue in &track.cues()[pos..end] {
                check_utterances(cue)?;
            }

            let window = strategy.window(track, pos..end);
            let translations = self.translate_batch(track, pos..end, &window).await?;

            let mut pairs = Vec::with_capacity(translations.len());
            for (offset, translation) in translations.into_iter().enumerate() {
                track.set_translation(pos + offset, translation)?;
                if let Some(pair) = track.get(pos + offset).and_then(ContextPair::from_cue) {
                    pairs.push(pair);
                }
            }
            strategy.record(&pairs);

            checkpoint.save(track)?;

            report.batches += 1;
            report.translated += end - pos;
            self.progress.inc((end - pos) as u64);
            pos = end;
        }

        self.progress.finish_and_clear();
        info!(
            "Translated {} cues in {} batches ({} already closed)",
            report.translated, report.batches, report.skipped
        );
        Ok(report)
    }

    /// Run the escalation policy for one batch until it succeeds or turns fatal
    async fn translate_batch(&self, track: &Track, range: Range<usize>, window: &ContextWindow) -> Result<Vec<String>> {
        let cues = &track.cues()[range];
        let sources: Vec<String> = cues.iter().map(|cue| cue.source.clone()).collect();
        let prompt = self.prompts.build(window, &sources);

        let first_id = cues.first().map(|cue| cue.id).unwrap_or_default();
        let last_id = cues.last().map(|cue| cue.id).unwrap_or_default();

        info!("┌─ Translating cues {}-{} of {} ────────", first_id, last_id, track.len());
        for source in &sources {
            info!("│ Source: {}", source.replace('\n', " / "));
        }
        debug!("│ Context: {} previous, {} future", window.previous.len(), window.future.len());

        let mut state = self.policy.start();
        let mut accepted = None;

        while let Some(choice) = self.policy.model_for(&state) {
            let outcome = match self.attempt(choice, &prompt, sources.len()).await {
                Ok(translations) => {
                    accepted = Some(translations);
                    Outcome::Valid
                }
                Err(e) => {
                    warn!("│ {:?} with {} failed: {}", state, choice.model, e);
                    Outcome::Invalid
                }
            };
            state = self.policy.next(&state, outcome);
        }

        match (state, accepted) {
            (AttemptState::Success, Some(translations)) => {
                for translation in &translations {
                    info!("│ Target: {}", translation.replace('\n', " / "));
                }
                info!("└─────────────────────────────────────");
                Ok(translations)
            }
            _ => {
                warn!("└─ Giving up on cues {}-{}", first_id, last_id);
                Err(BisubError::RetriesExhausted {
                    first_id,
                    last_id,
                    attempts: self.policy.total_attempts(),
                })
            }
        }
    }

    /// One oracle call plus validation; every error here is recoverable
    async fn attempt(&self, choice: &ModelChoice, prompt: &Prompt, count: usize) -> Result<Vec<String>> {
        let request = GenerateRequest {
            model: choice.model.clone(),
            prompt: prompt.user.clone(),
            system: prompt.system.clone(),
            temperature: choice.temperature,
            context_length: self.config.context_length,
            max_tokens: self.config.max_tokens,
            format: Some(response_schema(count, self.config.allow_nested_lines)),
        };

        let raw = self.oracle.generate(&request).await?;
        let decoded = decode_translations(&raw, count, self.config.allow_nested_lines)?;

        decoded
            .iter()
            .enumerate()
            .map(|(index, text)| {
                let text = self.strip_markup(&normalize_translation(text));
                if text.is_empty() {
                    Err(ResponseError::EmptyTranslation { index }.into())
                } else {
                    Ok(text)
                }
            })
            .collect()
    }

    /// The markup delimiters must never appear inside a stored translation
    fn strip_markup(&self, text: &str) -> String {
        let mut text = text.replace(&self.markup.prefix, "");
        if !self.markup.suffix.is_empty() {
            text = text.replace(&self.markup.suffix, "");
        }
        text.trim().to_string()
    }
}
