use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{MarkupConfig, ReevaluateConfig};
use crate::error::Result;
use crate::oracle::{GenerateRequest, Oracle};
use crate::subtitle::{compose_srt, Cue, Track};
use super::prompt::fill_template;
use super::response::{normalize_translation, strip_code_fences};

/// One correction proposed by the reviewing model
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Correction {
    pub id: usize,
    #[serde(rename = "t")]
    pub text: String,
}

/// Reply of the reviewing model
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Review {
    pub status: bool,
    #[serde(rename = "updatedTranslations", default)]
    pub updated_translations: Vec<Correction>,
}

fn review_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "status": { "type": "boolean" },
            "updatedTranslations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "t": { "type": "string" }
                    },
                    "required": ["id", "t"]
                }
            }
        },
        "required": ["status"]
    })
}

/// Parse a review reply, tolerating a surrounding code fence
pub fn parse_review(raw: &str) -> Result<Review> {
    Ok(serde_json::from_str(strip_code_fences(raw))?)
}

/// Second pass over a finished track, asking one model to review every translation at once
pub struct Reevaluator<'a> {
    oracle: &'a dyn Oracle,
    config: ReevaluateConfig,
    markup: MarkupConfig,
    source_language: String,
    target_language: String,
}

impl<'a> Reevaluator<'a> {
    pub fn new(
        oracle: &'a dyn Oracle,
        config: ReevaluateConfig,
        markup: MarkupConfig,
        source_language: &str,
        target_language: &str,
    ) -> Self {
        Self {
            oracle,
            config,
            markup,
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
        }
    }

    fn request(&self, track: &Track) -> GenerateRequest {
        let flattened = Track::new(
            track
                .cues()
                .iter()
                .map(|cue| Cue {
                    source: cue.source.replace('\n', "<br>"),
                    translation: cue.translation.as_ref().map(|t| t.replace('\n', "<br>")),
                    ..cue.clone()
                })
                .collect(),
        );

        let file = compose_srt(&flattened, &self.markup);
        let values = [
            ("source_language", self.source_language.as_str()),
            ("target_language", self.target_language.as_str()),
            ("prefix", self.markup.prefix.as_str()),
            ("suffix", self.markup.suffix.as_str()),
            ("file", file.as_str()),
        ];

        GenerateRequest {
            model: self.config.model.clone(),
            prompt: fill_template(&self.config.prompt_template, &values),
            system: fill_template(&self.config.system_prompt, &values),
            temperature: self.config.temperature,
            context_length: Some(self.config.context_length),
            max_tokens: Some(-1),
            format: Some(review_schema()),
        }
    }

    /// Ask for corrections and apply them all, or none.
    ///
    /// Returns the number of cues changed. Any failure leaves the track as it was.
    pub async fn reevaluate(&self, track: &mut Track) -> Result<usize> {
        if track.is_empty() || !track.last_is_closed() {
            debug!("Skipping reevaluation of an unfinished track");
            return Ok(0);
        }

        let request = self.request(track);
        let attempts = self.config.max_attempts.max(1);

        info!("┌─ Reevaluating {} cues with {} ────────", track.len(), self.config.model);
        for attempt in 1..=attempts {
            let review = match self.oracle.generate(&request).await {
                Ok(raw) => parse_review(&raw),
                Err(e) => Err(e),
            };

            match review {
                Ok(review) => {
                    let changed = apply_review(track, &review)?;
                    info!("└─ Reevaluation changed {} cues", changed);
                    return Ok(changed);
                }
                Err(e) => warn!("│ Attempt {}/{} failed: {}", attempt, attempts, e),
            }
        }

        warn!("└─ Reevaluation gave no usable reply, keeping translations");
        Ok(0)
    }
}

/// Apply a review to the track, all or nothing.
///
/// Every correction must name an existing closed cue whose id matches its
/// position; otherwise the track is left untouched.
pub fn apply_review(track: &mut Track, review: &Review) -> Result<usize> {
    if !review.status {
        info!("│ Reviewer reported no corrections");
        return Ok(0);
    }

    let mut updates = Vec::with_capacity(review.updated_translations.len());
    for correction in &review.updated_translations {
        let pos = correction.id.checked_sub(1);
        let cue = pos.and_then(|pos| track.get(pos));
        let Some((pos, cue)) = pos.zip(cue) else {
            warn!("│ Correction for unknown cue {}, discarding review", correction.id);
            return Ok(0);
        };
        if cue.id != correction.id || !cue.is_closed() {
            warn!("│ Correction for cue {} does not match the track, discarding review", correction.id);
            return Ok(0);
        }

        let text = normalize_translation(&correction.text);
        if text.is_empty() {
            warn!("│ Empty correction for cue {}, discarding review", correction.id);
            return Ok(0);
        }
        updates.push((pos, text));
    }

    let mut changed = 0;
    for (pos, text) in updates {
        if track.get(pos).and_then(|cue| cue.translation.as_deref()) == Some(text.as_str()) {
            continue;
        }
        debug!("│ Cue {}: {}", pos + 1, text.replace('\n', " / "));
        track.replace_translation(pos, text)?;
        changed += 1;
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use crate::oracle::MockOracle;
    use super::*;

    fn finished_track() -> Track {
        Track::new(vec![
            Cue::new(1, 0, 1_000, "Hello.").with_translation("Hallo."),
            Cue::new(2, 1_000, 2_000, "- Who?\n- Me.").with_translation("- Wer?\n- Ich."),
            Cue::new(3, 2_000, 3_000, "Bye.").with_translation("Tschüss"),
        ])
    }

    fn config() -> ReevaluateConfig {
        ReevaluateConfig {
            enabled: true,
            max_attempts: 2,
            prompt_template: "{file}".to_string(),
            ..ReevaluateConfig::default()
        }
    }

    #[test]
    fn test_parse_review() {
        let review = parse_review("```json\n{\"status\": true, \"updatedTranslations\": [{\"id\": 3, \"t\": \"Tschüss.\"}]}\n```").unwrap();
        assert!(review.status);
        assert_eq!(review.updated_translations, vec![Correction { id: 3, text: "Tschüss.".to_string() }]);

        let review = parse_review("{\"status\": false}").unwrap();
        assert!(review.updated_translations.is_empty());
    }

    #[test]
    fn test_apply_review_converts_breaks() {
        let mut track = finished_track();
        let review = Review {
            status: true,
            updated_translations: vec![
                Correction { id: 2, text: "- Wer da?<br>- Ich.".to_string() },
                Correction { id: 3, text: "Tschüss.".to_string() },
            ],
        };

        assert_eq!(apply_review(&mut track, &review).unwrap(), 2);
        assert_eq!(track.cues()[1].translation.as_deref(), Some("- Wer da?\n- Ich."));
        assert_eq!(track.cues()[2].translation.as_deref(), Some("Tschüss."));
    }

    #[test]
    fn test_apply_review_is_all_or_nothing() {
        let mut track = finished_track();
        let review = Review {
            status: true,
            updated_translations: vec![
                Correction { id: 1, text: "Hallo!".to_string() },
                Correction { id: 9, text: "Nichts.".to_string() },
            ],
        };

        assert_eq!(apply_review(&mut track, &review).unwrap(), 0);
        assert_eq!(track, finished_track());
    }

    #[test]
    fn test_apply_review_rejects_id_mismatch() {
        let mut track = Track::new(vec![
            Cue::new(1, 0, 1_000, "Hello.").with_translation("Hallo."),
            Cue::new(5, 1_000, 2_000, "Bye.").with_translation("Tschüss"),
        ]);
        let original = track.clone();
        let review = Review {
            status: true,
            updated_translations: vec![Correction { id: 2, text: "Tschüss.".to_string() }],
        };

        assert_eq!(apply_review(&mut track, &review).unwrap(), 0);
        assert_eq!(track, original);
    }

    #[test]
    fn test_apply_review_status_false() {
        let mut track = finished_track();
        let review = Review {
            status: false,
            updated_translations: vec![Correction { id: 1, text: "Hallo!".to_string() }],
        };
        assert_eq!(apply_review(&mut track, &review).unwrap(), 0);
        assert_eq!(track, finished_track());
    }

    #[tokio::test]
    async fn test_reevaluate_sends_flattened_file() {
        let mut oracle = MockOracle::new();
        oracle
            .expect_generate()
            .withf(|request| {
                request.model == "llama3.1"
                    && request.max_tokens == Some(-1)
                    && request.context_length == Some(42500)
                    && request.prompt.contains("- Who?<br>- Me.")
                    && request.prompt.contains("<i>- Wer?<br>- Ich.</i>")
            })
            .times(1)
            .returning(|_| Ok("{\"status\": true, \"updatedTranslations\": [{\"id\": 3, \"t\": \"Tschüss.\"}]}".to_string()));

        let mut track = finished_track();
        let reevaluator = Reevaluator::new(&oracle, config(), MarkupConfig::default(), "English", "German");

        assert_eq!(reevaluator.reevaluate(&mut track).await.unwrap(), 1);
        assert_eq!(track.cues()[2].translation.as_deref(), Some("Tschüss."));
        assert_eq!(track.cues()[1].translation.as_deref(), Some("- Wer?\n- Ich."));
    }

    #[tokio::test]
    async fn test_reevaluate_retries_then_gives_up() {
        let mut oracle = MockOracle::new();
        oracle.expect_generate().times(2).returning(|_| Ok("I found no issues!".to_string()));

        let mut track = finished_track();
        let reevaluator = Reevaluator::new(&oracle, config(), MarkupConfig::default(), "English", "German");

        assert_eq!(reevaluator.reevaluate(&mut track).await.unwrap(), 0);
        assert_eq!(track, finished_track());
    }

    #[tokio::test]
    async fn test_reevaluate_skips_unfinished_track() {
        let mut oracle = MockOracle::new();
        oracle.expect_generate().never();

        let mut track = Track::new(vec![Cue::new(1, 0, 1_000, "Hello.")]);
        let reevaluator = Reevaluator::new(&oracle, config(), MarkupConfig::default(), "English", "German");
        assert_eq!(reevaluator.reevaluate(&mut track).await.unwrap(), 0);
    }
}
