//! Re-segmentation of broadcast-style cues into sentence units.
//!
//! Broadcast subtitles break lines by display timing, not by grammar. The
//! oracle translates whole sentences far better, so raw cues are merged
//! until the accumulated text ends in sentence-final punctuation. Lines
//! starting with a hyphen mark a speaker change and stay on their own line,
//! unless they merely continue an unterminated hyphenated utterance.

use tracing::{debug, info};

use crate::error::{BisubError, Result};
use crate::subtitle::{drop_leading_hyphen, ends_with_punctuation, starts_with_hyphen, Cue, Track};

/// Running state of the unit being assembled
#[derive(Default)]
struct UnitBuilder {
    text: String,
    prev_line: String,
    first_cue: Option<usize>,
    last_cue: usize,
    /// Set once a hyphenated line was folded into the previous utterance
    merged_continuation: bool,
}

impl UnitBuilder {
    fn push_line(&mut self, cue_index: usize, line: &str) {
        let continues_utterance = starts_with_hyphen(line)
            && !self.prev_line.trim().is_empty()
            && !ends_with_punctuation(&self.prev_line);

        let line = if continues_utterance {
            self.merged_continuation = true;
            self.text.push(' ');
            drop_leading_hyphen(line)
        } else if starts_with_hyphen(line) {
            self.text.push('\n');
            line.to_string()
        } else {
            self.text.push(' ');
            line.to_string()
        };

        self.text.push_str(&line);
        self.prev_line = line;
        self.first_cue.get_or_insert(cue_index);
        self.last_cue = cue_index;
    }

    fn is_terminated(&self) -> bool {
        ends_with_punctuation(&self.prev_line)
    }

    /// Finish the unit, resetting the builder
    fn take(&mut self, raw: &[Cue], id: usize) -> Option<Cue> {
        let builder = std::mem::take(self);
        let first = builder.first_cue?;

        let mut text = builder.text.trim().to_string();
        // A merged utterance that ends up alone needs no speaker marker
        if builder.merged_continuation && !text.contains('\n') && starts_with_hyphen(&text) {
            text = drop_leading_hyphen(&text);
        }

        Some(Cue::new(id, raw[first].start_ms, raw[builder.last_cue].end_ms, text))
    }
}

/// Merge raw cues into punctuation-complete sentence units with fresh ids.
///
/// An unterminated remainder at the end of the track is flushed as the last
/// unit. Tracks that already carry translations are refused.
pub fn reformat(track: &Track) -> Result<Track> {
    if track.has_translations() {
        return Err(BisubError::Reformat(
            "track already carries translations".to_string(),
        ));
    }

    let raw = track.cues();
    let mut units = Vec::new();
    let mut builder = UnitBuilder::default();

    for (index, cue) in raw.iter().enumerate() {
        for line in cue.source.split('\n').map(str::trim).filter(|line| !line.is_empty()) {
            builder.push_line(index, line);
        }

        if builder.is_terminated() {
            if let Some(unit) = builder.take(raw, units.len() + 1) {
                debug!("Unit {}: {}", unit.id, unit.source.replace('\n', " / "));
                units.push(unit);
            }
        }
    }

    if let Some(unit) = builder.take(raw, units.len() + 1) {
        debug!("Unterminated trailing unit {}: {}", unit.id, unit.source);
        units.push(unit);
    }

    info!("Reformatted {} raw cues into {} sentence units", raw.len(), units.len());
    Ok(Track::new(units))
}

/// Every line after the first in a cue must open a new hyphenated utterance.
pub fn check_utterances(cue: &Cue) -> Result<()> {
    for line in cue.source.split('\n').skip(1) {
        if !starts_with_hyphen(line) {
            return Err(BisubError::Utterance {
                id: cue.id,
                line: line.trim().to_string(),
            });
        }
    }
    Ok(())
}
