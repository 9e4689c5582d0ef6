use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::MarkupConfig;
use crate::error::{BisubError, Result};

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<[^>]*>").expect("tag pattern is valid")
});

static LEADING_HYPHEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((?:\s*<[^>]*>)*)\s*-\s*").expect("hyphen pattern is valid")
});

static TIMING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d+):(\d{2}):(\d{2})[,.](\d{3})")
        .expect("timing pattern is valid")
});

/// Characters that end a sentence or utterance
const SENTENCE_FINAL: [char; 6] = ['.', '!', '?', '"', '\'', '♪'];

/// A single timestamped subtitle entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// 1-based position in the track
    pub id: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    /// Original text, possibly spanning several hyphen-prefixed lines
    pub source: String,
    /// Translated text without markup; `Some` means the cue is closed
    pub translation: Option<String>,
}

impl Cue {
    pub fn new(id: usize, start_ms: u64, end_ms: u64, source: impl Into<String>) -> Self {
        Self {
            id,
            start_ms,
            end_ms,
            source: source.into(),
            translation: None,
        }
    }

    pub fn with_translation(mut self, translation: impl Into<String>) -> Self {
        self.translation = Some(translation.into());
        self
    }

    /// Closed cues carry a non-empty translation
    pub fn is_closed(&self) -> bool {
        self.translation.as_deref().is_some_and(|translation| !translation.is_empty())
    }
}

/// Ordered cue sequence of one subtitle file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Track {
    cues: Vec<Cue>,
}

impl Track {
    pub fn new(cues: Vec<Cue>) -> Self {
        Self { cues }
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn get(&self, pos: usize) -> Option<&Cue> {
        self.cues.get(pos)
    }

    pub fn is_closed(&self, pos: usize) -> bool {
        self.cues.get(pos).is_some_and(Cue::is_closed)
    }

    pub fn has_translations(&self) -> bool {
        self.cues.iter().any(Cue::is_closed)
    }

    /// Track-level completion check: batches close cues in order
    pub fn last_is_closed(&self) -> bool {
        self.cues.last().is_some_and(Cue::is_closed)
    }

    pub fn closed_count(&self) -> usize {
        self.cues.iter().filter(|cue| cue.is_closed()).count()
    }

    /// Close an open cue. Closed cues are never translated again.
    pub fn set_translation(&mut self, pos: usize, translation: String) -> Result<()> {
        let cue = self.cues.get_mut(pos).ok_or_else(|| {
            BisubError::Subtitle(format!("No cue at position {}", pos))
        })?;

        if cue.is_closed() {
            return Err(BisubError::ClosedCue(cue.id));
        }
        if translation.trim().is_empty() {
            return Err(BisubError::Subtitle(format!("Empty translation for cue {}", cue.id)));
        }

        cue.translation = Some(translation);
        Ok(())
    }

    /// Overwrite the translation of an already closed cue
    pub fn replace_translation(&mut self, pos: usize, translation: String) -> Result<()> {
        let cue = self.cues.get_mut(pos).ok_or_else(|| {
            BisubError::Subtitle(format!("No cue at position {}", pos))
        })?;

        if !cue.is_closed() {
            return Err(BisubError::Subtitle(format!("Cue {} has no translation to replace", cue.id)));
        }

        cue.translation = Some(translation);
        Ok(())
    }

    /// Renumber ids densely from 1
    pub fn renumber(&mut self) {
        for (index, cue) in self.cues.iter_mut().enumerate() {
            cue.id = index + 1;
        }
    }
}

/// Remove HTML-ish tags and surrounding whitespace
pub fn strip_tags(text: &str) -> String {
    TAG_REGEX.replace_all(text, "").trim().to_string()
}

/// Whether the text, ignoring tags, ends in sentence-final punctuation
pub fn ends_with_punctuation(text: &str) -> bool {
    strip_tags(text).ends_with(SENTENCE_FINAL)
}

/// Whether the text, ignoring tags, starts with a speaker hyphen
pub fn starts_with_hyphen(text: &str) -> bool {
    strip_tags(text).starts_with('-')
}

/// Drop the speaker hyphen of a line while keeping leading markup
pub fn drop_leading_hyphen(line: &str) -> String {
    LEADING_HYPHEN_REGEX.replace(line, "${1}").trim().to_string()
}

/// Format milliseconds to SRT time format (HH:MM:SS,mmm)
pub fn format_srt_time(total_milliseconds: u64) -> String {
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

fn parse_timing(line: &str) -> Option<(u64, u64)> {
    let caps = TIMING_REGEX.captures(line)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());

    // Absurd hour counts overflow and are treated as malformed
    let millis = |first: usize| -> Option<u64> {
        field(first)?
            .checked_mul(3_600_000)?
            .checked_add(field(first + 1)? * 60_000)?
            .checked_add(field(first + 2)? * 1_000)?
            .checked_add(field(first + 3)?)
    };

    Some((millis(1)?, millis(5)?))
}

/// Split a cue body into source text and translation using the markup prefix
fn split_body(body: &str, markup: &MarkupConfig) -> (String, Option<String>) {
    match body.find(&markup.prefix) {
        Some(index) => {
            let source = body[..index].trim().to_string();
            let rest = body[index + markup.prefix.len()..].trim_end();
            let translation = if !markup.suffix.is_empty() {
                rest.strip_suffix(markup.suffix.as_str()).unwrap_or(rest)
            } else {
                rest
            };
            let translation = translation.trim();
            let translation = (!translation.is_empty()).then(|| translation.to_string());
            (source, translation)
        }
        None => (body.trim().to_string(), None),
    }
}

/// Parse SRT content into a track, detecting translated cues by their markup
pub fn parse_srt(content: &str, markup: &MarkupConfig) -> Result<Track> {
    let content = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");

    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in content.split('\n') {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    let mut cues = Vec::with_capacity(blocks.len());
    for (block_number, block) in blocks.iter().enumerate() {
        let id = block[0].trim().parse::<usize>().map_err(|_| {
            BisubError::Subtitle(format!(
                "Block {}: expected a numeric id, found \"{}\"",
                block_number + 1,
                block[0].trim()
            ))
        })?;

        let timing = block.get(1).ok_or_else(|| {
            BisubError::Subtitle(format!("Block {}: missing timing line", block_number + 1))
        })?;
        let (start_ms, end_ms) = parse_timing(timing).ok_or_else(|| {
            BisubError::Subtitle(format!(
                "Block {}: malformed timing line \"{}\"",
                block_number + 1,
                timing.trim()
            ))
        })?;
        if end_ms < start_ms {
            return Err(BisubError::Subtitle(format!(
                "Block {}: cue ends before it starts",
                block_number + 1
            )));
        }

        let body = block[2..]
            .iter()
            .map(|line| line.trim_end())
            .collect::<Vec<_>>()
            .join("\n");
        let (source, translation) = split_body(&body, markup);

        cues.push(Cue {
            id,
            start_ms,
            end_ms,
            source,
            translation,
        });
    }

    Ok(Track::new(cues))
}

/// Compose a track as SRT, keeping ids as they are
pub fn compose_srt(track: &Track, markup: &MarkupConfig) -> String {
    let mut srt_content = String::new();

    for cue in track.cues() {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n",
            cue.id,
            format_srt_time(cue.start_ms),
            format_srt_time(cue.end_ms),
            cue.source.trim()
        ));
        if let Some(translation) = &cue.translation {
            srt_content.push_str(&format!("{}{}{}\n", markup.prefix, translation, markup.suffix));
        }
        srt_content.push('\n');
    }

    srt_content
}
