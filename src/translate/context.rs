use std::collections::VecDeque;
use std::ops::Range;

use crate::config::ContextStrategyKind;
use crate::subtitle::{strip_tags, Cue, Track};

/// Rendered in place of an empty context list
pub const NO_CONTEXT: &str = "(no context available)";

/// A translated cue as seen by later batches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextPair {
    pub source: String,
    pub translation: String,
}

impl ContextPair {
    /// Pair for a closed cue, with markup stripped from both sides
    pub fn from_cue(cue: &Cue) -> Option<Self> {
        cue.translation.as_ref().filter(|_| cue.is_closed()).map(|translation| Self {
            source: flatten(&cue.source),
            translation: flatten(translation),
        })
    }
}

/// Bounded lookback and lookahead for one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextWindow {
    pub previous: Vec<ContextPair>,
    pub future: Vec<String>,
}

impl ContextWindow {
    pub fn render_previous(&self) -> String {
        if self.previous.is_empty() {
            return NO_CONTEXT.to_string();
        }
        self.previous
            .iter()
            .map(|pair| format!("- {}\n  [{}]", pair.source, pair.translation))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn render_future(&self) -> String {
        if self.future.is_empty() {
            return NO_CONTEXT.to_string();
        }
        self.future
            .iter()
            .map(|source| format!("- {}", source))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn flatten(text: &str) -> String {
    text.split('\n')
        .map(strip_tags)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Up to `count` closed cues before `batch_start`, oldest first
pub fn previous_context(track: &Track, batch_start: usize, count: usize) -> Vec<ContextPair> {
    let end = batch_start.min(track.len());
    let mut pairs: Vec<ContextPair> = track.cues()[..end]
        .iter()
        .rev()
        .filter_map(ContextPair::from_cue)
        .take(count)
        .collect();
    pairs.reverse();
    pairs
}

/// Sources of up to `count` cues following the batch that ends at `batch_end`
pub fn future_context(track: &Track, batch_end: usize, count: usize) -> Vec<String> {
    track.cues()
        .iter()
        .skip(batch_end)
        .take(count)
        .map(|cue| flatten(&cue.source))
        .collect()
}

/// Source of the previous/future context handed to the oracle
pub trait ContextStrategy: Send {
    /// Context for the batch covering `batch` positions of the track
    fn window(&self, track: &Track, batch: Range<usize>) -> ContextWindow;

    /// Called with the pairs of every closed batch, in track order
    fn record(&mut self, pairs: &[ContextPair]);
}

/// Re-derives the previous context from the track for every batch
pub struct SlidingWindow {
    count: usize,
}

impl SlidingWindow {
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

impl ContextStrategy for SlidingWindow {
    fn window(&self, track: &Track, batch: Range<usize>) -> ContextWindow {
        ContextWindow {
            previous: previous_context(track, batch.start, self.count),
            future: future_context(track, batch.end, self.count),
        }
    }

    fn record(&mut self, _pairs: &[ContextPair]) {}
}

/// Keeps a fixed number of recorded pairs, like a bounded chat transcript
pub struct TranscriptRing {
    count: usize,
    pairs: VecDeque<ContextPair>,
}

impl TranscriptRing {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            pairs: VecDeque::with_capacity(count),
        }
    }
}

impl ContextStrategy for TranscriptRing {
    fn window(&self, track: &Track, batch: Range<usize>) -> ContextWindow {
        ContextWindow {
            previous: self.pairs.iter().cloned().collect(),
            future: future_context(track, batch.end, self.count),
        }
    }

    fn record(&mut self, pairs: &[ContextPair]) {
        if self.count == 0 {
            return;
        }
        for pair in pairs {
            if self.pairs.len() == self.count {
                self.pairs.pop_front();
            }
            self.pairs.push_back(pair.clone());
        }
    }
}

/// Create the context strategy selected in the configuration
pub fn create_strategy(kind: ContextStrategyKind, count: usize) -> Box<dyn ContextStrategy> {
    match kind {
        ContextStrategyKind::Window => Box::new(SlidingWindow::new(count)),
        ContextStrategyKind::Transcript => Box::new(TranscriptRing::new(count)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(closed: usize, total: usize) -> Track {
        Track::new(
            (0..total)
                .map(|i| {
                    let cue = Cue::new(i + 1, i as u64, i as u64 + 1, format!("s{}", i + 1));
                    if i < closed {
                        cue.with_translation(format!("t{}", i + 1))
                    } else {
                        cue
                    }
                })
                .collect(),
        )
    }

    fn sources(pairs: &[ContextPair]) -> Vec<&str> {
        pairs.iter().map(|pair| pair.source.as_str()).collect()
    }

    #[test]
    fn test_previous_context_takes_latest_closed_oldest_first() {
        let track = track(6, 10);
        let previous = previous_context(&track, 6, 4);
        assert_eq!(sources(&previous), vec!["s3", "s4", "s5", "s6"]);
        assert_eq!(previous[0].translation, "t3");
    }

    #[test]
    fn test_previous_context_with_short_history() {
        let track = track(2, 5);
        assert_eq!(sources(&previous_context(&track, 2, 10)), vec!["s1", "s2"]);
        assert!(previous_context(&track, 0, 10).is_empty());
    }

    #[test]
    fn test_previous_context_ignores_open_cues() {
        let track = track(2, 5);
        assert_eq!(sources(&previous_context(&track, 4, 10)), vec!["s1", "s2"]);
    }

    #[test]
    fn test_future_context_excludes_batch_and_stops_at_end() {
        let track = track(0, 10);
        assert_eq!(future_context(&track, 4, 3), vec!["s5", "s6", "s7"]);
        assert_eq!(future_context(&track, 8, 5), vec!["s9", "s10"]);
        assert!(future_context(&track, 10, 5).is_empty());
    }

    #[test]
    fn test_pairs_strip_markup() {
        let cue = Cue::new(1, 0, 1, "<i>- Who?</i>\n- Me.").with_translation("<b>- Wer?</b>\n- Ich.");
        let pair = ContextPair::from_cue(&cue).unwrap();
        assert_eq!(pair.source, "- Who? - Me.");
        assert_eq!(pair.translation, "- Wer? - Ich.");
    }

    #[test]
    fn test_empty_window_renders_placeholder() {
        let window = ContextWindow::default();
        assert_eq!(window.render_previous(), NO_CONTEXT);
        assert_eq!(window.render_future(), NO_CONTEXT);
    }

    #[test]
    fn test_window_rendering() {
        let window = ContextWindow {
            previous: vec![ContextPair {
                source: "Hello.".to_string(),
                translation: "Hallo.".to_string(),
            }],
            future: vec!["Bye.".to_string(), "Now.".to_string()],
        };
        assert_eq!(window.render_previous(), "- Hello.\n  [Hallo.]");
        assert_eq!(window.render_future(), "- Bye.\n- Now.");
    }

    #[test]
    fn test_windows_stay_bounded() {
        let track = track(30, 60);
        let strategy = SlidingWindow::new(10);
        for start in 0..60 {
            let end = (start + 4).min(60);
            let window = strategy.window(&track, start..end);
            assert!(window.previous.len() <= 10);
            assert!(window.future.len() <= 10);
        }
    }

    #[test]
    fn test_transcript_ring_evicts_oldest() {
        let track = track(5, 8);
        let mut ring = TranscriptRing::new(3);
        let pairs: Vec<ContextPair> = track.cues()[..5]
            .iter()
            .filter_map(ContextPair::from_cue)
            .collect();

        ring.record(&pairs[..2]);
        ring.record(&pairs[2..]);

        let window = ring.window(&track, 5..7);
        assert_eq!(sources(&window.previous), vec!["s3", "s4", "s5"]);
        assert_eq!(window.future, vec!["s8"]);
    }

    #[test]
    fn test_zero_sized_ring_records_nothing() {
        let track = track(1, 2);
        let mut ring = TranscriptRing::new(0);
        ring.record(&[ContextPair::from_cue(&track.cues()[0]).unwrap()]);
        assert!(ring.window(&track, 1..2).previous.is_empty());
    }

    #[test]
    fn test_strategies_agree_on_in_order_translation() {
        let track = track(6, 9);
        let mut ring = create_strategy(ContextStrategyKind::Transcript, 4);
        let sliding = create_strategy(ContextStrategyKind::Window, 4);

        let pairs: Vec<ContextPair> = track.cues().iter().filter_map(ContextPair::from_cue).collect();
        ring.record(&pairs);

        assert_eq!(ring.window(&track, 6..9), sliding.window(&track, 6..9));
    }
}
