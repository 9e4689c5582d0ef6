// Batch translation of subtitle tracks
//
// - context: previous/future context strategies
// - prompt: template filling and the reply schema
// - response: strict decoding and normalization of replies
// - escalation: retry and fallback state machine
// - batch: the driver that closes cues batch by batch
// - reevaluate: optional whole-track review pass

pub mod batch;
pub mod context;
pub mod escalation;
pub mod prompt;
pub mod reevaluate;
pub mod response;

pub use batch::{BatchReport, BatchTranslator};
pub use context::{create_strategy, ContextPair, ContextStrategy, ContextWindow, SlidingWindow, TranscriptRing};
pub use escalation::{AttemptState, EscalationPolicy, ModelChoice, Outcome};
pub use prompt::{Prompt, PromptBuilder};
pub use reevaluate::Reevaluator;
pub use response::ResponseError;
