//! Bisub - bilingual subtitle translation
//!
//! Merges subtitle cues into sentence units, translates them batch by batch
//! through a local LLM with sliding context, and keeps both languages in the
//! same SRT file so an interrupted run resumes where it stopped.

pub mod cli;
pub mod config;
pub mod error;
pub mod oracle;
pub mod persist;
pub mod reformat;
pub mod subtitle;
pub mod translate;
pub mod workflow;
