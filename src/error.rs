use thiserror::Error;

use crate::translate::ResponseError;

#[derive(Error, Debug)]
pub enum BisubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cannot reach oracle: {0}")]
    Connectivity(String),

    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("Invalid oracle response: {0}")]
    Response(#[from] ResponseError),

    #[error("Translation of cues {first_id}-{last_id} failed after {attempts} attempts")]
    RetriesExhausted {
        first_id: usize,
        last_id: usize,
        attempts: u32,
    },

    #[error("Subtitle parsing error: {0}")]
    Subtitle(String),

    #[error("Cue {0} already carries a translation")]
    ClosedCue(usize),

    #[error("Reformatting error: {0}")]
    Reformat(String),

    #[error("Cue {id} breaks the utterance layout: unexpected line break before \"{line}\"")]
    Utterance { id: usize, line: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, BisubError>;
