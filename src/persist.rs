use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::MarkupConfig;
use crate::error::{BisubError, Result};
use crate::subtitle::{compose_srt, parse_srt, Track};

/// Durable sink for a track after each structural change or batch
pub trait Checkpoint {
    fn save(&self, track: &Track) -> Result<()>;
}

/// SRT file holding one track; the saved form is also the next run's input
#[derive(Debug, Clone)]
pub struct TrackStore {
    path: PathBuf,
    markup: MarkupConfig,
}

impl TrackStore {
    pub fn new<P: AsRef<Path>>(path: P, markup: MarkupConfig) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            markup,
        }
    }

    /// Load the track; translated cues are recognised by their markup prefix
    pub fn load(&self) -> Result<Track> {
        if !self.path.exists() {
            return Err(BisubError::FileNotFound(self.path.display().to_string()));
        }

        let bytes = std::fs::read(&self.path)?;
        let content = String::from_utf8(bytes).map_err(|e| {
            BisubError::Subtitle(format!("{} is not valid UTF-8: {}", self.path.display(), e))
        })?;

        parse_srt(&content, &self.markup)
    }

    /// Replace the file atomically so an interrupted write never leaves a torn track
    pub fn write(&self, track: &Track) -> Result<()> {
        let content = compose_srt(track, &self.markup);
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut file = NamedTempFile::new_in(&dir)?;
        file.write_all(content.as_bytes())?;
        // Temporary files are private; keep the mode the user gave the track
        if let Ok(metadata) = std::fs::metadata(&self.path) {
            file.as_file().set_permissions(metadata.permissions())?;
        }
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| BisubError::Io(e.error))?;

        debug!("Saved {} cues to {}", track.len(), self.path.display());
        Ok(())
    }
}

impl Checkpoint for TrackStore {
    fn save(&self, track: &Track) -> Result<()> {
        self.write(track)
    }
}
