use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{BisubError, Result};
use crate::oracle::{OllamaOracle, Oracle};
use crate::persist::{Checkpoint, TrackStore};
use crate::reformat::reformat;
use crate::subtitle::Track;
use crate::translate::{BatchTranslator, Reevaluator};

/// Summary of one processed file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    pub cues: usize,
    pub reformatted: bool,
    pub translated: usize,
    pub corrected: usize,
}

pub struct Workflow {
    config: Config,
    oracle: Box<dyn Oracle>,
    progress: bool,
}

impl Workflow {
    /// Workflow talking to the configured Ollama endpoint
    pub fn new(config: Config) -> Result<Self> {
        let oracle = OllamaOracle::new(&config.oracle)?;
        Ok(Self::with_oracle(config, Box::new(oracle)))
    }

    pub fn with_oracle(config: Config, oracle: Box<dyn Oracle>) -> Self {
        Self {
            config,
            oracle,
            progress: false,
        }
    }

    /// Draw a progress bar per file while translating
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Verify the oracle is reachable and serves every configured model
    pub async fn check_connection(&self) -> Result<()> {
        let models = self.config.required_models();
        info!("Checking oracle connection for models: {}", models.join(", "));
        self.oracle.check_connection(&models).await?;
        info!("Oracle is available");
        Ok(())
    }

    /// Translate every `.srt` file directly inside `dir`, in name order.
    ///
    /// A file that fails is logged and skipped; the returned count is the
    /// number of files that completed.
    pub async fn process_directory<P: AsRef<Path>>(&self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        info!("Processing directory: {}", dir.display());

        if !dir.is_dir() {
            return Err(BisubError::FileNotFound(dir.display().to_string()));
        }

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            if is_srt(path) {
                files.push(path.to_path_buf());
            } else {
                warn!("Skipping {}: not an SRT file", path.display());
            }
        }

        info!("Found {} subtitle files to process", files.len());

        let mut completed = 0;
        for path in &files {
            match self.process_file(path).await {
                Ok(report) => {
                    completed += 1;
                    info!(
                        "Successfully processed: {} ({} cues, {} translated, {} corrected)",
                        path.display(),
                        report.cues,
                        report.translated,
                        report.corrected
                    );
                }
                Err(e) => warn!("Failed to process {}: {}", path.display(), e),
            }
        }

        Ok(completed)
    }

    /// Load, reformat, translate and optionally reevaluate one file in place
    pub async fn process_file<P: AsRef<Path>>(&self, path: P) -> Result<FileReport> {
        let path = path.as_ref();
        info!("Processing file: {}", path.display());

        if !is_srt(path) {
            return Err(BisubError::UnsupportedFormat(path.display().to_string()));
        }

        let store = TrackStore::new(path, self.config.markup.clone());
        let mut track = store.load()?;
        let mut report = FileReport::default();

        if !track.has_translations() {
            if self.config.reformat.enabled {
                track = reformat(&track)?;
                report.reformatted = true;
            } else {
                track.renumber();
            }
            store.save(&track)?;
        }
        report.cues = track.len();

        let mut translator = BatchTranslator::new(
            self.oracle.as_ref(),
            self.config.translate.clone(),
            self.config.markup.clone(),
        );
        if self.progress {
            translator = translator.with_progress();
        }
        report.translated = translator.translate_track(&mut track, &store).await?.translated;

        if self.config.reevaluate.enabled {
            let reevaluator = Reevaluator::new(
                self.oracle.as_ref(),
                self.config.reevaluate.clone(),
                self.config.markup.clone(),
                &self.config.translate.source_language,
                &self.config.translate.target_language,
            );
            report.corrected = reevaluator.reevaluate(&mut track).await?;
        }

        store.save(&track)?;
        Ok(report)
    }

    /// Reformat a file without translating; writes to `output` or returns the track only
    pub fn reformat_preview<P: AsRef<Path>>(&self, input: P, output: Option<&Path>) -> Result<Track> {
        let store = TrackStore::new(input.as_ref(), self.config.markup.clone());
        let track = reformat(&store.load()?)?;

        if let Some(output) = output {
            TrackStore::new(output, self.config.markup.clone()).write(&track)?;
            info!("Wrote {} sentence units to {}", track.len(), output.display());
        }
        Ok(track)
    }
}

fn is_srt(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("srt"))
}
