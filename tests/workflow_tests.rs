mod common;

use std::sync::Arc;

use assert_fs::TempDir;
use assert_fs::prelude::*;
use async_trait::async_trait;

use bisub::config::{Config, MarkupConfig};
use bisub::error::{BisubError, Result};
use bisub::oracle::{GenerateRequest, Oracle};
use bisub::persist::TrackStore;
use bisub::workflow::Workflow;
use common::{EchoOracle, RAW_SRT};

fn test_config() -> Config {
    let mut config = Config::default();
    config.translate.prompt_template = "{batch}".to_string();
    config.translate.batch_length = 2;
    config.translate.max_attempts = 1;
    config
}

/// Lets the test inspect the oracle after the workflow took ownership
struct SharedOracle(Arc<EchoOracle>);

#[async_trait]
impl Oracle for SharedOracle {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        self.0.generate(request).await
    }

    async fn check_connection(&self, models: &[String]) -> Result<()> {
        self.0.check_connection(models).await
    }
}

fn workflow(oracle: &Arc<EchoOracle>) -> Workflow {
    Workflow::with_oracle(test_config(), Box::new(SharedOracle(oracle.clone())))
}

#[tokio::test]
async fn test_translates_file_in_place() {
    let temp = TempDir::new().unwrap();
    let file = temp.child("episode.srt");
    file.write_str(RAW_SRT).unwrap();

    let oracle = Arc::new(EchoOracle::new());
    let report = workflow(&oracle).process_file(file.path()).await.unwrap();

    assert!(report.reformatted);
    assert_eq!(report.cues, 4);
    assert_eq!(report.translated, 4);
    assert_eq!(oracle.calls(), 2);

    let track = TrackStore::new(file.path(), MarkupConfig::default()).load().unwrap();
    let sources: Vec<&str> = track.cues().iter().map(|cue| cue.source.as_str()).collect();
    assert_eq!(
        sources,
        vec!["I think we should go.", "- Who's there?\n- Me.", "Open the door.", "It's cold outside!"]
    );
    assert_eq!(track.cues()[0].translation.as_deref(), Some("DE: I think we should go."));
    assert_eq!(track.cues()[0].start_ms, 1_000);
    assert_eq!(track.cues()[0].end_ms, 3_500);
    assert!(track.last_is_closed());

    let content = std::fs::read_to_string(file.path()).unwrap();
    assert!(content.contains("<span style=\"color: yellow;\"><i>DE: Open the door.</i></span>"));
}

#[tokio::test]
async fn test_interrupted_run_resumes_at_first_open_cue() {
    let temp = TempDir::new().unwrap();
    let file = temp.child("episode.srt");
    file.write_str(RAW_SRT).unwrap();

    let failing = Arc::new(EchoOracle::failing_after(1));
    let err = workflow(&failing).process_file(file.path()).await.unwrap_err();
    assert!(matches!(err, BisubError::RetriesExhausted { first_id: 3, last_id: 4, .. }));

    let partial = TrackStore::new(file.path(), MarkupConfig::default()).load().unwrap();
    assert_eq!(partial.len(), 4);
    assert_eq!(partial.closed_count(), 2);

    let oracle = Arc::new(EchoOracle::new());
    let report = workflow(&oracle).process_file(file.path()).await.unwrap();

    assert!(!report.reformatted);
    assert_eq!(report.translated, 2);
    assert_eq!(oracle.sent_sources(), vec!["Open the door.", "It's cold outside!"]);

    let finished = TrackStore::new(file.path(), MarkupConfig::default()).load().unwrap();
    assert_eq!(finished.closed_count(), 4);
    assert_eq!(finished.cues()[0], partial.cues()[0]);
}

#[tokio::test]
async fn test_finished_file_is_left_alone() {
    let temp = TempDir::new().unwrap();
    let file = temp.child("episode.srt");
    file.write_str(RAW_SRT).unwrap();

    let oracle = Arc::new(EchoOracle::new());
    workflow(&oracle).process_file(file.path()).await.unwrap();
    let first = std::fs::read(file.path()).unwrap();

    let idle = Arc::new(EchoOracle::new());
    let report = workflow(&idle).process_file(file.path()).await.unwrap();

    assert_eq!(report.translated, 0);
    assert_eq!(idle.calls(), 0);
    assert_eq!(std::fs::read(file.path()).unwrap(), first);
}

#[tokio::test]
async fn test_directory_skips_other_files_and_bad_tracks() {
    let temp = TempDir::new().unwrap();
    temp.child("a.srt").write_str(RAW_SRT).unwrap();
    temp.child("b.srt").write_str("1\nnot a timing line\nHello.\n").unwrap();
    temp.child("notes.txt").write_str("not subtitles").unwrap();

    let oracle = Arc::new(EchoOracle::new());
    let completed = workflow(&oracle).process_directory(temp.path()).await.unwrap();

    assert_eq!(completed, 1);
    let track = TrackStore::new(temp.child("a.srt").path(), MarkupConfig::default()).load().unwrap();
    assert!(track.last_is_closed());
    assert_eq!(std::fs::read_to_string(temp.child("notes.txt").path()).unwrap(), "not subtitles");
}

#[tokio::test]
async fn test_reformat_preview_writes_output_only() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("raw.srt");
    input.write_str(RAW_SRT).unwrap();
    let output = temp.child("units.srt");

    let oracle = Arc::new(EchoOracle::new());
    let track = workflow(&oracle).reformat_preview(input.path(), Some(output.path())).unwrap();

    assert_eq!(track.len(), 4);
    assert_eq!(std::fs::read_to_string(input.path()).unwrap(), RAW_SRT);
    let written = TrackStore::new(output.path(), MarkupConfig::default()).load().unwrap();
    assert_eq!(written, track);
    assert_eq!(oracle.calls(), 0);
}
