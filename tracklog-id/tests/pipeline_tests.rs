//! Identification pipeline integration tests
//!
//! Runs the full pipeline over the fake transcoder and scripted recognizer:
//! windows of 2 s, so a 7 s upload becomes segments [0,2] [2,4] [4,6] [6,7].

mod helpers;

use axum::body::Bytes;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use helpers::{
    create_test_db, hit, seed_media_file, service_error, test_pipeline, test_settings,
    FakeTranscoder, ScriptedRecognizer,
};
use tracklog_id::db::{media_files, tracks, SqliteCatalog};
use tracklog_id::models::{FileRef, MediaFileStatus, RecognitionStatus};
use tracklog_id::services::{
    DispatchError, Dispatcher, IdentificationPipeline, MediaUpload, PipelineError,
};

fn upload(file_id: Option<i64>) -> MediaUpload {
    MediaUpload {
        bytes: Bytes::from_static(b"not really an mp3"),
        file_name: Some("../evening show.mp3".to_string()),
        file_id,
    }
}

fn scratch_is_empty(dir: &TempDir) -> bool {
    std::fs::read_dir(dir.path())
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

/// Four windows: two halves of Song A, a service error, Song B without timecode
fn four_window_script() -> ScriptedRecognizer {
    ScriptedRecognizer::new()
        .with_answer(
            0,
            json!({
                "status": "success",
                "result": {"title": "Song A", "artist": "Artist One", "timecode": "00:00-00:02"}
            }),
        )
        .with_answer(
            1,
            json!({
                "status": "success",
                "result": {"title": "song a", "isrc": "USUM71703861", "timecode": "00:00-00:02"}
            }),
        )
        .with_answer(2, service_error("Recognition failed: limit reached"))
        .with_answer(
            3,
            json!({
                "status": "success",
                "result": {"title": "Song B", "artist": "Artist Two", "song_link": "https://lis.tn/songb"}
            }),
        )
}

#[tokio::test]
async fn test_full_run_produces_consolidated_report() {
    let scratch = TempDir::new().unwrap();
    let transcoder = Arc::new(FakeTranscoder::new(7.0));
    let recognizer = Arc::new(four_window_script());
    let pipeline = test_pipeline(transcoder.clone(), recognizer.clone(), 2, scratch.path());

    let report = pipeline.process(upload(None)).await.unwrap();

    assert_eq!(report.segment_count, 4);
    assert_eq!(report.window_seconds, 2);
    assert_eq!(report.recognizer.return_fields, "timecode,apple_music,deezer");
    assert!(report.file.is_none());
    assert!(report.combined_path.is_none());

    // Song A spans two windows and merges; Song B falls back to the default span
    assert_eq!(report.track_count, 2);
    let song_a = &report.tracks[0];
    assert_eq!(song_a.title.as_deref(), Some("Song A"));
    assert_eq!(song_a.artist.as_deref(), Some("Artist One"));
    assert_eq!(song_a.isrc.as_deref(), Some("USUM71703861"));
    assert_eq!((song_a.start_seconds, song_a.end_seconds), (0.0, 4.0));
    assert_eq!(song_a.start_timecode, "00:00");
    assert_eq!(song_a.end_timecode, "00:04");

    let song_b = &report.tracks[1];
    assert_eq!(song_b.title.as_deref(), Some("Song B"));
    assert_eq!((song_b.start_seconds, song_b.end_seconds), (6.0, 7.0));
    assert_eq!(song_b.link.as_deref(), Some("https://lis.tn/songb"));

    assert_eq!(recognizer.started(), 4);
    assert_eq!(recognizer.missing_files(), 0);
    assert!(scratch_is_empty(&scratch), "scratch space should be removed");
}

#[tokio::test]
async fn test_error_segment_reported_and_later_segments_continue() {
    let scratch = TempDir::new().unwrap();
    let pipeline = test_pipeline(
        Arc::new(FakeTranscoder::new(7.0)),
        Arc::new(four_window_script()),
        2,
        scratch.path(),
    );

    let report = pipeline.process(upload(None)).await.unwrap();

    let statuses: Vec<_> = report.segments.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![
            RecognitionStatus::SuccessMatch,
            RecognitionStatus::SuccessMatch,
            RecognitionStatus::Error,
            RecognitionStatus::SuccessMatch,
        ]
    );
    assert_eq!(
        report.segments[2].payload["message"],
        "Recognition failed: limit reached"
    );

    let found: Vec<bool> = report.schedule.iter().map(|r| r.found).collect();
    assert_eq!(found, vec![true, true, false, true]);
    assert_eq!(report.schedule[2].start_seconds, 4.0);
    assert_eq!(report.schedule[2].end_seconds, 6.0);
    assert_eq!(report.schedule[3].end_seconds, 7.0);
    assert_eq!(report.schedule[3].segment, "segment-003.wav");
}

#[tokio::test]
async fn test_no_matches_yield_empty_track_list() {
    let scratch = TempDir::new().unwrap();
    let pipeline = test_pipeline(
        Arc::new(FakeTranscoder::new(5.0)),
        Arc::new(ScriptedRecognizer::new()),
        2,
        scratch.path(),
    );

    let report = pipeline.process(upload(None)).await.unwrap();

    assert_eq!(report.segment_count, 3);
    assert_eq!(report.track_count, 0);
    assert!(report.tracks.is_empty());
    assert!(report
        .segments
        .iter()
        .all(|s| s.status == RecognitionStatus::SuccessNoMatch));
    assert!(report.schedule.iter().all(|r| !r.found));
}

#[tokio::test]
async fn test_answers_kept_in_segment_order_when_completion_order_differs() {
    let scratch = TempDir::new().unwrap();
    // Earlier segments finish last
    let recognizer = ScriptedRecognizer::new()
        .with_answer(0, hit("First", "00:00-00:01"))
        .with_answer(3, hit("Last", "00:00-00:01"))
        .with_segment_delay(0, Duration::from_millis(120))
        .with_segment_delay(1, Duration::from_millis(80))
        .with_segment_delay(2, Duration::from_millis(40));
    let pipeline = test_pipeline(
        Arc::new(FakeTranscoder::new(8.0)),
        Arc::new(recognizer),
        4,
        scratch.path(),
    );

    let report = pipeline.process(upload(None)).await.unwrap();

    let indices: Vec<usize> = report.segments.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    let titles: Vec<_> = report.tracks.iter().map(|t| t.title.clone().unwrap()).collect();
    assert_eq!(titles, vec!["First", "Last"]);
    assert_eq!(report.tracks[1].start_seconds, 6.0);
}

#[tokio::test]
async fn test_empty_upload_rejected_before_any_work() {
    let scratch = TempDir::new().unwrap();
    let transcoder = Arc::new(FakeTranscoder::new(7.0));
    let pipeline = test_pipeline(
        transcoder.clone(),
        Arc::new(ScriptedRecognizer::new()),
        2,
        scratch.path(),
    );

    let result = pipeline
        .process(MediaUpload {
            bytes: Bytes::new(),
            file_name: None,
            file_id: None,
        })
        .await;

    assert!(matches!(result, Err(PipelineError::EmptyUpload)));
    assert!(transcoder.work_dirs().is_empty());
}

#[tokio::test]
async fn test_transcode_failure_aborts_and_cleans_scratch() {
    let scratch = TempDir::new().unwrap();
    let transcoder = Arc::new(FakeTranscoder::failing());
    let recognizer = Arc::new(ScriptedRecognizer::new());
    let pipeline = test_pipeline(transcoder.clone(), recognizer.clone(), 2, scratch.path());

    let err = pipeline.process(upload(None)).await.unwrap_err();

    assert!(matches!(err, PipelineError::Transcode(_)));
    assert_eq!(err.code(), "TRANSCODE_FAILED");
    assert!(err.to_string().contains("Invalid data found"));
    assert_eq!(recognizer.started(), 0);

    let work_dirs = transcoder.work_dirs();
    assert_eq!(work_dirs.len(), 1);
    assert!(!work_dirs[0].exists());
    assert!(scratch_is_empty(&scratch));
}

#[tokio::test]
async fn test_each_run_gets_its_own_scratch_space() {
    let scratch = TempDir::new().unwrap();
    let transcoder = Arc::new(FakeTranscoder::new(3.0));
    let pipeline = Arc::new(test_pipeline(
        transcoder.clone(),
        Arc::new(ScriptedRecognizer::new().with_delay(Duration::from_millis(20))),
        2,
        scratch.path(),
    ));

    let (a, b) = tokio::join!(pipeline.process(upload(None)), pipeline.process(upload(None)));
    assert_ne!(a.unwrap().run_id, b.unwrap().run_id);

    let work_dirs = transcoder.work_dirs();
    assert_eq!(work_dirs.len(), 2);
    assert_ne!(work_dirs[0], work_dirs[1]);
    assert!(work_dirs.iter().all(|d| d.starts_with(scratch.path())));
    assert!(scratch_is_empty(&scratch));
}

#[tokio::test]
async fn test_shut_down_dispatcher_refuses_runs() {
    let scratch = TempDir::new().unwrap();
    let recognizer = Arc::new(ScriptedRecognizer::new());
    let pipeline = test_pipeline(
        Arc::new(FakeTranscoder::new(4.0)),
        recognizer.clone(),
        2,
        scratch.path(),
    );
    pipeline.dispatcher().shutdown();

    let err = pipeline.process(upload(None)).await.unwrap_err();

    assert!(matches!(err, PipelineError::Dispatch(DispatchError::ShutDown)));
    assert_eq!(err.code(), "DISPATCH_UNAVAILABLE");
    assert_eq!(recognizer.started(), 0);
    assert!(scratch_is_empty(&scratch));
}

#[tokio::test]
async fn test_combined_audio_kept_when_enabled() {
    let scratch = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let combined_dir = root.path().join("combined");

    let settings = tracklog_id::config::IdentifySettings {
        keep_combined_audio: true,
        ..test_settings(scratch.path())
    };
    let pipeline = IdentificationPipeline::new(
        Arc::new(FakeTranscoder::new(5.0)),
        Arc::new(ScriptedRecognizer::new()),
        Arc::new(Dispatcher::new(2)),
        settings,
    )
    .with_combined_dir(combined_dir.clone());

    let report = pipeline.process(upload(None)).await.unwrap();

    let combined = report.combined_path.expect("combined path reported");
    let combined = std::path::PathBuf::from(combined);
    assert!(combined.starts_with(&combined_dir));
    assert!(combined.exists());
    assert_eq!(helpers::wav_seconds(&combined).unwrap(), 5.0);
    assert!(scratch_is_empty(&scratch));
}

#[tokio::test]
async fn test_successful_run_persists_detections_and_status() {
    let scratch = TempDir::new().unwrap();
    let pool = create_test_db().await;
    let file_id = seed_media_file(&pool, "evening show.mp3").await;

    let pipeline = test_pipeline(
        Arc::new(FakeTranscoder::new(7.0)),
        Arc::new(four_window_script()),
        2,
        scratch.path(),
    )
    .with_catalog(Arc::new(SqliteCatalog::new(pool.clone())));

    let report = pipeline.process(upload(Some(file_id))).await.unwrap();
    assert_eq!(report.file, Some(FileRef { id: file_id }));

    let file = media_files::get_media_file(&pool, file_id).await.unwrap().unwrap();
    assert_eq!(file.status, MediaFileStatus::NotFinished);
    assert_eq!(file.duration_seconds, Some(7.0));

    let detections = tracks::detections_for_file(&pool, file_id).await.unwrap();
    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0].title.as_deref(), Some("Song A"));
    assert_eq!(detections[0].isrc.as_deref(), Some("USUM71703861"));
    assert_eq!((detections[1].start_seconds, detections[1].end_seconds), (6.0, 7.0));

    assert_eq!(tracks::list_tracks(&pool).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_run_marks_file_as_error() {
    let scratch = TempDir::new().unwrap();
    let pool = create_test_db().await;
    let file_id = seed_media_file(&pool, "broken.mp3").await;

    let pipeline = test_pipeline(
        Arc::new(FakeTranscoder::failing()),
        Arc::new(ScriptedRecognizer::new()),
        2,
        scratch.path(),
    )
    .with_catalog(Arc::new(SqliteCatalog::new(pool.clone())));

    assert!(pipeline.process(upload(Some(file_id))).await.is_err());

    let file = media_files::get_media_file(&pool, file_id).await.unwrap().unwrap();
    assert_eq!(file.status, MediaFileStatus::Error);
    assert!(tracks::detections_for_file(&pool, file_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_file_id_does_not_fail_the_run() {
    let scratch = TempDir::new().unwrap();
    let pool = create_test_db().await;

    let pipeline = test_pipeline(
        Arc::new(FakeTranscoder::new(7.0)),
        Arc::new(four_window_script()),
        2,
        scratch.path(),
    )
    .with_catalog(Arc::new(SqliteCatalog::new(pool.clone())));

    let report = pipeline.process(upload(Some(999))).await.unwrap();

    assert_eq!(report.track_count, 2);
    assert!(tracks::list_tracks(&pool).await.unwrap().is_empty());
}
