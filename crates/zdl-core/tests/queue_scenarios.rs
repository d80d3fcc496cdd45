//! Integration tests: the engine driving the scheduler and workers against a
//! scripted fetcher.

mod common;

use common::{engine, test_config, wait_until, FakeFetcher, FakeTranscoder};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::tempdir;
use zdl_core::fetcher::Fetcher;
use zdl_core::store::{ClearFilter, ProgressStatus, QueueStatus, TaskKind, TaskRequest};
use zdl_core::{Engine, ErrorKind};

fn titled(url: &str, title: &str) -> TaskRequest {
    TaskRequest {
        title: Some(title.to_string()),
        ..TaskRequest::new(url)
    }
}

#[tokio::test]
async fn single_slot_admits_one_and_drains_backlog_in_order() {
    let dir = tempdir().unwrap();
    let (fetcher, gate) = FakeFetcher::gated();
    let (engine, _) = engine(test_config(dir.path(), 1), fetcher);

    let ids: Vec<_> = ["one", "two", "three"]
        .iter()
        .map(|t| {
            engine
                .enqueue(titled(&format!("https://example.com/watch?v={t}"), t))
                .unwrap()
                .task_id
        })
        .collect();
    engine.start().await;

    let counts = engine.queue().counts;
    assert_eq!(counts.downloading, 1);
    assert_eq!(counts.pending, 2);
    assert_eq!(engine.task(&ids[0]).unwrap().queue_status, QueueStatus::Downloading);

    gate.add_permits(1);
    wait_until(|| engine.queue().counts.completed == 1).await;
    wait_until(|| engine.queue().counts.downloading == 1).await;

    let counts = engine.queue().counts;
    assert_eq!(counts.pending, 1);
    assert_eq!(engine.task(&ids[1]).unwrap().queue_status, QueueStatus::Downloading);
    assert_eq!(engine.task(&ids[2]).unwrap().queue_status, QueueStatus::Pending);

    let record = engine.progress(&ids[0]).unwrap();
    assert_eq!(record.status, ProgressStatus::Completed);
    assert_eq!(record.filename.as_deref(), Some("one.mp4"));
    assert!(record.error.is_none());

    gate.add_permits(2);
    wait_until(|| engine.queue().counts.completed == 3).await;
}

#[tokio::test]
async fn removing_a_running_task_is_rejected() {
    let dir = tempdir().unwrap();
    let (fetcher, gate) = FakeFetcher::gated();
    let (engine, _) = engine(test_config(dir.path(), 1), fetcher);

    let id = engine
        .enqueue(titled("https://example.com/watch?v=a", "a"))
        .unwrap()
        .task_id;
    engine.start().await;
    let before = engine.progress(&id).unwrap();

    let err = engine.remove(&id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(engine.task(&id).unwrap().queue_status, QueueStatus::Downloading);
    assert_eq!(engine.progress(&id).unwrap(), before);

    gate.add_permits(1);
    wait_until(|| engine.queue().counts.completed == 1).await;
    engine.remove(&id).unwrap();
    assert!(engine.progress(&id).is_none());
}

#[tokio::test]
async fn zero_exit_without_output_is_an_error() {
    let dir = tempdir().unwrap();
    let fetcher = FakeFetcher {
        produce: None,
        ..FakeFetcher::default()
    };
    let (engine, _) = engine(test_config(dir.path(), 2), fetcher);

    let id = engine
        .enqueue(TaskRequest::new("https://example.com/watch?v=x"))
        .unwrap()
        .task_id;
    wait_until(|| engine.progress(&id).is_some_and(|r| r.is_terminal())).await;

    let record = engine.progress(&id).unwrap();
    assert_eq!(record.status, ProgressStatus::Error);
    assert_eq!(record.error.as_deref(), Some("output file not found"));
    assert!(record.filename.is_none());
    assert_eq!(engine.task(&id).unwrap().queue_status, QueueStatus::Error);
}

#[tokio::test]
async fn start_with_empty_backlog_is_a_no_op() {
    let dir = tempdir().unwrap();
    let (engine, fetcher) = engine(test_config(dir.path(), 2), FakeFetcher::default());

    assert_eq!(engine.start().await, 0);
    assert_eq!(engine.start().await, 0);
    assert_eq!(engine.queue().counts.total(), 0);
    assert_eq!(fetcher.runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn running_count_never_exceeds_the_cap() {
    let dir = tempdir().unwrap();
    let (fetcher, gate) = FakeFetcher::gated();
    let (engine, _) = engine(test_config(dir.path(), 2), fetcher);

    for i in 0..6 {
        engine
            .enqueue(titled(&format!("https://example.com/watch?v={i}"), &format!("t{i}")))
            .unwrap();
    }
    engine.start().await;
    assert_eq!(engine.queue().counts.downloading, 2);

    for done in 1..=6 {
        gate.add_permits(1);
        wait_until(|| engine.queue().counts.completed == done).await;
        assert!(engine.queue().counts.downloading <= 2);
    }
    assert_eq!(engine.queue().counts.pending, 0);
}

#[tokio::test]
async fn raising_the_cap_admits_more_without_preemption() {
    let dir = tempdir().unwrap();
    let (fetcher, gate) = FakeFetcher::gated();
    let (engine, _) = engine(test_config(dir.path(), 1), fetcher);

    for i in 0..4 {
        engine
            .enqueue(titled(&format!("https://example.com/watch?v={i}"), &format!("t{i}")))
            .unwrap();
    }
    engine.start().await;
    assert_eq!(engine.queue().counts.downloading, 1);

    let settings = engine.update_settings(Some(9), None);
    assert_eq!(settings.max_concurrent, 5);
    engine.start().await;
    assert_eq!(engine.queue().counts.downloading, 4);

    engine.update_settings(Some(1), Some("137".to_string()));
    assert_eq!(engine.queue().counts.downloading, 4);
    assert_eq!(engine.settings().default_quality, "137");

    gate.add_permits(4);
    wait_until(|| engine.queue().counts.completed == 4).await;
}

#[tokio::test]
async fn nonzero_exit_reports_marked_diagnostics() {
    let dir = tempdir().unwrap();
    let fetcher = FakeFetcher {
        exit_code: 1,
        diagnostics: "WARNING: retrying\nERROR: Video unavailable".to_string(),
        ..FakeFetcher::default()
    };
    let (engine, _) = engine(test_config(dir.path(), 1), fetcher);
    let id = engine
        .enqueue(TaskRequest::new("https://example.com/watch?v=gone"))
        .unwrap()
        .task_id;
    wait_until(|| engine.progress(&id).is_some_and(|r| r.is_terminal())).await;

    let record = engine.progress(&id).unwrap();
    assert_eq!(record.status, ProgressStatus::Error);
    assert_eq!(record.error.as_deref(), Some("ERROR: Video unavailable"));
}

#[tokio::test]
async fn nonzero_exit_without_marker_uses_exit_code() {
    let dir = tempdir().unwrap();
    let fetcher = FakeFetcher {
        exit_code: 3,
        diagnostics: "killed".to_string(),
        ..FakeFetcher::default()
    };
    let (engine, _) = engine(test_config(dir.path(), 1), fetcher);
    let id = engine
        .enqueue(TaskRequest::new("https://example.com/watch?v=k"))
        .unwrap()
        .task_id;
    wait_until(|| engine.progress(&id).is_some_and(|r| r.is_terminal())).await;
    assert_eq!(
        engine.progress(&id).unwrap().error.as_deref(),
        Some("download failed with code 3")
    );
}

#[tokio::test]
async fn diagnostic_lines_drive_progress() {
    let dir = tempdir().unwrap();
    let (mut fetcher, gate) = FakeFetcher::gated();
    fetcher.lines = vec![
        "[download]  45.0% of 10.00MiB at 2.00MiB/s ETA 00:03".to_string(),
        "[download] Destination: clip.f137.mp4".to_string(),
    ];
    let (engine, _) = engine(test_config(dir.path(), 1), fetcher);
    let id = engine
        .enqueue(TaskRequest::new("https://example.com/watch?v=p"))
        .unwrap()
        .task_id;

    wait_until(|| {
        engine
            .progress(&id)
            .is_some_and(|r| r.status == ProgressStatus::Processing)
    })
    .await;
    let record = engine.progress(&id).unwrap();
    assert_eq!(record.progress, 45);
    assert_eq!(record.downloaded.as_deref(), Some("10.00MiB"));
    assert_eq!(record.speed.as_deref(), Some("2.00MiB/s"));

    gate.add_permits(1);
    wait_until(|| engine.progress(&id).is_some_and(|r| r.is_terminal())).await;
    let record = engine.progress(&id).unwrap();
    assert_eq!(record.status, ProgressStatus::Completed);
    assert_eq!(record.progress, 100);
    assert_eq!(record.filename.as_deref(), Some("Sample Clip.mp4"));
}

#[tokio::test]
async fn failed_title_probe_falls_back_to_task_id() {
    let dir = tempdir().unwrap();
    let fetcher = FakeFetcher {
        title: None,
        ..FakeFetcher::default()
    };
    let (engine, fetcher) = engine(test_config(dir.path(), 1), fetcher);
    let id = engine
        .enqueue(TaskRequest::new("https://example.com/watch?v=t"))
        .unwrap()
        .task_id;
    wait_until(|| engine.progress(&id).is_some_and(|r| r.is_terminal())).await;

    assert_eq!(fetcher.probes.load(Ordering::SeqCst), 1);
    let expected = format!("{id}.mp4");
    assert_eq!(engine.progress(&id).unwrap().filename.as_deref(), Some(expected.as_str()));
    assert!(dir.path().join(&expected).is_file());
}

#[tokio::test]
async fn missing_transcoder_fails_without_running() {
    let dir = tempdir().unwrap();
    let fetcher = Arc::new(FakeFetcher::default());
    let engine = Engine::with_collaborators(
        test_config(dir.path(), 1),
        Arc::clone(&fetcher) as Arc<dyn Fetcher>,
        Arc::new(FakeTranscoder(false)),
    );
    let first = engine
        .enqueue(TaskRequest::new("https://example.com/watch?v=1"))
        .unwrap()
        .task_id;
    let second = engine
        .enqueue(TaskRequest::new("https://example.com/watch?v=2"))
        .unwrap()
        .task_id;
    wait_until(|| engine.queue().counts.error == 2).await;

    for id in [&first, &second] {
        let record = engine.progress(id).unwrap();
        assert_eq!(record.error.as_deref(), Some("fake-transcoder is not installed"));
    }
    assert_eq!(fetcher.runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn panicking_worker_releases_its_slot() {
    let dir = tempdir().unwrap();
    let fetcher = FakeFetcher {
        panic_on_run: true,
        ..FakeFetcher::default()
    };
    let (engine, _) = engine(test_config(dir.path(), 1), fetcher);
    let first = engine
        .enqueue(TaskRequest::new("https://example.com/watch?v=1"))
        .unwrap()
        .task_id;
    let second = engine
        .enqueue(TaskRequest::new("https://example.com/watch?v=2"))
        .unwrap()
        .task_id;
    wait_until(|| engine.queue().counts.error == 2).await;

    for id in [&first, &second] {
        assert_eq!(
            engine.progress(id).unwrap().error.as_deref(),
            Some("worker aborted")
        );
    }
}

#[tokio::test]
async fn download_timeout_fails_the_task() {
    let dir = tempdir().unwrap();
    let (fetcher, _gate) = FakeFetcher::gated();
    let mut config = test_config(dir.path(), 1);
    config.download_timeout_secs = Some(1);
    let (engine, _) = engine(config, fetcher);
    let id = engine
        .enqueue(TaskRequest::new("https://example.com/watch?v=slow"))
        .unwrap()
        .task_id;
    wait_until(|| engine.progress(&id).is_some_and(|r| r.is_terminal())).await;
    assert_eq!(
        engine.progress(&id).unwrap().error.as_deref(),
        Some("download timed out")
    );
}

#[tokio::test]
async fn playlist_task_completes_with_directory_name() {
    let dir = tempdir().unwrap();
    let (engine, _) = engine(test_config(dir.path(), 1), FakeFetcher::default());
    let id = engine
        .enqueue(TaskRequest {
            kind: TaskKind::Playlist,
            title: Some("Mix: Vol/1".to_string()),
            ..TaskRequest::new("https://example.com/playlist?list=PL1")
        })
        .unwrap()
        .task_id;
    wait_until(|| engine.progress(&id).is_some_and(|r| r.is_terminal())).await;

    let record = engine.progress(&id).unwrap();
    assert_eq!(record.status, ProgressStatus::Completed);
    assert_eq!(record.filename.as_deref(), Some("Mix Vol1"));
    assert!(dir.path().join("Mix Vol1").join("1 - first.mp4").is_file());
    assert_eq!(
        engine.output_path(&id).await,
        Some(dir.path().join("Mix Vol1"))
    );
}

#[tokio::test]
async fn cleanup_deletes_output_and_forgets_the_task() {
    let dir = tempdir().unwrap();
    let (engine, _) = engine(test_config(dir.path(), 1), FakeFetcher::default());
    let id = engine
        .enqueue(titled("https://example.com/watch?v=c", "keep me"))
        .unwrap()
        .task_id;
    wait_until(|| engine.progress(&id).is_some_and(|r| r.is_terminal())).await;

    let path = engine.output_path(&id).await.unwrap();
    assert_eq!(path, dir.path().join("keep me.mp4"));
    engine.cleanup(&id).await.unwrap();
    assert!(!path.exists());
    assert!(engine.task(&id).is_none());
    assert_eq!(
        engine.cleanup(&id).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn clear_failed_keeps_other_tasks() {
    let dir = tempdir().unwrap();
    let fetcher = FakeFetcher {
        produce: None,
        ..FakeFetcher::default()
    };
    let (engine, _) = engine(test_config(dir.path(), 1), fetcher);
    engine
        .enqueue(TaskRequest::new("https://example.com/watch?v=f"))
        .unwrap();
    wait_until(|| engine.queue().counts.error == 1).await;

    assert_eq!(engine.clear(ClearFilter::Completed), 0);
    assert_eq!(engine.clear(ClearFilter::Failed), 1);
    assert_eq!(engine.queue().counts.total(), 0);
}

#[tokio::test]
async fn empty_url_is_rejected_before_a_task_exists() {
    let dir = tempdir().unwrap();
    let (engine, _) = engine(test_config(dir.path(), 1), FakeFetcher::default());
    let err = engine.enqueue(TaskRequest::new("   ")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(engine.queue().counts.total(), 0);
}
