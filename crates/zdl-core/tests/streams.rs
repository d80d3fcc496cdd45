//! Integration tests for progress and discovery subscriptions.

mod common;

use common::{engine, test_config, wait_until, FakeFetcher};
use futures::StreamExt;
use tempfile::tempdir;
use zdl_core::discovery::SessionStatus;
use zdl_core::publish::{DiscoveryEvent, TaskEvent};
use zdl_core::store::{ProgressStatus, TaskRequest};
use zdl_core::ErrorKind;

#[tokio::test]
async fn subscribing_to_a_missing_task_yields_unknown_once() {
    let dir = tempdir().unwrap();
    let (engine, _) = engine(test_config(dir.path(), 1), FakeFetcher::default());
    let events: Vec<_> = engine.subscribe("no-such-task").collect().await;
    assert_eq!(events, vec![TaskEvent::Unknown]);
}

#[tokio::test]
async fn progress_stream_ends_on_terminal_snapshot() {
    let dir = tempdir().unwrap();
    let (fetcher, gate) = FakeFetcher::gated();
    let (engine, _) = engine(test_config(dir.path(), 1), fetcher);
    let id = engine
        .enqueue(TaskRequest::new("https://example.com/watch?v=s"))
        .unwrap()
        .task_id;
    engine.start().await;

    let mut stream = Box::pin(engine.subscribe(&id));
    match stream.next().await {
        Some(TaskEvent::Snapshot(r)) => assert!(!r.is_terminal()),
        other => panic!("unexpected {other:?}"),
    }

    gate.add_permits(1);
    let rest: Vec<_> = stream.collect().await;
    match rest.last() {
        Some(TaskEvent::Snapshot(r)) => {
            assert_eq!(r.status, ProgressStatus::Completed);
            assert_eq!(r.filename.as_deref(), Some("Sample Clip.mp4"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(rest
        .iter()
        .all(|e| matches!(e, TaskEvent::Snapshot(_))));
}

#[tokio::test]
async fn discovery_stops_at_max_items() {
    let dir = tempdir().unwrap();
    let fetcher = FakeFetcher {
        entries: 8,
        ..FakeFetcher::default()
    };
    let (engine, _) = engine(test_config(dir.path(), 1), fetcher);

    let session = engine
        .start_discovery("https://example.com/playlist?list=PL1", Some(5))
        .unwrap();
    let events: Vec<_> = engine.subscribe_discovery(&session).collect().await;

    assert_eq!(events.len(), 6);
    for (i, event) in events[..5].iter().enumerate() {
        match event {
            DiscoveryEvent::Video { index, entry } => {
                assert_eq!(*index, i);
                assert_eq!(entry.id, format!("v{i}"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(events[5], DiscoveryEvent::Completed { count: 5 });

    let snapshot = engine.discovery_session(&session).unwrap();
    assert_eq!(snapshot.items.len(), 5);
    assert_eq!(snapshot.status, SessionStatus::Completed);

    let removed = engine.remove_discovery(&session).unwrap();
    assert_eq!(removed.items.len(), 5);
    assert!(engine.discovery_session(&session).is_none());
    assert_eq!(
        engine.remove_discovery(&session).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn cancelled_discovery_ends_in_error() {
    let dir = tempdir().unwrap();
    let (mut fetcher, _gate) = FakeFetcher::gated();
    fetcher.entries = 8;
    let (engine, _) = engine(test_config(dir.path(), 1), fetcher);

    let session = engine
        .start_discovery("https://example.com/playlist?list=PL2", Some(5))
        .unwrap();
    wait_until(|| {
        engine
            .discovery_session(&session)
            .is_some_and(|s| s.items.len() == 1)
    })
    .await;

    engine.cancel_discovery(&session).unwrap();
    let events: Vec<_> = engine.subscribe_discovery(&session).collect().await;
    assert_eq!(
        events.last(),
        Some(&DiscoveryEvent::Error {
            message: "cancelled".to_string()
        })
    );
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, DiscoveryEvent::Video { .. }))
            .count(),
        1
    );
    assert_eq!(
        engine.cancel_discovery(&session).unwrap_err().kind(),
        ErrorKind::InvalidState
    );
}

#[tokio::test]
async fn unknown_discovery_session() {
    let dir = tempdir().unwrap();
    let (engine, _) = engine(test_config(dir.path(), 1), FakeFetcher::default());
    let events: Vec<_> = engine.subscribe_discovery("missing").collect().await;
    assert_eq!(events, vec![DiscoveryEvent::Unknown]);
    assert_eq!(
        engine.cancel_discovery("missing").unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn empty_discovery_url_is_rejected() {
    let dir = tempdir().unwrap();
    let (engine, _) = engine(test_config(dir.path(), 1), FakeFetcher::default());
    assert_eq!(
        engine.start_discovery(" ", None).unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
}
