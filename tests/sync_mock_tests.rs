use label_playlist_sync::api::mock::MockProvider;
use label_playlist_sync::api::Provider;
use label_playlist_sync::db;
use label_playlist_sync::models::Label;
use label_playlist_sync::plan::SyncMode;
use label_playlist_sync::retry::{is_transient, RetryPolicy};
use label_playlist_sync::sync::{record_playlist_snapshot, set_playlist_tracks, update_label_playlist, SyncOptions};
use std::time::Duration;
use tempfile::tempdir;

fn ids(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|s| s.to_string()).collect()
}

fn options(mode: SyncMode, max_retries: u32) -> SyncOptions {
    SyncOptions {
        mode,
        max_batch_size: 2,
        retry: RetryPolicy::new(max_retries, Duration::ZERO),
    }
}

#[tokio::test]
async fn fetches_live_tracks_without_snapshot() {
    let provider = MockProvider::new().with_playlist("p1", ids(&["a", "b", "c"]));
    let target = ids(&["d", "c", "a", "b"]);

    let report = set_playlist_tracks(&provider, "p1", &target, None, &options(SyncMode::Reorder, 0))
        .await
        .unwrap();

    assert_eq!(provider.tracks("p1").unwrap(), target);
    assert_eq!(provider.calls().first().map(String::as_str), Some("playlist_tracks"));
    assert_eq!(report.added, 1);
    assert_eq!(report.removed, 0);
    assert_eq!(report.reorders, 2);
}

#[tokio::test]
async fn known_snapshot_skips_the_fetch() {
    let provider = MockProvider::new().with_playlist("p1", ids(&["a", "b"]));
    let target = ids(&["x", "a", "b"]);

    let report = set_playlist_tracks(&provider, "p1", &target, Some(ids(&["a", "b"])), &options(SyncMode::Diff, 0))
        .await
        .unwrap();

    assert_eq!(provider.tracks("p1").unwrap(), target);
    assert_eq!(provider.calls(), vec!["add_tracks".to_string()]);
    assert_eq!(report.api_calls, 1);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let provider = MockProvider::new().with_playlist("p1", ids(&["a", "b", "c", "d", "e"]));
    let target = ids(&["e", "d", "c", "b", "a"]);
    provider.fail_next(2);

    set_playlist_tracks(&provider, "p1", &target, None, &options(SyncMode::Reorder, 3))
        .await
        .unwrap();

    assert_eq!(provider.tracks("p1").unwrap(), target);
    let calls = provider.calls();
    assert_eq!(&calls[..3], &["playlist_tracks", "playlist_tracks", "playlist_tracks"]);
}

#[tokio::test]
async fn gives_up_after_retry_budget() {
    let provider = MockProvider::new().with_playlist("p1", ids(&["a"]));
    provider.fail_next(10);

    let err = set_playlist_tracks(&provider, "p1", &ids(&["b"]), None, &options(SyncMode::Diff, 2))
        .await
        .unwrap_err();

    assert!(is_transient(&err));
    assert_eq!(provider.calls().len(), 3);
    assert_eq!(provider.tracks("p1").unwrap(), ids(&["a"]));
}

#[tokio::test]
async fn permanent_errors_are_not_retried() {
    let provider = MockProvider::new();

    let err = set_playlist_tracks(&provider, "missing", &ids(&["a"]), None, &options(SyncMode::Diff, 5))
        .await
        .unwrap_err();

    assert!(!is_transient(&err));
    assert_eq!(provider.calls().len(), 1);
}

#[tokio::test]
async fn duplicate_in_snapshot_fails_before_writing() {
    let provider = MockProvider::new().with_playlist("p1", ids(&["a", "b"]));

    let stale = Some(ids(&["a", "a", "b"]));
    let res = set_playlist_tracks(&provider, "p1", &ids(&["b", "a"]), stale, &options(SyncMode::Reorder, 0)).await;

    assert!(res.is_err());
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn label_update_records_snapshots() {
    let td = tempdir().unwrap();
    let db_path = td.path().join("sync.db");
    db::open_or_create(&db_path).unwrap();

    let provider = MockProvider::new().with_playlist("p1", ids(&["a", "b", "c"]));
    let label = Label {
        name: "Warp".into(),
        playlist_id: "p1".into(),
    };
    let opts = options(SyncMode::Reorder, 0);

    let first_target = ids(&["n1", "a", "b", "c"]);
    let first = update_label_playlist(&db_path, &provider, &label, &first_target, &opts).await.unwrap();
    assert_eq!(first, provider.snapshot_id("p1").await.unwrap());
    {
        let conn = db::open_or_create(&db_path).unwrap();
        assert_eq!(db::get_snapshot(&conn, &first).unwrap(), first_target);
    }
    assert!(provider.calls().iter().any(|c| c == "playlist_tracks"));

    // second run starts from the recorded snapshot
    let fetches_before = provider.calls().iter().filter(|c| *c == "playlist_tracks").count();
    let second_target = ids(&["n2", "n1", "a", "b", "c"]);
    let second = update_label_playlist(&db_path, &provider, &label, &second_target, &opts).await.unwrap();
    let fetches_after = provider.calls().iter().filter(|c| *c == "playlist_tracks").count();
    assert_eq!(fetches_before, fetches_after);
    assert_ne!(first, second);
    assert_eq!(provider.tracks("p1").unwrap(), second_target);
}

#[tokio::test]
async fn unchanged_playlist_keeps_its_snapshot() {
    let td = tempdir().unwrap();
    let db_path = td.path().join("sync.db");
    db::open_or_create(&db_path).unwrap();

    let tracks = ids(&["a", "b"]);
    let provider = MockProvider::new().with_playlist("p1", tracks.clone());
    let label = Label {
        name: "Ninja Tune".into(),
        playlist_id: "p1".into(),
    };

    let before = provider.snapshot_id("p1").await.unwrap();
    let after = update_label_playlist(&db_path, &provider, &label, &tracks, &options(SyncMode::Diff, 0))
        .await
        .unwrap();
    assert_eq!(before, after);
    let conn = db::open_or_create(&db_path).unwrap();
    assert!(db::snapshot_is_in_db(&conn, &after).unwrap());
}

#[tokio::test]
async fn record_snapshot_is_idempotent() {
    let td = tempdir().unwrap();
    let db_path = td.path().join("sync.db");
    db::open_or_create(&db_path).unwrap();

    let provider = MockProvider::new().with_playlist("p1", ids(&["a", "b", "c"]));
    let retry = RetryPolicy::new(0, Duration::ZERO);

    let sid = record_playlist_snapshot(&db_path, &provider, "p1", &retry).await.unwrap();
    let again = record_playlist_snapshot(&db_path, &provider, "p1", &retry).await.unwrap();
    assert_eq!(sid, again);
    assert_eq!(provider.calls().iter().filter(|c| *c == "playlist_tracks").count(), 1);

    let conn = db::open_or_create(&db_path).unwrap();
    assert_eq!(db::get_snapshot(&conn, &sid).unwrap(), ids(&["a", "b", "c"]));
}
