use std::fs::File;
use std::io::Write;
use std::time::Duration;
use tempfile::tempdir;

use label_playlist_sync::config::Config;
use label_playlist_sync::db;
use label_playlist_sync::plan::SyncMode;

fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("cfg.toml");
    let mut f = File::create(&cfg_path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    (td, cfg_path)
}

#[test]
fn config_from_path_parses_toml() {
    let (_td, cfg_path) = write_config(
        r#"
db_path = "/tmp/test.db"
log_dir = "/tmp"
sync_mode = "reorder"
max_batch_size = 50
max_retries = 3
retry_base_delay_ms = 250
spotify_user_id = "someone"
"#,
    );
    let cfg = Config::from_path(&cfg_path).expect("parse config");
    assert_eq!(cfg.db_path.to_str().unwrap(), "/tmp/test.db");
    assert_eq!(cfg.sync_mode, SyncMode::Reorder);
    assert_eq!(cfg.max_batch_size, 50);
    assert_eq!(cfg.spotify_user_id.as_deref(), Some("someone"));
    let retry = cfg.retry_policy();
    assert_eq!(retry.max_retries, 3);
    assert_eq!(retry.delay_for(2), Duration::from_millis(1000));
}

#[test]
fn config_defaults() {
    let (_td, cfg_path) = write_config(r#"db_path = "/tmp/test.db""#);
    let cfg = Config::from_path(&cfg_path).expect("parse config");
    assert_eq!(cfg.sync_mode, SyncMode::Diff);
    assert_eq!(cfg.max_batch_size, 100);
    assert_eq!(cfg.max_retries, 10);
    assert_eq!(cfg.retry_policy().delay_for(0), Duration::from_secs(1));
    assert_eq!(cfg.request_timeout(), Duration::from_secs(60));
    assert!(cfg.spotify_user_id.is_none());
}

#[test]
fn config_rejects_oversized_batches() {
    let (_td, cfg_path) = write_config(
        r#"
db_path = "/tmp/test.db"
max_batch_size = 101
"#,
    );
    let err = Config::from_path(&cfg_path).unwrap_err();
    assert!(err.to_string().contains("max_batch_size"));
}

#[test]
fn config_rejects_unknown_mode() {
    let (_td, cfg_path) = write_config(
        r#"
db_path = "/tmp/test.db"
sync_mode = "shuffle"
"#,
    );
    assert!(Config::from_path(&cfg_path).is_err());
}

#[test]
fn run_migrations_creates_tables() {
    let td = tempdir().unwrap();
    let db_path = td.path().join("test.db");
    let conn = rusqlite::Connection::open(&db_path).unwrap();
    db::run_migrations(&conn).expect("run migrations");
    // running twice must be harmless
    db::run_migrations(&conn).expect("run migrations again");
    for table in ["credentials", "label", "snapshot"] {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")
            .unwrap();
        let mut rows = stmt.query([table]).unwrap();
        assert!(rows.next().unwrap().is_some(), "{} table should exist after migrations", table);
    }
}

#[test]
fn labels_are_unique_and_sorted() {
    let td = tempdir().unwrap();
    let conn = db::open_or_create(&td.path().join("nested").join("test.db")).unwrap();
    db::add_label(&conn, "Warp", "pl_warp").unwrap();
    db::add_label(&conn, "Hyperdub", "pl_hdb").unwrap();
    assert!(db::add_label(&conn, "Warp", "pl_other").is_err());

    let names: Vec<String> = db::list_labels(&conn).unwrap().into_iter().map(|l| l.name).collect();
    assert_eq!(names, vec!["Hyperdub", "Warp"]);
    assert_eq!(db::get_label(&conn, "Warp").unwrap().unwrap().playlist_id, "pl_warp");
    assert!(db::get_label(&conn, "Planet Mu").unwrap().is_none());
}

#[test]
fn snapshots_are_written_once() {
    let td = tempdir().unwrap();
    let mut conn = db::open_or_create(&td.path().join("test.db")).unwrap();
    let first: Vec<String> = vec!["a".into(), "b".into()];
    let second: Vec<String> = vec!["z".into()];

    assert!(db::upload_snapshot(&mut conn, "pl", "snap1", &first).unwrap());
    assert!(!db::upload_snapshot(&mut conn, "pl", "snap1", &second).unwrap());
    assert!(db::snapshot_is_in_db(&conn, "snap1").unwrap());
    assert_eq!(db::get_snapshot(&conn, "snap1").unwrap(), first);
}

#[test]
fn token_update_keeps_client_credentials() {
    let td = tempdir().unwrap();
    let conn = db::open_or_create(&td.path().join("test.db")).unwrap();
    db::save_credential_raw(&conn, "spotify", "{}", Some("cid"), Some("secret")).unwrap();
    db::update_credential_token(&conn, "spotify", r#"{"access_token":"t"}"#).unwrap();

    let (json, client_id, client_secret) = db::load_credential_with_client(&conn, "spotify").unwrap().unwrap();
    assert_eq!(json, r#"{"access_token":"t"}"#);
    assert_eq!(client_id.as_deref(), Some("cid"));
    assert_eq!(client_secret.as_deref(), Some("secret"));
}
