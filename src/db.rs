use crate::models::Label;
use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA: &str = include_str!("../db/schema.sql");

pub fn open_or_create(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    run_migrations(&conn)?;
    Ok(conn)
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Save raw credential JSON for a provider, with optional client_id/client_secret
pub fn save_credential_raw(
    conn: &Connection,
    provider: &str,
    json_blob: &str,
    client_id: Option<&str>,
    client_secret: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO credentials (provider, token_json, client_id, client_secret, last_refreshed) VALUES (?1, ?2, ?3, ?4, strftime('%s','now')) ON CONFLICT(provider) DO UPDATE SET token_json = excluded.token_json, client_id = excluded.client_id, client_secret = excluded.client_secret, last_refreshed = strftime('%s','now')",
        params![provider, json_blob, client_id, client_secret],
    )?;
    Ok(())
}

/// Replace only the token JSON of a provider, keeping its client credentials.
pub fn update_credential_token(conn: &Connection, provider: &str, json_blob: &str) -> Result<()> {
    let updated = conn.execute(
        "UPDATE credentials SET token_json = ?2, last_refreshed = strftime('%s','now') WHERE provider = ?1",
        params![provider, json_blob],
    )?;
    if updated == 0 {
        save_credential_raw(conn, provider, json_blob, None, None)?;
    }
    Ok(())
}

/// Load raw credential JSON and client_id/client_secret for a provider
pub fn load_credential_with_client(conn: &Connection, provider: &str) -> Result<Option<(String, Option<String>, Option<String>)>> {
    let mut stmt = conn.prepare("SELECT token_json, client_id, client_secret FROM credentials WHERE provider = ?1 LIMIT 1")?;
    let row = stmt
        .query_row(params![provider], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?, r.get::<_, Option<String>>(2)?))
        })
        .optional()?;
    Ok(row)
}

/// Register a label and the playlist curated for it. Fails if the label exists.
pub fn add_label(conn: &Connection, name: &str, playlist_id: &str) -> Result<()> {
    if get_label(conn, name)?.is_some() {
        return Err(anyhow!("label {} already exists", name));
    }
    conn.execute(
        "INSERT INTO label (name, playlist_id) VALUES (?1, ?2)",
        params![name, playlist_id],
    )?;
    Ok(())
}

pub fn get_label(conn: &Connection, name: &str) -> Result<Option<Label>> {
    let mut stmt = conn.prepare("SELECT name, playlist_id FROM label WHERE name = ?1 LIMIT 1")?;
    let row = stmt
        .query_row(params![name], |r| {
            Ok(Label {
                name: r.get(0)?,
                playlist_id: r.get(1)?,
            })
        })
        .optional()?;
    Ok(row)
}

pub fn list_labels(conn: &Connection) -> Result<Vec<Label>> {
    let mut stmt = conn.prepare("SELECT name, playlist_id FROM label ORDER BY name")?;
    let rows = stmt.query_map([], |r| {
        Ok(Label {
            name: r.get(0)?,
            playlist_id: r.get(1)?,
        })
    })?;
    let mut v = Vec::new();
    for r in rows {
        v.push(r?);
    }
    Ok(v)
}

/// Track IDs recorded for a snapshot, in playlist order. Empty when unknown.
pub fn get_snapshot(conn: &Connection, snapshot_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT track_id FROM snapshot WHERE id = ?1 ORDER BY position")?;
    let rows = stmt.query_map(params![snapshot_id], |r| r.get::<_, String>(0))?;
    let mut v = Vec::new();
    for r in rows {
        v.push(r?);
    }
    Ok(v)
}

pub fn snapshot_is_in_db(conn: &Connection, snapshot_id: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM snapshot WHERE id = ?1 LIMIT 1")?;
    let found = stmt.query_row(params![snapshot_id], |_| Ok(())).optional()?;
    Ok(found.is_some())
}

/// Record the tracklist of a playlist revision. A snapshot id already present
/// is left untouched. Returns whether rows were written.
pub fn upload_snapshot(conn: &mut Connection, playlist_id: &str, snapshot_id: &str, track_ids: &[String]) -> Result<bool> {
    if snapshot_is_in_db(conn, snapshot_id)? {
        return Ok(false);
    }
    let now = Utc::now().timestamp();
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO snapshot (id, position, playlist_id, track_id, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (position, track_id) in track_ids.iter().enumerate() {
            stmt.execute(params![snapshot_id, position as i64, playlist_id, track_id, now])?;
        }
    }
    tx.commit()?;
    Ok(true)
}
