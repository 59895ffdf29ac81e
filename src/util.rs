use anyhow::{Context, Result};
use std::path::Path;

/// Spotify URI for a bare track id. Values that already are URIs pass through.
pub fn track_uri(track_id: &str) -> String {
    if track_id.starts_with("spotify:") {
        track_id.to_string()
    } else {
        format!("spotify:track:{}", track_id)
    }
}

/// Bare track id from a `spotify:track:` URI or an open.spotify.com link.
pub fn track_id_from_uri(uri: &str) -> &str {
    let tail = uri.rsplit(|c: char| c == ':' || c == '/').next().unwrap_or(uri);
    tail.split('?').next().unwrap_or(tail)
}

/// Read a tracklist file: one track id (or URI) per line, blank lines and
/// `#` comments skipped.
pub fn read_track_ids(path: &Path) -> Result<Vec<String>> {
    let s = std::fs::read_to_string(path).with_context(|| format!("reading tracklist {}", path.display()))?;
    Ok(s.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| track_id_from_uri(l).to_string())
        .collect())
}
