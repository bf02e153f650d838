//! Per-track annotations from the secondary store.

use super::models::{non_empty, Annotation, LyricsPresence, Track};
use super::pool::{placeholders, PooledConnection};
use crate::error::{MetadataError, Result};
use crate::metrics;
use rusqlite::{params, params_from_iter, Row};
use std::collections::HashMap;
use tracing::warn;

pub(crate) const LANGUAGES_FIELD: &str = "language_of_performance";
pub(crate) const ROLES_FIELD: &str = "artist_roles";

/// Parses a JSON array of strings stored in a text column.
///
/// NULL, empty text and JSON `null` all mean "no list".
pub fn parse_json_list(field: &'static str, raw: Option<&str>) -> Result<Vec<String>> {
    let raw = match raw.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Ok(Vec::new()),
    };
    serde_json::from_str::<Option<Vec<String>>>(raw)
        .map(Option::unwrap_or_default)
        .map_err(|source| MetadataError::MalformedPayload { field, source })
}

/// Like [`parse_json_list`], but a malformed payload yields an empty list.
fn tolerant_json_list(track_id: &str, field: &'static str, raw: Option<&str>) -> Vec<String> {
    match parse_json_list(field, raw) {
        Ok(list) => list,
        Err(e) => {
            warn!("Dropping {} for track {}: {}", field, track_id, e);
            metrics::record_malformed_payload(field);
            Vec::new()
        }
    }
}

fn parse_annotation_row(row: &Row) -> rusqlite::Result<(String, Annotation)> {
    let track_id: String = row.get(0)?;
    let has_lyrics: Option<i64> = row.get(1)?;
    let languages: Option<String> = row.get(4)?;
    let roles: Option<String> = row.get(5)?;

    let annotation = Annotation {
        has_lyrics: LyricsPresence::from(has_lyrics.map(|v| v == 1)),
        original_title: non_empty(row.get(2)?),
        version_title: non_empty(row.get(3)?),
        languages: tolerant_json_list(&track_id, LANGUAGES_FIELD, languages.as_deref()),
        artist_roles: tolerant_json_list(&track_id, ROLES_FIELD, roles.as_deref()),
    };
    Ok((track_id, annotation))
}

pub(crate) fn fetch_annotation(
    conn: &PooledConnection,
    track_id: &str,
) -> Result<Option<Annotation>> {
    let row = conn.query_optional(
        concat!(
            "SELECT ",
            annotation_columns!(),
            " FROM track_files WHERE track_id = ?1"
        ),
        params![track_id],
        parse_annotation_row,
    )?;
    Ok(row.map(|(_, annotation)| annotation))
}

/// One query for the whole id set.
pub(crate) fn fetch_annotations(
    conn: &PooledConnection,
    track_ids: &[&str],
) -> Result<HashMap<String, Annotation>> {
    if track_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = conn.query_in(
        &format!(
            "SELECT {} FROM track_files WHERE track_id IN ({})",
            annotation_columns!(),
            placeholders(track_ids.len())
        ),
        params_from_iter(track_ids.iter()),
        parse_annotation_row,
    )?;
    Ok(rows.into_iter().collect())
}

/// Overlays annotations onto already-built tracks, matched by track id.
///
/// Tracks without an entry keep their unknown/empty defaults.
pub fn merge_annotations(tracks: &mut [Track], annotations: &HashMap<String, Annotation>) {
    for track in tracks.iter_mut() {
        if let Some(annotation) = annotations.get(&track.id) {
            track.apply_annotation(annotation);
        }
    }
}
