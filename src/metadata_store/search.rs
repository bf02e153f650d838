//! Case-insensitive substring search over artist and track names.

use super::models::{Artist, Track};
use super::pool::QueryScope;
use super::store::{parse_artist, parse_track_album_row, MetadataStore};
use crate::error::Result;
use rusqlite::params;

/// Wraps a user query in `%...%`, escaping LIKE wildcards with `\`.
pub fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl MetadataStore {
    /// Artists whose name contains `query`, most followed first.
    pub fn search_artists(&self, scope: &QueryScope, query: &str, limit: usize) -> Result<Vec<Artist>> {
        let conn = self.catalog.acquire(scope)?;
        let rows = conn.query_all(
            concat!(
                "SELECT ",
                artist_columns!(),
                " FROM artists ar
                 WHERE ar.name LIKE ?1 ESCAPE '\\'
                 ORDER BY ar.followers_total DESC, ar.rowid
                 LIMIT ?2"
            ),
            params![like_pattern(query), limit as i64],
            |row| parse_artist(row, 0),
        )?;
        self.hydrate_artists(&conn, rows)
    }

    /// Tracks whose name contains `query`, most popular first, fully hydrated.
    pub fn search_tracks(&self, scope: &QueryScope, query: &str, limit: usize) -> Result<Vec<Track>> {
        let conn = self.catalog.acquire(scope)?;
        let rows = conn.query_all(
            concat!(
                "SELECT ",
                track_columns!(),
                ", ",
                album_columns!(),
                " FROM tracks t
                 JOIN albums a ON t.album_rowid = a.rowid
                 WHERE t.name LIKE ?1 ESCAPE '\\'
                 ORDER BY t.popularity DESC, t.rowid
                 LIMIT ?2"
            ),
            params![like_pattern(query), limit as i64],
            parse_track_album_row,
        )?;
        rows.into_iter()
            .map(|row| self.hydrate_track_row(&conn, row, true))
            .collect()
    }
}
