//! Batch assembly.
//!
//! ISRC batches are resolved with one IN-clause query per relation and
//! reassembled in memory, so the number of statements does not depend on
//! how many ids were requested:
//!
//! 1. tracks joined with albums (the only query whose failure is fatal)
//! 2. album images, 3. album artists, 4. track artists, 7. annotations,
//!    all four concurrently
//! 5. union of every artist rowid seen in 3 and 4
//! 6. genres and images for that union, concurrently
//! 8. reassembly
//!
//! Track, artist and album batches go through the single-entity resolver
//! per id instead, in parallel on the worker pool.

use super::annotations::{fetch_annotations, merge_annotations};
use super::models::{Album, Annotation, Artist, Image, RowId, Track};
use super::pool::{placeholders, PooledConnection, QueryScope};
use super::store::{
    parse_artist, parse_image, parse_track_album_row, tolerate, MetadataStore, TrackAlbumRow,
};
use crate::error::Result;
use rayon::prelude::*;
use rusqlite::params_from_iter;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, error};

/// Outcome of a per-id batch: what resolved, and which ids failed.
///
/// Ids that simply do not exist appear in neither.
#[derive(Debug)]
pub struct Partial<T> {
    pub items: HashMap<String, T>,
    pub failed: Vec<String>,
}

impl<T> Default for Partial<T> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> Partial<T> {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

type ArtistLinks = HashMap<RowId, Vec<(RowId, Artist)>>;

/// Distinct values in first-seen order.
fn unique<T, I>(values: I) -> Vec<T>
where
    T: Copy + Eq + std::hash::Hash,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    values.into_iter().filter(|v| seen.insert(*v)).collect()
}

fn group_by_key<K, V>(rows: Vec<(K, V)>) -> HashMap<K, Vec<V>>
where
    K: Eq + std::hash::Hash,
{
    let mut grouped: HashMap<K, Vec<V>> = HashMap::new();
    for (key, value) in rows {
        grouped.entry(key).or_default().push(value);
    }
    grouped
}

// =============================================================================
// Relation queries over id sets
// =============================================================================

fn fetch_album_images_batch(
    conn: &PooledConnection,
    album_rowids: &[RowId],
) -> Result<HashMap<RowId, Vec<Image>>> {
    let rows = conn.query_in(
        &format!(
            "SELECT DISTINCT album_rowid, url, width, height FROM album_images
             WHERE album_rowid IN ({})
             ORDER BY album_rowid, width DESC, height DESC, url",
            placeholders(album_rowids.len())
        ),
        params_from_iter(album_rowids.iter()),
        |row| Ok((row.get::<_, RowId>(0)?, parse_image(row, 1)?)),
    )?;
    Ok(group_by_key(rows))
}

fn fetch_artist_images_batch(
    conn: &PooledConnection,
    artist_rowids: &[RowId],
) -> Result<HashMap<RowId, Vec<Image>>> {
    let rows = conn.query_in(
        &format!(
            "SELECT DISTINCT artist_rowid, url, width, height FROM artist_images
             WHERE artist_rowid IN ({})
             ORDER BY artist_rowid, width DESC, height DESC, url",
            placeholders(artist_rowids.len())
        ),
        params_from_iter(artist_rowids.iter()),
        |row| Ok((row.get::<_, RowId>(0)?, parse_image(row, 1)?)),
    )?;
    Ok(group_by_key(rows))
}

fn fetch_artist_genres_batch(
    conn: &PooledConnection,
    artist_rowids: &[RowId],
) -> Result<HashMap<RowId, Vec<String>>> {
    let rows = conn.query_in(
        &format!(
            "SELECT artist_rowid, genre FROM artist_genres
             WHERE artist_rowid IN ({})
             ORDER BY artist_rowid, genre",
            placeholders(artist_rowids.len())
        ),
        params_from_iter(artist_rowids.iter()),
        |row| Ok((row.get::<_, RowId>(0)?, row.get::<_, String>(1)?)),
    )?;
    Ok(group_by_key(rows))
}

/// Per album: artists with a non-null position, by lowest position.
fn fetch_album_artists_batch(
    conn: &PooledConnection,
    album_rowids: &[RowId],
) -> Result<ArtistLinks> {
    let rows = conn.query_in(
        &format!(
            "SELECT aa.album_rowid, {}, MIN(aa.index_in_album) AS idx
             FROM artist_albums aa
             JOIN artists ar ON ar.rowid = aa.artist_rowid
             WHERE aa.album_rowid IN ({}) AND aa.index_in_album IS NOT NULL
             GROUP BY aa.album_rowid, ar.rowid
             ORDER BY aa.album_rowid, idx, ar.rowid",
            artist_columns!(),
            placeholders(album_rowids.len())
        ),
        params_from_iter(album_rowids.iter()),
        |row| Ok((row.get::<_, RowId>(0)?, parse_artist(row, 1)?)),
    )?;
    Ok(group_by_key(rows))
}

fn fetch_track_artists_batch(
    conn: &PooledConnection,
    track_rowids: &[RowId],
) -> Result<ArtistLinks> {
    let rows = conn.query_in(
        &format!(
            "SELECT ta.track_rowid, {}
             FROM track_artists ta
             JOIN artists ar ON ar.rowid = ta.artist_rowid
             WHERE ta.track_rowid IN ({})
             ORDER BY ta.track_rowid, ta.rowid",
            artist_columns!(),
            placeholders(track_rowids.len())
        ),
        params_from_iter(track_rowids.iter()),
        |row| Ok((row.get::<_, RowId>(0)?, parse_artist(row, 1)?)),
    )?;
    Ok(group_by_key(rows))
}

// =============================================================================
// Assembly
// =============================================================================

impl MetadataStore {
    /// Resolves every track carrying one of the ISRCs, keyed by ISRC.
    ///
    /// ISRCs with no track are absent from the result. Each list is ordered
    /// like [`MetadataStore::resolve_tracks_by_isrc`].
    pub fn batch_resolve_by_isrcs(
        &self,
        scope: &QueryScope,
        isrcs: &[String],
    ) -> Result<HashMap<String, Vec<Track>>> {
        let wanted: Vec<&str> = isrcs
            .iter()
            .map(String::as_str)
            .filter(|isrc| !isrc.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if wanted.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = {
            let conn = self.catalog.acquire(scope)?;
            conn.query_in(
                &format!(
                    "SELECT {}, {}
                     FROM tracks t
                     JOIN albums a ON t.album_rowid = a.rowid
                     WHERE t.external_id_isrc IN ({})
                     ORDER BY t.external_id_isrc, t.popularity DESC, t.rowid",
                    track_columns!(),
                    album_columns!(),
                    placeholders(wanted.len())
                ),
                params_from_iter(wanted.iter()),
                parse_track_album_row,
            )?
        };
        if rows.is_empty() {
            return Ok(HashMap::new());
        }

        let album_rowids = unique(rows.iter().map(|r| r.album_rowid));
        let track_rowids = unique(rows.iter().map(|r| r.track_rowid));
        let track_ids = unique(rows.iter().map(|r| r.track.id.as_str()));

        let ((album_images, album_artists), (track_artists, annotations)) =
            self.workers.install(|| {
                rayon::join(
                    || {
                        rayon::join(
                            || {
                                self.fetch_catalog_relation(scope, "album_images", |conn| {
                                    fetch_album_images_batch(conn, &album_rowids)
                                })
                            },
                            || {
                                self.fetch_catalog_relation(scope, "album_artists", |conn| {
                                    fetch_album_artists_batch(conn, &album_rowids)
                                })
                            },
                        )
                    },
                    || {
                        rayon::join(
                            || {
                                self.fetch_catalog_relation(scope, "track_artists", |conn| {
                                    fetch_track_artists_batch(conn, &track_rowids)
                                })
                            },
                            || self.fetch_annotation_set(scope, &track_ids),
                        )
                    },
                )
            });
        let album_images = album_images?;
        let album_artists = album_artists?;
        let track_artists = track_artists?;
        let annotations = annotations?;

        let artist_rowids = unique(
            album_artists
                .values()
                .chain(track_artists.values())
                .flatten()
                .map(|(rowid, _)| *rowid),
        );

        let (genres, artist_images) = if artist_rowids.is_empty() {
            (Ok(HashMap::new()), Ok(HashMap::new()))
        } else {
            self.workers.install(|| {
                rayon::join(
                    || {
                        self.fetch_catalog_relation(scope, "artist_genres", |conn| {
                            fetch_artist_genres_batch(conn, &artist_rowids)
                        })
                    },
                    || {
                        self.fetch_catalog_relation(scope, "artist_images", |conn| {
                            fetch_artist_images_batch(conn, &artist_rowids)
                        })
                    },
                )
            })
        };
        let genres = genres?;
        let artist_images = artist_images?;
        scope.check()?;

        debug!(
            "Assembled {} tracks for {} ISRCs in {} statements",
            rows.len(),
            wanted.len(),
            scope.round_trips()
        );

        let hydrate = |links: Option<&Vec<(RowId, Artist)>>| -> Vec<Artist> {
            links
                .map(|links| {
                    links
                        .iter()
                        .map(|(rowid, artist)| Artist {
                            genres: genres.get(rowid).cloned().unwrap_or_default(),
                            images: artist_images.get(rowid).cloned().unwrap_or_default(),
                            ..artist.clone()
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut result: HashMap<String, Vec<Track>> = HashMap::new();
        for row in rows {
            let TrackAlbumRow {
                track_rowid,
                mut track,
                album_rowid,
                album,
            } = row;
            track.album = Some(Album {
                images: album_images.get(&album_rowid).cloned().unwrap_or_default(),
                artists: hydrate(album_artists.get(&album_rowid)),
                ..album
            });
            track.artists = hydrate(track_artists.get(&track_rowid));

            let isrc = track.isrc.clone().unwrap_or_default();
            result.entry(isrc).or_default().push(track);
        }
        for tracks in result.values_mut() {
            merge_annotations(tracks, &annotations);
        }
        Ok(result)
    }

    fn fetch_catalog_relation<T, F>(
        &self,
        scope: &QueryScope,
        relation: &'static str,
        fetch: F,
    ) -> Result<T>
    where
        T: Default,
        F: FnOnce(&PooledConnection) -> Result<T>,
    {
        tolerate(
            relation,
            self.catalog.acquire(scope).and_then(|conn| fetch(&conn)),
        )
    }

    fn fetch_annotation_set(
        &self,
        scope: &QueryScope,
        track_ids: &[&str],
    ) -> Result<HashMap<String, Annotation>> {
        let Some(pool) = &self.annotations else {
            return Ok(HashMap::new());
        };
        tolerate(
            "annotations",
            pool.acquire(scope)
                .and_then(|conn| fetch_annotations(&conn, track_ids)),
        )
    }

    // =========================================================================
    // Per-id batches
    // =========================================================================

    pub fn batch_resolve_tracks(&self, scope: &QueryScope, ids: &[String]) -> Result<Partial<Track>> {
        self.resolve_each(scope, "track", ids, |id| self.resolve_track(scope, id))
    }

    pub fn batch_resolve_artists(
        &self,
        scope: &QueryScope,
        ids: &[String],
    ) -> Result<Partial<Artist>> {
        self.resolve_each(scope, "artist", ids, |id| self.resolve_artist(scope, id))
    }

    pub fn batch_resolve_albums(&self, scope: &QueryScope, ids: &[String]) -> Result<Partial<Album>> {
        self.resolve_each(scope, "album", ids, |id| self.resolve_album(scope, id))
    }

    /// Resolves ids in parallel. A failing id is logged and reported in
    /// [`Partial::failed`]; cancellation aborts the whole batch.
    fn resolve_each<T, F>(
        &self,
        scope: &QueryScope,
        kind: &'static str,
        ids: &[String],
        resolve: F,
    ) -> Result<Partial<T>>
    where
        T: Send,
        F: Fn(&str) -> Result<Option<T>> + Sync,
    {
        let ids = unique(ids.iter().map(String::as_str));
        if ids.is_empty() {
            return Ok(Partial::default());
        }
        scope.check()?;

        let outcomes: Vec<(&str, Result<Option<T>>)> = self
            .workers
            .install(|| ids.par_iter().map(|id| (*id, resolve(id))).collect());

        let mut partial = Partial::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(Some(item)) => {
                    partial.items.insert(id.to_string(), item);
                }
                Ok(None) => {}
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    error!("Failed to resolve {} {}: {}", kind, id, e);
                    partial.failed.push(id.to_string());
                }
            }
        }
        Ok(partial)
    }
}
