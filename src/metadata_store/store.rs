//! Store handle and single-entity resolution.
//!
//! A single lookup holds one catalog connection for its whole resolution and
//! issues one statement per relation per record. Batch assembly lives in
//! `batch.rs` and must produce the same graphs.

use super::annotations::fetch_annotation;
use super::models::{
    non_empty, Album, AlbumType, Annotation, Artist, Image, ReleaseDatePrecision, RowId, Track,
};
use super::pool::{PooledConnection, QueryScope, ReadPool, StorePragmas};
use super::schema::{ANNOTATIONS_FILE_NAME, ANNOTATIONS_SCHEMA, CATALOG_SCHEMA};
use crate::error::{MetadataError, Result};
use crate::metrics;
use rusqlite::{params, Row};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_READ_POOL_SIZE: usize = 8;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub catalog_path: PathBuf,
    pub annotations_path: PathBuf,
    /// Connections per store, also the size of the worker pool
    pub read_pool_size: usize,
    pub pragmas: StorePragmas,
}

impl StoreConfig {
    /// Defaults for a catalog, with the annotation store expected next to it.
    pub fn for_catalog<P: AsRef<Path>>(catalog_path: P) -> Self {
        let catalog_path = catalog_path.as_ref().to_path_buf();
        Self {
            annotations_path: annotations_path_for(&catalog_path),
            catalog_path,
            read_pool_size: DEFAULT_READ_POOL_SIZE,
            pragmas: StorePragmas::default(),
        }
    }
}

pub fn annotations_path_for(catalog_path: &Path) -> PathBuf {
    catalog_path
        .parent()
        .map(|dir| dir.join(ANNOTATIONS_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(ANNOTATIONS_FILE_NAME))
}

pub struct MetadataStore {
    pub(super) catalog: ReadPool,
    pub(super) annotations: Option<ReadPool>,
    pub(super) workers: rayon::ThreadPool,
}

// =============================================================================
// Row parsing
// =============================================================================

pub(super) const TRACK_COLUMN_COUNT: usize = 10;

/// Parses the columns produced by `track_columns!()` starting at `base`.
pub(super) fn parse_track(row: &Row, base: usize) -> rusqlite::Result<(RowId, Track)> {
    let rowid: RowId = row.get(base)?;
    let track = Track {
        id: row.get(base + 1)?,
        name: row.get(base + 2)?,
        isrc: non_empty(row.get(base + 3)?),
        duration_ms: row.get::<_, Option<i64>>(base + 4)?.unwrap_or(0),
        explicit: row.get::<_, Option<bool>>(base + 5)?.unwrap_or(false),
        track_number: row.get::<_, Option<i32>>(base + 6)?.unwrap_or(0),
        disc_number: row.get::<_, Option<i32>>(base + 7)?.unwrap_or(0),
        popularity: row.get::<_, Option<i32>>(base + 8)?.unwrap_or(0),
        preview_url: non_empty(row.get(base + 9)?),
        album: None,
        artists: Vec::new(),
        original_title: None,
        version_title: None,
        has_lyrics: Default::default(),
        languages: Vec::new(),
        artist_roles: Vec::new(),
    };
    Ok((rowid, track))
}

/// Parses the columns produced by `album_columns!()` starting at `base`.
pub(super) fn parse_album(row: &Row, base: usize) -> rusqlite::Result<(RowId, Album)> {
    let rowid: RowId = row.get(base)?;
    let album_type: Option<String> = row.get(base + 3)?;
    let precision: Option<String> = row.get(base + 6)?;
    let album = Album {
        id: row.get(base + 1)?,
        name: row.get(base + 2)?,
        album_type: AlbumType::from_db_str(album_type.as_deref().unwrap_or_default()),
        label: row.get::<_, Option<String>>(base + 4)?.unwrap_or_default(),
        release_date: row.get::<_, Option<String>>(base + 5)?.unwrap_or_default(),
        release_date_precision: ReleaseDatePrecision::from_db_str(
            precision.as_deref().unwrap_or_default(),
        ),
        upc: non_empty(row.get(base + 7)?),
        total_tracks: row.get::<_, Option<i32>>(base + 8)?.unwrap_or(0),
        copyright_c: non_empty(row.get(base + 9)?),
        copyright_p: non_empty(row.get(base + 10)?),
        images: Vec::new(),
        artists: Vec::new(),
    };
    Ok((rowid, album))
}

/// Parses the columns produced by `artist_columns!()` starting at `base`.
pub(super) fn parse_artist(row: &Row, base: usize) -> rusqlite::Result<(RowId, Artist)> {
    let rowid: RowId = row.get(base)?;
    let artist = Artist {
        id: row.get(base + 1)?,
        name: row.get(base + 2)?,
        followers: row.get::<_, Option<i64>>(base + 3)?.unwrap_or(0),
        popularity: row.get::<_, Option<i32>>(base + 4)?.unwrap_or(0),
        genres: Vec::new(),
        images: Vec::new(),
    };
    Ok((rowid, artist))
}

pub(super) fn parse_image(row: &Row, base: usize) -> rusqlite::Result<Image> {
    Ok(Image {
        url: row.get(base)?,
        width: row.get(base + 1)?,
        height: row.get(base + 2)?,
    })
}

/// A track joined with its album, before any relation is attached.
pub(super) struct TrackAlbumRow {
    pub track_rowid: RowId,
    pub track: Track,
    pub album_rowid: RowId,
    pub album: Album,
}

pub(super) fn parse_track_album_row(row: &Row) -> rusqlite::Result<TrackAlbumRow> {
    let (track_rowid, track) = parse_track(row, 0)?;
    let (album_rowid, album) = parse_album(row, TRACK_COLUMN_COUNT)?;
    Ok(TrackAlbumRow {
        track_rowid,
        track,
        album_rowid,
        album,
    })
}

/// Sub-relation failures degrade to an empty value. Cancellation never does.
pub(super) fn tolerate<T: Default>(relation: &'static str, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_cancellation() => Err(e),
        Err(e) => {
            warn!("Failed to fetch {}, continuing without it: {}", relation, e);
            metrics::record_degraded_fetch(relation);
            Ok(T::default())
        }
    }
}

// =============================================================================
// Relation queries, one record at a time
// =============================================================================

fn fetch_album_images(conn: &PooledConnection, album_rowid: RowId) -> Result<Vec<Image>> {
    conn.query_all(
        "SELECT DISTINCT url, width, height FROM album_images
         WHERE album_rowid = ?1
         ORDER BY width DESC, height DESC, url",
        params![album_rowid],
        |row| parse_image(row, 0),
    )
}

fn fetch_artist_images(conn: &PooledConnection, artist_rowid: RowId) -> Result<Vec<Image>> {
    conn.query_all(
        "SELECT DISTINCT url, width, height FROM artist_images
         WHERE artist_rowid = ?1
         ORDER BY width DESC, height DESC, url",
        params![artist_rowid],
        |row| parse_image(row, 0),
    )
}

fn fetch_artist_genres(conn: &PooledConnection, artist_rowid: RowId) -> Result<Vec<String>> {
    conn.query_all(
        "SELECT genre FROM artist_genres WHERE artist_rowid = ?1 ORDER BY genre",
        params![artist_rowid],
        |row| row.get(0),
    )
}

/// Artists with a non-null position on the album, by lowest position.
fn fetch_album_artists(conn: &PooledConnection, album_rowid: RowId) -> Result<Vec<(RowId, Artist)>> {
    conn.query_all(
        concat!(
            "SELECT ",
            artist_columns!(),
            ", MIN(aa.index_in_album) AS idx
             FROM artist_albums aa
             JOIN artists ar ON ar.rowid = aa.artist_rowid
             WHERE aa.album_rowid = ?1 AND aa.index_in_album IS NOT NULL
             GROUP BY ar.rowid
             ORDER BY idx, ar.rowid"
        ),
        params![album_rowid],
        |row| parse_artist(row, 0),
    )
}

fn fetch_track_artists(conn: &PooledConnection, track_rowid: RowId) -> Result<Vec<(RowId, Artist)>> {
    conn.query_all(
        concat!(
            "SELECT ",
            artist_columns!(),
            " FROM track_artists ta
             JOIN artists ar ON ar.rowid = ta.artist_rowid
             WHERE ta.track_rowid = ?1
             ORDER BY ta.rowid"
        ),
        params![track_rowid],
        |row| parse_artist(row, 0),
    )
}

// =============================================================================
// Store
// =============================================================================

impl MetadataStore {
    /// Opens the catalog and, when available, the annotation store.
    ///
    /// The catalog is required. A missing or unusable annotation store only
    /// disables annotations.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        if !config.catalog_path.is_file() {
            return Err(MetadataError::Config(format!(
                "Catalog database not found: {:?}",
                config.catalog_path
            )));
        }

        let catalog = ReadPool::open(
            "catalog",
            &config.catalog_path,
            config.read_pool_size,
            config.pragmas,
        )?;
        {
            let scope = QueryScope::detached();
            let conn = catalog.acquire(&scope)?;
            CATALOG_SCHEMA
                .validate(conn.raw())
                .map_err(|e| {
                    MetadataError::Config(format!("Invalid {} database: {:#}", catalog.label(), e))
                })?;
        }

        let annotations = Self::open_annotations(config);

        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(config.read_pool_size)
            .thread_name(|i| format!("metadata-worker-{}", i))
            .build()
            .map_err(|e| MetadataError::Config(format!("Failed to start worker pool: {}", e)))?;

        info!(
            "Opened {} at {:?} with {} read connections, annotations {}",
            catalog.label(),
            config.catalog_path,
            catalog.size(),
            if annotations.is_some() {
                "enabled"
            } else {
                "disabled"
            }
        );

        Ok(Self {
            catalog,
            annotations,
            workers,
        })
    }

    fn open_annotations(config: &StoreConfig) -> Option<ReadPool> {
        let path = &config.annotations_path;
        if !path.is_file() {
            warn!(
                "Annotation store not found at {:?}, tracks will have no annotations",
                path
            );
            return None;
        }

        let pool = match ReadPool::open("annotations", path, config.read_pool_size, config.pragmas)
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!("Failed to open annotation store at {:?}: {}", path, e);
                return None;
            }
        };

        let scope = QueryScope::detached();
        let validated = pool.acquire(&scope).and_then(|conn| {
            ANNOTATIONS_SCHEMA
                .validate(conn.raw())
                .map_err(|e| MetadataError::Config(format!("{:#}", e)))
        });
        match validated {
            Ok(()) => Some(pool),
            Err(e) => {
                warn!("Ignoring {} store at {:?}: {}", pool.label(), path, e);
                None
            }
        }
    }

    pub fn has_annotations(&self) -> bool {
        self.annotations.is_some()
    }

    pub fn read_pool_size(&self) -> usize {
        self.catalog.size()
    }

    // =========================================================================
    // Single-entity resolution
    // =========================================================================

    pub fn resolve_track(&self, scope: &QueryScope, id: &str) -> Result<Option<Track>> {
        let conn = self.catalog.acquire(scope)?;
        let row = conn.query_optional(
            concat!(
                "SELECT ",
                track_columns!(),
                ", ",
                album_columns!(),
                " FROM tracks t
                 JOIN albums a ON t.album_rowid = a.rowid
                 WHERE t.id = ?1"
            ),
            params![id],
            parse_track_album_row,
        )?;
        match row {
            Some(row) => self.hydrate_track_row(&conn, row, true).map(Some),
            None => Ok(None),
        }
    }

    /// All tracks carrying the ISRC, most popular first.
    pub fn resolve_tracks_by_isrc(&self, scope: &QueryScope, isrc: &str) -> Result<Vec<Track>> {
        if isrc.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.catalog.acquire(scope)?;
        let rows = conn.query_all(
            concat!(
                "SELECT ",
                track_columns!(),
                ", ",
                album_columns!(),
                " FROM tracks t
                 JOIN albums a ON t.album_rowid = a.rowid
                 WHERE t.external_id_isrc = ?1
                 ORDER BY t.popularity DESC, t.rowid"
            ),
            params![isrc],
            parse_track_album_row,
        )?;
        rows.into_iter()
            .map(|row| self.hydrate_track_row(&conn, row, true))
            .collect()
    }

    pub fn resolve_artist(&self, scope: &QueryScope, id: &str) -> Result<Option<Artist>> {
        let conn = self.catalog.acquire(scope)?;
        let row = conn.query_optional(
            concat!("SELECT ", artist_columns!(), " FROM artists ar WHERE ar.id = ?1"),
            params![id],
            |row| parse_artist(row, 0),
        )?;
        match row {
            Some(row) => Ok(self.hydrate_artists(&conn, vec![row])?.pop()),
            None => Ok(None),
        }
    }

    pub fn resolve_album(&self, scope: &QueryScope, id: &str) -> Result<Option<Album>> {
        let conn = self.catalog.acquire(scope)?;
        let row = conn.query_optional(
            concat!("SELECT ", album_columns!(), " FROM albums a WHERE a.id = ?1"),
            params![id],
            |row| parse_album(row, 0),
        )?;
        match row {
            Some((rowid, album)) => self.hydrate_album(&conn, rowid, album).map(Some),
            None => Ok(None),
        }
    }

    /// Tracks of an album in disc and track order, without the nested album.
    ///
    /// An unknown album yields an empty list.
    pub fn resolve_album_tracks(&self, scope: &QueryScope, album_id: &str) -> Result<Vec<Track>> {
        let conn = self.catalog.acquire(scope)?;
        let rows = conn.query_all(
            concat!(
                "SELECT ",
                track_columns!(),
                ", ",
                album_columns!(),
                " FROM tracks t
                 JOIN albums a ON t.album_rowid = a.rowid
                 WHERE a.id = ?1
                 ORDER BY t.disc_number, t.track_number, t.rowid"
            ),
            params![album_id],
            parse_track_album_row,
        )?;
        rows.into_iter()
            .map(|row| self.hydrate_track_row(&conn, row, false))
            .collect()
    }

    // =========================================================================
    // Hydration
    // =========================================================================

    pub(super) fn hydrate_track_row(
        &self,
        conn: &PooledConnection,
        row: TrackAlbumRow,
        with_album: bool,
    ) -> Result<Track> {
        let TrackAlbumRow {
            track_rowid,
            mut track,
            album_rowid,
            album,
        } = row;

        if with_album {
            track.album = Some(self.hydrate_album(conn, album_rowid, album)?);
        }

        let artists = tolerate("track_artists", fetch_track_artists(conn, track_rowid))?;
        track.artists = self.hydrate_artists(conn, artists)?;

        if let Some(annotation) = self.lookup_annotation(conn.scope(), &track.id)? {
            track.apply_annotation(&annotation);
        }
        Ok(track)
    }

    fn hydrate_album(&self, conn: &PooledConnection, rowid: RowId, mut album: Album) -> Result<Album> {
        album.images = tolerate("album_images", fetch_album_images(conn, rowid))?;
        let artists = tolerate("album_artists", fetch_album_artists(conn, rowid))?;
        album.artists = self.hydrate_artists(conn, artists)?;
        Ok(album)
    }

    pub(super) fn hydrate_artists(
        &self,
        conn: &PooledConnection,
        artists: Vec<(RowId, Artist)>,
    ) -> Result<Vec<Artist>> {
        artists
            .into_iter()
            .map(|(rowid, mut artist)| {
                artist.genres = tolerate("artist_genres", fetch_artist_genres(conn, rowid))?;
                artist.images = tolerate("artist_images", fetch_artist_images(conn, rowid))?;
                Ok(artist)
            })
            .collect()
    }

    fn lookup_annotation(&self, scope: &QueryScope, track_id: &str) -> Result<Option<Annotation>> {
        let Some(pool) = &self.annotations else {
            return Ok(None);
        };
        tolerate(
            "annotations",
            pool.acquire(scope)
                .and_then(|conn| fetch_annotation(&conn, track_id)),
        )
    }
}
