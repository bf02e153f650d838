//! Table layouts the engine reads from.
//!
//! Both stores are produced by an external ingestion pipeline. These
//! definitions are used to validate a store on open and to build fixtures.
//! Primary keys are integer rowids, public lookups go through the text ids.

use crate::sqlite_column;
use crate::sqlite_persistence::{SqlType, Table, VersionedSchema};

/// File name of the annotation store, expected next to the catalog.
pub const ANNOTATIONS_FILE_NAME: &str = "track_files.sqlite3";

// =============================================================================
// Catalog store
// =============================================================================

const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("id", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("followers_total", &SqlType::Integer),
        sqlite_column!("popularity", &SqlType::Integer),
    ],
    indices: &[("idx_artists_id", "id")],
};

const ALBUMS_TABLE: Table = Table {
    name: "albums",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("id", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("album_type", &SqlType::Text), // 'album', 'single', 'compilation'
        sqlite_column!("label", &SqlType::Text),
        sqlite_column!("release_date", &SqlType::Text), // '2023-05-15', '2023-05', '2023'
        sqlite_column!("release_date_precision", &SqlType::Text), // 'day', 'month', 'year'
        sqlite_column!("external_id_upc", &SqlType::Text),
        sqlite_column!("total_tracks", &SqlType::Integer),
        sqlite_column!("copyright_c", &SqlType::Text),
        sqlite_column!("copyright_p", &SqlType::Text),
    ],
    indices: &[("idx_albums_id", "id")],
};

const TRACKS_TABLE: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("id", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("album_rowid", &SqlType::Integer, non_null = true),
        sqlite_column!("track_number", &SqlType::Integer),
        sqlite_column!("disc_number", &SqlType::Integer),
        sqlite_column!("duration_ms", &SqlType::Integer),
        sqlite_column!("explicit", &SqlType::Integer),
        sqlite_column!("popularity", &SqlType::Integer),
        sqlite_column!("external_id_isrc", &SqlType::Text),
        sqlite_column!("preview_url", &SqlType::Text),
    ],
    indices: &[
        ("idx_tracks_id", "id"),
        ("idx_tracks_album", "album_rowid"),
        ("idx_tracks_isrc", "external_id_isrc"),
    ],
};

const TRACK_ARTISTS_TABLE: Table = Table {
    name: "track_artists",
    columns: &[
        sqlite_column!("track_rowid", &SqlType::Integer, non_null = true),
        sqlite_column!("artist_rowid", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_track_artists_track", "track_rowid")],
};

/// Artist-album relationships. `index_in_album` is NULL for rows that only
/// record an appearance and must not be listed among the album's artists.
const ARTIST_ALBUMS_TABLE: Table = Table {
    name: "artist_albums",
    columns: &[
        sqlite_column!("artist_rowid", &SqlType::Integer, non_null = true),
        sqlite_column!("album_rowid", &SqlType::Integer, non_null = true),
        sqlite_column!("index_in_album", &SqlType::Integer),
    ],
    indices: &[("idx_artist_albums_album", "album_rowid")],
};

const ARTIST_GENRES_TABLE: Table = Table {
    name: "artist_genres",
    columns: &[
        sqlite_column!("artist_rowid", &SqlType::Integer, non_null = true),
        sqlite_column!("genre", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_artist_genres_artist", "artist_rowid")],
};

const ALBUM_IMAGES_TABLE: Table = Table {
    name: "album_images",
    columns: &[
        sqlite_column!("album_rowid", &SqlType::Integer, non_null = true),
        sqlite_column!("width", &SqlType::Integer, non_null = true),
        sqlite_column!("height", &SqlType::Integer, non_null = true),
        sqlite_column!("url", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_album_images_album", "album_rowid")],
};

const ARTIST_IMAGES_TABLE: Table = Table {
    name: "artist_images",
    columns: &[
        sqlite_column!("artist_rowid", &SqlType::Integer, non_null = true),
        sqlite_column!("width", &SqlType::Integer, non_null = true),
        sqlite_column!("height", &SqlType::Integer, non_null = true),
        sqlite_column!("url", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_artist_images_artist", "artist_rowid")],
};

pub const CATALOG_SCHEMA: VersionedSchema = VersionedSchema {
    version: 1,
    tables: &[
        ARTISTS_TABLE,
        ALBUMS_TABLE,
        TRACKS_TABLE,
        TRACK_ARTISTS_TABLE,
        ARTIST_ALBUMS_TABLE,
        ARTIST_GENRES_TABLE,
        ALBUM_IMAGES_TABLE,
        ARTIST_IMAGES_TABLE,
    ],
};

// =============================================================================
// Annotation store
// =============================================================================

/// One row per track. The two list columns hold JSON arrays of strings.
const TRACK_FILES_TABLE: Table = Table {
    name: "track_files",
    columns: &[
        sqlite_column!("track_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("has_lyrics", &SqlType::Integer),
        sqlite_column!("original_title", &SqlType::Text),
        sqlite_column!("version_title", &SqlType::Text),
        sqlite_column!("language_of_performance", &SqlType::Text),
        sqlite_column!("artist_roles", &SqlType::Text),
    ],
    indices: &[],
};

pub const ANNOTATIONS_SCHEMA: VersionedSchema = VersionedSchema {
    version: 1,
    tables: &[TRACK_FILES_TABLE],
};
