//! Read-only catalog store and the graph assembly built on it.
//!
//! Column lists are shared by every query that produces a given record, so
//! single lookups and batch assembly always parse rows the same way.

/// Track columns, aliased `t`. Parsed by `store::parse_track`.
macro_rules! track_columns {
    () => {
        "t.rowid, t.id, t.name, t.external_id_isrc, t.duration_ms, t.explicit, \
         t.track_number, t.disc_number, t.popularity, t.preview_url"
    };
}

/// Album columns, aliased `a`. Parsed by `store::parse_album`.
macro_rules! album_columns {
    () => {
        "a.rowid, a.id, a.name, a.album_type, a.label, a.release_date, \
         a.release_date_precision, a.external_id_upc, a.total_tracks, a.copyright_c, a.copyright_p"
    };
}

/// Artist columns, aliased `ar`. Parsed by `store::parse_artist`.
macro_rules! artist_columns {
    () => {
        "ar.rowid, ar.id, ar.name, ar.followers_total, ar.popularity"
    };
}

macro_rules! annotation_columns {
    () => {
        "track_id, has_lyrics, original_title, version_title, language_of_performance, artist_roles"
    };
}

mod annotations;
mod batch;
pub mod models;
mod pool;
pub mod schema;
mod search;
mod store;

pub use annotations::{merge_annotations, parse_json_list};
pub use batch::Partial;
pub use models::{
    Album, AlbumType, Annotation, Artist, Image, LyricsPresence, ReleaseDatePrecision, Track,
};
pub use pool::{PooledConnection, QueryScope, ReadPool, StorePragmas};
pub use search::like_pattern;
pub use store::{MetadataStore, StoreConfig};
