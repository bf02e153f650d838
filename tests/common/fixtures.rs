//! Test fixture creation for the catalog and annotation stores

use super::constants::*;
use anyhow::Result;
use metadata_api::metadata_store::schema::{
    ANNOTATIONS_FILE_NAME, ANNOTATIONS_SCHEMA, CATALOG_SCHEMA,
};
use metadata_api::service::ServiceSettings;
use metadata_api::{MetadataService, MetadataStore, StoreConfig};
use rusqlite::{params, Connection};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A catalog (and possibly an annotation store) living in a temp directory.
/// The directory is removed on drop.
pub struct TestCatalog {
    pub dir: TempDir,
    pub catalog_path: PathBuf,
    pub annotations_path: PathBuf,
}

#[allow(dead_code)]
impl TestCatalog {
    fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let catalog_path = dir.path().join("catalog.sqlite3");
        let annotations_path = dir.path().join(ANNOTATIONS_FILE_NAME);
        Ok(Self {
            dir,
            catalog_path,
            annotations_path,
        })
    }

    pub fn store_config(&self) -> StoreConfig {
        let mut config = StoreConfig::for_catalog(&self.catalog_path);
        config.read_pool_size = 4;
        config
    }

    pub fn open_store(&self) -> MetadataStore {
        MetadataStore::open(&self.store_config()).expect("fixture store should open")
    }

    pub fn service(&self) -> MetadataService {
        MetadataService::new(Arc::new(self.open_store()), ServiceSettings::default())
    }

    /// A service whose catalog pool holds exactly `read_pool_size` connections.
    pub fn service_with_pool(&self, read_pool_size: usize) -> MetadataService {
        let mut config = self.store_config();
        config.read_pool_size = read_pool_size;
        let store = MetadataStore::open(&config).expect("fixture store should open");
        MetadataService::new(Arc::new(store), ServiceSettings::default())
    }

    /// A writable connection, for breaking the catalog underneath an open store.
    pub fn writable_catalog(&self) -> Connection {
        Connection::open(&self.catalog_path).expect("fixture catalog should open")
    }

    pub fn writable_annotations(&self) -> Connection {
        Connection::open(&self.annotations_path).expect("fixture annotations should open")
    }
}

/// Creates a catalog with 3 artists, 2 albums and 5 tracks, plus annotations
/// for tracks 1 and 4 (the latter with a malformed language list).
pub fn create_test_catalog() -> Result<TestCatalog> {
    let catalog = create_test_catalog_without_annotations()?;

    let conn = Connection::open(&catalog.annotations_path)?;
    ANNOTATIONS_SCHEMA.create(&conn)?;
    conn.execute(
        "INSERT INTO track_files (track_id, has_lyrics, original_title, version_title,
                                  language_of_performance, artist_roles)
         VALUES (?1, 1, 'Opening Track (Original)', 'Remastered', '[\"en\", \"it\"]',
                 '[\"main\", \"composer\"]')",
        [TRACK_1_ID],
    )?;
    conn.execute(
        "INSERT INTO track_files (track_id, has_lyrics, original_title, version_title,
                                  language_of_performance, artist_roles)
         VALUES (?1, 0, '', NULL, 'not json', '[\"main\"]')",
        [TRACK_4_ID],
    )?;

    Ok(catalog)
}

/// Same catalog as [`create_test_catalog`] with no annotation store on disk.
pub fn create_test_catalog_without_annotations() -> Result<TestCatalog> {
    let catalog = TestCatalog::new()?;
    let conn = Connection::open(&catalog.catalog_path)?;
    CATALOG_SCHEMA.create(&conn)?;

    // Artists
    for (rowid, id, name, followers, popularity) in [
        (1i64, ARTIST_1_ID, ARTIST_1_NAME, 5000i64, 70i64),
        (2, ARTIST_2_ID, ARTIST_2_NAME, 1200, 40),
        (3, ARTIST_3_ID, ARTIST_3_NAME, 300, 20),
    ] {
        conn.execute(
            "INSERT INTO artists (rowid, id, name, followers_total, popularity)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![rowid, id, name, followers, popularity],
        )?;
    }
    conn.execute_batch(
        "INSERT INTO artist_genres (artist_rowid, genre)
            VALUES (1, 'rock'), (1, 'indie'), (2, 'jazz');
         INSERT INTO artist_images (artist_rowid, width, height, url)
            VALUES (1, 160, 160, 'https://img.test/artist-1-160'),
                   (1, 640, 640, 'https://img.test/artist-1-640'),
                   (2, 320, 320, 'https://img.test/artist-2-320');",
    )?;

    // Albums
    conn.execute(
        "INSERT INTO albums (rowid, id, name, album_type, label, release_date,
                             release_date_precision, external_id_upc, total_tracks,
                             copyright_c, copyright_p)
         VALUES (1, ?1, ?2, 'album', 'Test Records', '2020-05-15', 'day',
                 '012345678905', 3, 'C 2020 Test Records', 'P 2020 Test Records')",
        [ALBUM_1_ID, ALBUM_1_TITLE],
    )?;
    conn.execute(
        "INSERT INTO albums (rowid, id, name, album_type, label, release_date,
                             release_date_precision, total_tracks)
         VALUES (2, ?1, ?2, 'compilation', NULL, '1999', 'year', 2)",
        [ALBUM_2_ID, ALBUM_2_TITLE],
    )?;
    conn.execute_batch(
        "INSERT INTO album_images (album_rowid, width, height, url)
            VALUES (1, 300, 300, 'https://img.test/album-1-300'),
                   (1, 640, 640, 'https://img.test/album-1-640'),
                   (1, 64, 64, 'https://img.test/album-1-64'),
                   (2, 640, 640, 'https://img.test/album-2-640');
         INSERT INTO artist_albums (artist_rowid, album_rowid, index_in_album)
            VALUES (1, 1, 0),
                   (3, 1, NULL),
                   (3, 2, 1),
                   (2, 2, 0),
                   (2, 2, 2);",
    )?;

    // Tracks
    for (rowid, id, name, album, number, duration, popularity, isrc) in [
        (1i64, TRACK_1_ID, TRACK_1_TITLE, 1i64, 1i64, 240000i64, 60i64, TRACK_1_ISRC),
        (2, TRACK_2_ID, TRACK_2_TITLE, 1, 2, 180000, 80, SHARED_ISRC),
        (3, TRACK_3_ID, TRACK_3_TITLE, 1, 3, 210000, 30, TRACK_3_ISRC),
        (4, TRACK_4_ID, TRACK_4_TITLE, 2, 1, 200000, 50, SHARED_ISRC),
        (5, TRACK_5_ID, TRACK_5_TITLE, 2, 2, 160000, 50, TRACK_5_ISRC),
    ] {
        conn.execute(
            "INSERT INTO tracks (rowid, id, name, album_rowid, track_number, disc_number,
                                 duration_ms, explicit, popularity, external_id_isrc)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, 0, ?7, ?8)",
            params![rowid, id, name, album, number, duration, popularity, isrc],
        )?;
    }
    conn.execute_batch(
        "INSERT INTO track_artists (track_rowid, artist_rowid)
            VALUES (1, 1), (2, 3), (2, 1), (3, 1), (4, 2), (5, 2), (5, 3);",
    )?;

    Ok(catalog)
}

/// One recording with [`SCENARIO_A_ISRC`] on an album with images of width
/// 640 and 300 and one indexed album artist, one track-level artist, and an
/// annotation store holding no row for it.
pub fn create_scenario_a_catalog() -> Result<TestCatalog> {
    let catalog = TestCatalog::new()?;
    let conn = Connection::open(&catalog.catalog_path)?;
    CATALOG_SCHEMA.create(&conn)?;
    conn.execute_batch(
        "INSERT INTO artists (rowid, id, name, followers_total, popularity)
            VALUES (1, 'album-artist', 'Album Artist', 10, 10),
                   (2, 'track-artist', 'Track Artist', 5, 5);
         INSERT INTO albums (rowid, id, name, album_type, release_date,
                             release_date_precision, total_tracks)
            VALUES (1, 'scenario-album', 'Scenario Album', 'single', '2024-03', 'month', 1);
         INSERT INTO album_images (album_rowid, width, height, url)
            VALUES (1, 300, 300, 'https://img.test/scenario-300'),
                   (1, 640, 640, 'https://img.test/scenario-640');
         INSERT INTO artist_albums (artist_rowid, album_rowid, index_in_album)
            VALUES (1, 1, 0);",
    )?;
    conn.execute(
        "INSERT INTO tracks (rowid, id, name, album_rowid, track_number, disc_number,
                             duration_ms, explicit, popularity, external_id_isrc)
         VALUES (1, 'scenario-track', 'Scenario Track', 1, 1, 1, 195000, 1, 90, ?1)",
        [SCENARIO_A_ISRC],
    )?;
    conn.execute(
        "INSERT INTO track_artists (track_rowid, artist_rowid) VALUES (1, 2)",
        [],
    )?;

    let annotations = Connection::open(&catalog.annotations_path)?;
    ANNOTATIONS_SCHEMA.create(&annotations)?;

    Ok(catalog)
}

/// [`create_test_catalog`] plus [`CROWDED_FILLER_ARTISTS`] filler artists
/// named `Filler Artist <n>`, one of which ([`CROWDED_ARTIST_ID`]) carries
/// [`CROWDED_ARTIST_GENRES`] genres. Searching or resolving it keeps a
/// connection busy long enough to be cancelled mid-statement.
pub fn create_crowded_catalog() -> Result<TestCatalog> {
    let catalog = create_test_catalog()?;
    let conn = Connection::open(&catalog.catalog_path)?;
    conn.execute_batch("BEGIN")?;
    conn.execute(
        "WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < ?1)
         INSERT INTO artists (rowid, id, name, followers_total, popularity)
         SELECT 1000 + n, 'filler-' || n, 'Filler Artist ' || n, n % 9973, n % 100 FROM seq",
        [CROWDED_FILLER_ARTISTS],
    )?;
    conn.execute(
        "WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < ?1)
         INSERT INTO artist_genres (artist_rowid, genre)
         SELECT a.rowid, 'genre ' || ((n * 7919) % ?1) FROM seq, artists a WHERE a.id = ?2",
        params![CROWDED_ARTIST_GENRES, CROWDED_ARTIST_ID],
    )?;
    conn.execute_batch("COMMIT")?;
    Ok(catalog)
}
