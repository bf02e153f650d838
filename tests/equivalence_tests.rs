//! Batch and single-entity resolution must build the same graphs
//!
//! Also covers the statement bound of ISRC batches, ordering rules, and
//! degradation when secondary relations or annotations are unusable.

mod common;

use common::*;
use metadata_api::metadata_store::{AlbumType, LyricsPresence, ReleaseDatePrecision};
use metadata_api::{MetadataError, QueryScope};
use tokio_util::sync::CancellationToken;

fn all_isrcs() -> Vec<String> {
    [TRACK_1_ISRC, SHARED_ISRC, TRACK_3_ISRC, TRACK_5_ISRC]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn ids<T, F: Fn(&T) -> &str>(items: &[T], f: F) -> Vec<&str> {
    items.iter().map(f).collect()
}

// =============================================================================
// Equivalence
// =============================================================================

#[test]
fn test_isrc_batch_matches_single_resolution() {
    let catalog = create_test_catalog().unwrap();
    let store = catalog.open_store();
    let scope = QueryScope::detached();

    let batch = store.batch_resolve_by_isrcs(&scope, &all_isrcs()).unwrap();
    assert_eq!(batch.len(), 4);

    for isrc in all_isrcs() {
        let single = store.resolve_tracks_by_isrc(&scope, &isrc).unwrap();
        assert_eq!(batch[&isrc], single, "graphs differ for {}", isrc);
    }
}

#[test]
fn test_isrc_batch_matches_single_without_annotations() {
    let catalog = create_test_catalog_without_annotations().unwrap();
    let store = catalog.open_store();
    assert!(!store.has_annotations());
    let scope = QueryScope::detached();

    let batch = store.batch_resolve_by_isrcs(&scope, &all_isrcs()).unwrap();
    for isrc in all_isrcs() {
        let single = store.resolve_tracks_by_isrc(&scope, &isrc).unwrap();
        assert_eq!(batch[&isrc], single);
        assert!(single.iter().all(|t| t.has_lyrics == LyricsPresence::Unknown));
    }
}

#[test]
fn test_per_id_batches_match_single_resolution() {
    let catalog = create_test_catalog().unwrap();
    let store = catalog.open_store();
    let scope = QueryScope::detached();

    let track_ids: Vec<String> = [TRACK_1_ID, TRACK_2_ID, TRACK_4_ID]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let tracks = store.batch_resolve_tracks(&scope, &track_ids).unwrap();
    assert!(tracks.is_complete());
    for id in &track_ids {
        assert_eq!(
            Some(&tracks.items[id]),
            store.resolve_track(&scope, id).unwrap().as_ref()
        );
    }

    let album_ids = vec![ALBUM_1_ID.to_string(), ALBUM_2_ID.to_string()];
    let albums = store.batch_resolve_albums(&scope, &album_ids).unwrap();
    for id in &album_ids {
        assert_eq!(
            Some(&albums.items[id]),
            store.resolve_album(&scope, id).unwrap().as_ref()
        );
    }

    let artist_ids = vec![ARTIST_2_ID.to_string(), ARTIST_3_ID.to_string()];
    let artists = store.batch_resolve_artists(&scope, &artist_ids).unwrap();
    for id in &artist_ids {
        assert_eq!(
            Some(&artists.items[id]),
            store.resolve_artist(&scope, id).unwrap().as_ref()
        );
    }
}

#[test]
fn test_resolution_is_idempotent() {
    let catalog = create_test_catalog().unwrap();
    let store = catalog.open_store();
    let scope = QueryScope::detached();

    let first = store.batch_resolve_by_isrcs(&scope, &all_isrcs()).unwrap();
    let second = store.batch_resolve_by_isrcs(&scope, &all_isrcs()).unwrap();
    assert_eq!(first, second);

    let track_first = store.resolve_track(&scope, TRACK_2_ID).unwrap();
    let track_second = store.resolve_track(&scope, TRACK_2_ID).unwrap();
    assert_eq!(track_first, track_second);
}

// =============================================================================
// Statement bound
// =============================================================================

#[test]
fn test_isrc_batch_statement_count_is_independent_of_size() {
    let catalog = create_test_catalog().unwrap();
    let store = catalog.open_store();

    let one = QueryScope::detached();
    store
        .batch_resolve_by_isrcs(&one, &[TRACK_1_ISRC.to_string()])
        .unwrap();

    let many = QueryScope::detached();
    let mut isrcs = all_isrcs();
    isrcs.push(UNKNOWN_ISRC.to_string());
    store.batch_resolve_by_isrcs(&many, &isrcs).unwrap();

    assert_eq!(one.round_trips(), many.round_trips());
    assert!(many.round_trips() <= 7, "{} statements", many.round_trips());
}

#[test]
fn test_isrc_batch_without_matches_stops_after_first_statement() {
    let catalog = create_test_catalog().unwrap();
    let store = catalog.open_store();
    let scope = QueryScope::detached();

    let result = store
        .batch_resolve_by_isrcs(&scope, &[UNKNOWN_ISRC.to_string()])
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(scope.round_trips(), 1);
}

#[test]
fn test_empty_isrc_set_issues_no_statement() {
    let catalog = create_test_catalog().unwrap();
    let store = catalog.open_store();
    let scope = QueryScope::detached();

    assert!(store.batch_resolve_by_isrcs(&scope, &[]).unwrap().is_empty());
    assert!(store
        .batch_resolve_by_isrcs(&scope, &[String::new()])
        .unwrap()
        .is_empty());
    assert_eq!(scope.round_trips(), 0);
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_shared_isrc_orders_by_popularity() {
    let catalog = create_test_catalog().unwrap();
    let store = catalog.open_store();
    let scope = QueryScope::detached();

    let batch = store
        .batch_resolve_by_isrcs(&scope, &[SHARED_ISRC.to_string()])
        .unwrap();
    assert_eq!(
        ids(&batch[SHARED_ISRC], |t| t.id.as_str()),
        vec![TRACK_2_ID, TRACK_4_ID]
    );
}

#[test]
fn test_images_order_by_size_descending() {
    let catalog = create_test_catalog().unwrap();
    let store = catalog.open_store();
    let scope = QueryScope::detached();

    let album = store.resolve_album(&scope, ALBUM_1_ID).unwrap().unwrap();
    let widths: Vec<i32> = album.images.iter().map(|i| i.width).collect();
    assert_eq!(widths, vec![640, 300, 64]);

    let artist = store.resolve_artist(&scope, ARTIST_1_ID).unwrap().unwrap();
    let widths: Vec<i32> = artist.images.iter().map(|i| i.width).collect();
    assert_eq!(widths, vec![640, 160]);
    assert_eq!(artist.genres, vec!["indie", "rock"]);
}

#[test]
fn test_album_artists_skip_unindexed_and_dedupe() {
    let catalog = create_test_catalog().unwrap();
    let store = catalog.open_store();
    let scope = QueryScope::detached();

    // artist-3 only appears on album-1 without a position
    let album = store.resolve_album(&scope, ALBUM_1_ID).unwrap().unwrap();
    assert_eq!(ids(&album.artists, |a| a.id.as_str()), vec![ARTIST_1_ID]);

    // artist-2 is linked twice to album-2 and listed once, at its lowest position
    let album = store.resolve_album(&scope, ALBUM_2_ID).unwrap().unwrap();
    assert_eq!(
        ids(&album.artists, |a| a.id.as_str()),
        vec![ARTIST_2_ID, ARTIST_3_ID]
    );
    assert_eq!(album.album_type, AlbumType::Compilation);
    assert_eq!(album.release_date_precision, ReleaseDatePrecision::Year);
}

#[test]
fn test_track_artists_keep_association_order() {
    let catalog = create_test_catalog().unwrap();
    let store = catalog.open_store();
    let scope = QueryScope::detached();

    let track = store.resolve_track(&scope, TRACK_2_ID).unwrap().unwrap();
    assert_eq!(
        ids(&track.artists, |a| a.id.as_str()),
        vec![ARTIST_3_ID, ARTIST_1_ID]
    );

    let batch = store
        .batch_resolve_by_isrcs(&scope, &[SHARED_ISRC.to_string()])
        .unwrap();
    assert_eq!(batch[SHARED_ISRC][0].artists, track.artists);
}

// =============================================================================
// Annotations and degradation
// =============================================================================

#[test]
fn test_annotations_are_merged() {
    let catalog = create_test_catalog().unwrap();
    let store = catalog.open_store();
    let scope = QueryScope::detached();

    let track = store.resolve_track(&scope, TRACK_1_ID).unwrap().unwrap();
    assert_eq!(track.has_lyrics, LyricsPresence::Present);
    assert_eq!(
        track.original_title.as_deref(),
        Some("Opening Track (Original)")
    );
    assert_eq!(track.version_title.as_deref(), Some("Remastered"));
    assert_eq!(track.languages, vec!["en", "it"]);
    assert_eq!(track.artist_roles, vec!["main", "composer"]);

    let unannotated = store.resolve_track(&scope, TRACK_3_ID).unwrap().unwrap();
    assert_eq!(unannotated.has_lyrics, LyricsPresence::Unknown);
    assert!(unannotated.languages.is_empty());
}

#[test]
fn test_malformed_annotation_list_degrades_to_empty() {
    let catalog = create_test_catalog().unwrap();
    let store = catalog.open_store();
    let scope = QueryScope::detached();

    let track = store.resolve_track(&scope, TRACK_4_ID).unwrap().unwrap();
    assert!(track.languages.is_empty());
    assert_eq!(track.artist_roles, vec!["main"]);
    assert_eq!(track.has_lyrics, LyricsPresence::Absent);
    assert!(track.original_title.is_none());

    let batch = store
        .batch_resolve_by_isrcs(&scope, &[SHARED_ISRC.to_string()])
        .unwrap();
    assert_eq!(batch[SHARED_ISRC][1], track);
}

#[test]
fn test_missing_secondary_relation_degrades_both_paths() {
    let catalog = create_test_catalog().unwrap();
    let store = catalog.open_store();
    catalog
        .writable_catalog()
        .execute_batch("DROP TABLE artist_images;")
        .unwrap();
    let scope = QueryScope::detached();

    let single = store.resolve_tracks_by_isrc(&scope, TRACK_1_ISRC).unwrap();
    assert_eq!(single.len(), 1);
    assert!(single[0].artists.iter().all(|a| a.images.is_empty()));
    assert_eq!(single[0].artists[0].genres, vec!["indie", "rock"]);

    let batch = store
        .batch_resolve_by_isrcs(&scope, &[TRACK_1_ISRC.to_string()])
        .unwrap();
    assert_eq!(batch[TRACK_1_ISRC], single);
}

#[test]
fn test_unreadable_annotation_store_degrades() {
    let catalog = create_test_catalog().unwrap();
    let store = catalog.open_store();
    catalog
        .writable_annotations()
        .execute_batch("DROP TABLE track_files;")
        .unwrap();
    let scope = QueryScope::detached();

    let batch = store
        .batch_resolve_by_isrcs(&scope, &[TRACK_1_ISRC.to_string()])
        .unwrap();
    let track = &batch[TRACK_1_ISRC][0];
    assert_eq!(track.has_lyrics, LyricsPresence::Unknown);
    assert!(track.languages.is_empty());
    assert_eq!(track.album.as_ref().unwrap().id, ALBUM_1_ID);
}

// =============================================================================
// Cancellation
// =============================================================================

#[test]
fn test_cancelled_scope_aborts_batch() {
    let catalog = create_test_catalog().unwrap();
    let store = catalog.open_store();
    let token = CancellationToken::new();
    token.cancel();
    let scope = QueryScope::new(token);

    let result = store.batch_resolve_by_isrcs(&scope, &all_isrcs());
    assert!(matches!(result, Err(MetadataError::Cancelled)));
    assert_eq!(scope.round_trips(), 0);

    let result = store.batch_resolve_tracks(&scope, &[TRACK_1_ID.to_string()]);
    assert!(matches!(result, Err(MetadataError::Cancelled)));
}

#[tokio::test]
async fn test_service_honours_cancelled_token() {
    let catalog = create_test_catalog().unwrap();
    let service = catalog.service();
    let token = CancellationToken::new();
    token.cancel();

    let result = service.track(&token, TRACK_1_ID).await;
    assert!(matches!(result, Err(MetadataError::Cancelled)));
}
