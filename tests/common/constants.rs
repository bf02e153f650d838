//! Shared constants for integration tests
//!
//! When the fixture catalog changes, update only this file and fixtures.rs.
#![allow(dead_code)]

// ============================================================================
// Artists
// ============================================================================

/// "The Test Band", most followed
pub const ARTIST_1_ID: &str = "artist-1";
pub const ARTIST_1_NAME: &str = "The Test Band";

/// "Jazz Ensemble"
pub const ARTIST_2_ID: &str = "artist-2";
pub const ARTIST_2_NAME: &str = "Jazz Ensemble";

/// "Guest Singer", featured on track 2 and album 2
pub const ARTIST_3_ID: &str = "artist-3";
pub const ARTIST_3_NAME: &str = "Guest Singer";

// ============================================================================
// Albums
// ============================================================================

/// "First Album" by The Test Band, three tracks
pub const ALBUM_1_ID: &str = "album-1";
pub const ALBUM_1_TITLE: &str = "First Album";

/// "Jazz Collection" by Jazz Ensemble with Guest Singer, two tracks
pub const ALBUM_2_ID: &str = "album-2";
pub const ALBUM_2_TITLE: &str = "Jazz Collection";

// ============================================================================
// Tracks
// ============================================================================

pub const TRACK_1_ID: &str = "track-1";
pub const TRACK_1_TITLE: &str = "Opening Track";

pub const TRACK_2_ID: &str = "track-2";
pub const TRACK_2_TITLE: &str = "Middle Track";

pub const TRACK_3_ID: &str = "track-3";
pub const TRACK_3_TITLE: &str = "Closing Track";

pub const TRACK_4_ID: &str = "track-4";
pub const TRACK_4_TITLE: &str = "Smooth Jazz";

pub const TRACK_5_ID: &str = "track-5";
pub const TRACK_5_TITLE: &str = "Late Night Blues";

// ============================================================================
// ISRCs
// ============================================================================

pub const TRACK_1_ISRC: &str = "USTB12000001";
pub const TRACK_3_ISRC: &str = "USTB12000003";
pub const TRACK_5_ISRC: &str = "USJE19900005";

/// Carried by track 2 (popularity 80) and track 4 (popularity 50)
pub const SHARED_ISRC: &str = "USTB12000002";

pub const UNKNOWN_ISRC: &str = "ZZZZ00000000";

/// The single recording of the scenario A catalog
pub const SCENARIO_A_ISRC: &str = "USUM72409273";

// ============================================================================
// Crowded catalog
// ============================================================================

pub const CROWDED_FILLER_ARTISTS: i64 = 400_000;

/// The first filler artist, the one holding every crowded genre row
pub const CROWDED_ARTIST_ID: &str = "filler-1";
pub const CROWDED_ARTIST_GENRES: i64 = 1_000_000;

/// Matches every filler artist name
pub const CROWDED_SEARCH_TERM: &str = "iller art";
