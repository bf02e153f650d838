//! Hydrated catalog records.
//!
//! Serialized field names follow the public JSON contract: optional scalars
//! and empty lists are omitted rather than emitted as null or [].

use serde::{Deserialize, Serialize};

/// Internal SQLite rowid, only used to join relation tables inside one store.
pub(crate) type RowId = i64;

// =============================================================================
// Enumerations
// =============================================================================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlbumType {
    Album,
    Single,
    Compilation,
    Ep,
}

impl AlbumType {
    /// Convert from database string representation
    pub fn from_db_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "single" => AlbumType::Single,
            "compilation" => AlbumType::Compilation,
            "ep" => AlbumType::Ep,
            _ => AlbumType::Album, // Default fallback
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseDatePrecision {
    Day,
    Month,
    Year,
}

impl ReleaseDatePrecision {
    pub fn from_db_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "year" => ReleaseDatePrecision::Year,
            "month" => ReleaseDatePrecision::Month,
            _ => ReleaseDatePrecision::Day,
        }
    }
}

/// Whether a track is known to have lyrics.
///
/// Serialized as an optional boolean; `Unknown` is omitted entirely.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum LyricsPresence {
    Present,
    Absent,
    #[default]
    Unknown,
}

impl LyricsPresence {
    pub fn is_unknown(&self) -> bool {
        matches!(self, LyricsPresence::Unknown)
    }
}

impl From<Option<bool>> for LyricsPresence {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => LyricsPresence::Present,
            Some(false) => LyricsPresence::Absent,
            None => LyricsPresence::Unknown,
        }
    }
}

impl From<LyricsPresence> for Option<bool> {
    fn from(value: LyricsPresence) -> Self {
        match value {
            LyricsPresence::Present => Some(true),
            LyricsPresence::Absent => Some(false),
            LyricsPresence::Unknown => None,
        }
    }
}

// =============================================================================
// Records
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Image {
    pub url: String,
    pub width: i32,
    pub height: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub followers: i64,
    pub popularity: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    /// Non-increasing by width
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Album {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub album_type: AlbumType,
    pub label: String,
    pub release_date: String,
    pub release_date_precision: ReleaseDatePrecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upc: Option<String>,
    pub total_tracks: i32,
    #[serde(rename = "copyright", default, skip_serializing_if = "Option::is_none")]
    pub copyright_c: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright_p: Option<String>,
    /// Non-increasing by width
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
    /// Ordered by the artist's position on the album
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artists: Vec<Artist>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isrc: Option<String>,
    pub duration_ms: i64,
    pub explicit: bool,
    pub track_number: i32,
    pub disc_number: i32,
    pub popularity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<Album>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artists: Vec<Artist>,

    // Annotation fields, left at their defaults when no annotation exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_title: Option<String>,
    #[serde(default, skip_serializing_if = "LyricsPresence::is_unknown")]
    pub has_lyrics: LyricsPresence,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artist_roles: Vec<String>,
}

impl Track {
    pub fn apply_annotation(&mut self, annotation: &Annotation) {
        self.has_lyrics = annotation.has_lyrics;
        self.original_title = annotation.original_title.clone();
        self.version_title = annotation.version_title.clone();
        self.languages = annotation.languages.clone();
        self.artist_roles = annotation.artist_roles.clone();
    }
}

/// Supplementary per-track facts from the annotation store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Annotation {
    pub has_lyrics: LyricsPresence,
    pub original_title: Option<String>,
    pub version_title: Option<String>,
    pub languages: Vec<String>,
    pub artist_roles: Vec<String>,
}

/// Maps an empty or NULL text column to `None`.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
