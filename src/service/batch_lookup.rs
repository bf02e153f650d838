//! Multi-category lookups.
//!
//! Each requested category resolves independently and concurrently. A
//! category that fails gets an entry in the response's error map and keeps
//! whatever it did resolve; the other categories are unaffected.

use super::MetadataService;
use crate::error::{MetadataError, Result};
use crate::metadata_store::{Album, Artist, Partial, Track};
use crate::metrics;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchCategory {
    Tracks,
    Artists,
    Albums,
    Isrcs,
}

impl BatchCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchCategory::Tracks => "tracks",
            BatchCategory::Artists => "artists",
            BatchCategory::Albums => "albums",
            BatchCategory::Isrcs => "isrcs",
        }
    }

    pub fn failure_message(&self) -> String {
        format!("failed to lookup some {}", self.as_str())
    }
}

impl fmt::Display for BatchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchLookupRequest {
    pub tracks: Vec<String>,
    pub artists: Vec<String>,
    pub albums: Vec<String>,
    pub isrcs: Vec<String>,
}

impl BatchLookupRequest {
    pub fn total_items(&self) -> usize {
        self.tracks.len() + self.artists.len() + self.albums.len() + self.isrcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_items() == 0
    }

    pub fn validate(&self, max_items: usize) -> Result<()> {
        let total = self.total_items();
        if total > max_items {
            return Err(MetadataError::InvalidRequest(format!(
                "maximum {} total items allowed, got {}",
                max_items, total
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Serialize)]
pub struct BatchLookupResponse {
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub tracks: HashMap<String, Track>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub artists: HashMap<String, Artist>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub albums: HashMap<String, Album>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub isrcs: HashMap<String, Vec<Track>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<BatchCategory, String>,
}

impl BatchLookupResponse {
    pub fn error_for(&self, category: BatchCategory) -> Option<&str> {
        self.errors.get(&category).map(String::as_str)
    }
}

/// Outcome of one category: the data it produced and its error, if any.
struct CategoryOutcome<T> {
    items: HashMap<String, T>,
    error: Option<String>,
}

impl<T> CategoryOutcome<T> {
    fn empty() -> Self {
        Self {
            items: HashMap::new(),
            error: None,
        }
    }

    fn from_partial(category: BatchCategory, result: Result<Partial<T>>) -> Self {
        match result {
            Ok(partial) if partial.is_complete() => Self {
                items: partial.items,
                error: None,
            },
            Ok(partial) => {
                error!(
                    "Batch lookup of {} failed for {} ids: {:?}",
                    category,
                    partial.failed.len(),
                    partial.failed
                );
                Self {
                    items: partial.items,
                    error: Some(category.failure_message()),
                }
            }
            Err(e) => Self::failed(category, e),
        }
    }

    fn from_map(category: BatchCategory, result: Result<HashMap<String, T>>) -> Self {
        match result {
            Ok(items) => Self { items, error: None },
            Err(e) => Self::failed(category, e),
        }
    }

    fn failed(category: BatchCategory, e: MetadataError) -> Self {
        error!("Batch lookup of {} failed: {}", category, e);
        Self {
            items: HashMap::new(),
            error: Some(category.failure_message()),
        }
    }
}

impl MetadataService {
    /// Resolves every requested category, capturing failures per category.
    ///
    /// Only an oversized request is rejected outright. An empty request
    /// returns an empty response without touching the stores.
    pub async fn batch_lookup(
        &self,
        token: &CancellationToken,
        request: BatchLookupRequest,
    ) -> Result<BatchLookupResponse> {
        request.validate(self.settings.max_batch_items)?;

        let mut response = BatchLookupResponse::default();
        if request.is_empty() {
            return Ok(response);
        }

        let BatchLookupRequest {
            tracks,
            artists,
            albums,
            isrcs,
        } = request;

        let (tracks, artists, albums, isrcs) = tokio::join!(
            async {
                if tracks.is_empty() {
                    return CategoryOutcome::empty();
                }
                CategoryOutcome::from_partial(
                    BatchCategory::Tracks,
                    self.batch_tracks(token, tracks).await,
                )
            },
            async {
                if artists.is_empty() {
                    return CategoryOutcome::empty();
                }
                CategoryOutcome::from_partial(
                    BatchCategory::Artists,
                    self.batch_artists(token, artists).await,
                )
            },
            async {
                if albums.is_empty() {
                    return CategoryOutcome::empty();
                }
                CategoryOutcome::from_partial(
                    BatchCategory::Albums,
                    self.batch_albums(token, albums).await,
                )
            },
            async {
                if isrcs.is_empty() {
                    return CategoryOutcome::empty();
                }
                CategoryOutcome::from_map(
                    BatchCategory::Isrcs,
                    self.batch_tracks_by_isrc(token, isrcs).await,
                )
            },
        );

        response.tracks = tracks.items;
        response.artists = artists.items;
        response.albums = albums.items;
        response.isrcs = isrcs.items;
        for (category, error) in [
            (BatchCategory::Tracks, tracks.error),
            (BatchCategory::Artists, artists.error),
            (BatchCategory::Albums, albums.error),
            (BatchCategory::Isrcs, isrcs.error),
        ] {
            if let Some(error) = error {
                metrics::record_batch_category_failure(category.as_str());
                response.errors.insert(category, error);
            }
        }
        Ok(response)
    }
}
