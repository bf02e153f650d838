//! Async facade over [`MetadataStore`].
//!
//! Store work is blocking, so each call runs on the blocking thread pool
//! under a [`QueryScope`] tied to the caller's cancellation token. When the
//! token fires first, in-flight statements are interrupted and the call
//! returns [`MetadataError::Cancelled`].

mod batch_lookup;

pub use batch_lookup::{BatchCategory, BatchLookupRequest, BatchLookupResponse};

use crate::error::{MetadataError, Result};
use crate::metadata_store::{Album, Artist, MetadataStore, Partial, QueryScope, Track};
use crate::metrics;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const MIN_SEARCH_QUERY_LEN: usize = 2;

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub search_timeout: Duration,
    pub default_search_limit: usize,
    pub max_search_limit: usize,
    pub max_batch_items: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            search_timeout: Duration::from_secs(10),
            default_search_limit: 20,
            max_search_limit: 50,
            max_batch_items: 400,
        }
    }
}

impl ServiceSettings {
    /// Non-positive or oversized limits fall back to the default.
    pub fn clamp_search_limit(&self, requested: i64) -> usize {
        if requested <= 0 || requested as u64 > self.max_search_limit as u64 {
            self.default_search_limit
        } else {
            requested as usize
        }
    }
}

/// A child of `parent` that is also cancelled once `timeout` elapses.
pub fn deadline_token(parent: &CancellationToken, timeout: Duration) -> CancellationToken {
    let child = parent.child_token();
    let timer = child.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => timer.cancel(),
            _ = timer.cancelled() => {}
        }
    });
    child
}

#[derive(Clone)]
pub struct MetadataService {
    store: Arc<MetadataStore>,
    settings: ServiceSettings,
}

impl MetadataService {
    pub fn new(store: Arc<MetadataStore>, settings: ServiceSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    async fn run_blocking<T, F>(
        &self,
        operation: &'static str,
        token: &CancellationToken,
        work: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&MetadataStore, &QueryScope) -> Result<T> + Send + 'static,
    {
        if token.is_cancelled() {
            return Err(MetadataError::Cancelled);
        }

        let started = Instant::now();
        let scope = Arc::new(QueryScope::new(token.clone()));
        let task = {
            let store = self.store.clone();
            let scope = scope.clone();
            tokio::task::spawn_blocking(move || work(&store, &scope))
        };

        let result = tokio::select! {
            biased;
            joined = task => joined.map_err(MetadataError::from).and_then(|r| r),
            _ = token.cancelled() => {
                scope.interrupt_all();
                Err(MetadataError::Cancelled)
            }
        };

        metrics::record_operation(operation, started.elapsed());
        debug!(
            "{} finished in {:?} after {} statements",
            operation,
            started.elapsed(),
            scope.round_trips()
        );
        result
    }

    // =========================================================================
    // Single lookups
    // =========================================================================

    pub async fn track(&self, token: &CancellationToken, id: &str) -> Result<Option<Track>> {
        let id = id.to_string();
        self.run_blocking("resolve_track", token, move |store, scope| {
            store.resolve_track(scope, &id)
        })
        .await
    }

    pub async fn tracks_by_isrc(&self, token: &CancellationToken, isrc: &str) -> Result<Vec<Track>> {
        let isrc = isrc.to_string();
        self.run_blocking("resolve_tracks_by_isrc", token, move |store, scope| {
            store.resolve_tracks_by_isrc(scope, &isrc)
        })
        .await
    }

    pub async fn artist(&self, token: &CancellationToken, id: &str) -> Result<Option<Artist>> {
        let id = id.to_string();
        self.run_blocking("resolve_artist", token, move |store, scope| {
            store.resolve_artist(scope, &id)
        })
        .await
    }

    pub async fn album(&self, token: &CancellationToken, id: &str) -> Result<Option<Album>> {
        let id = id.to_string();
        self.run_blocking("resolve_album", token, move |store, scope| {
            store.resolve_album(scope, &id)
        })
        .await
    }

    pub async fn album_tracks(&self, token: &CancellationToken, album_id: &str) -> Result<Vec<Track>> {
        let album_id = album_id.to_string();
        self.run_blocking("resolve_album_tracks", token, move |store, scope| {
            store.resolve_album_tracks(scope, &album_id)
        })
        .await
    }

    // =========================================================================
    // Batches
    // =========================================================================

    pub async fn batch_tracks_by_isrc(
        &self,
        token: &CancellationToken,
        isrcs: Vec<String>,
    ) -> Result<HashMap<String, Vec<Track>>> {
        if isrcs.is_empty() {
            return Ok(HashMap::new());
        }
        self.run_blocking("batch_resolve_by_isrcs", token, move |store, scope| {
            store.batch_resolve_by_isrcs(scope, &isrcs)
        })
        .await
    }

    pub async fn batch_tracks(&self, token: &CancellationToken, ids: Vec<String>) -> Result<Partial<Track>> {
        if ids.is_empty() {
            return Ok(Partial::default());
        }
        self.run_blocking("batch_resolve_tracks", token, move |store, scope| {
            store.batch_resolve_tracks(scope, &ids)
        })
        .await
    }

    pub async fn batch_artists(
        &self,
        token: &CancellationToken,
        ids: Vec<String>,
    ) -> Result<Partial<Artist>> {
        if ids.is_empty() {
            return Ok(Partial::default());
        }
        self.run_blocking("batch_resolve_artists", token, move |store, scope| {
            store.batch_resolve_artists(scope, &ids)
        })
        .await
    }

    pub async fn batch_albums(&self, token: &CancellationToken, ids: Vec<String>) -> Result<Partial<Album>> {
        if ids.is_empty() {
            return Ok(Partial::default());
        }
        self.run_blocking("batch_resolve_albums", token, move |store, scope| {
            store.batch_resolve_albums(scope, &ids)
        })
        .await
    }

    // =========================================================================
    // Search
    // =========================================================================

    pub async fn search_artists(
        &self,
        token: &CancellationToken,
        query: &str,
        limit: i64,
    ) -> Result<Vec<Artist>> {
        let query = validate_search_query(query)?;
        let limit = self.settings.clamp_search_limit(limit);
        self.with_search_deadline(token, "search_artists", move |store, scope| {
            store.search_artists(scope, &query, limit)
        })
        .await
    }

    pub async fn search_tracks(
        &self,
        token: &CancellationToken,
        query: &str,
        limit: i64,
    ) -> Result<Vec<Track>> {
        let query = validate_search_query(query)?;
        let limit = self.settings.clamp_search_limit(limit);
        self.with_search_deadline(token, "search_tracks", move |store, scope| {
            store.search_tracks(scope, &query, limit)
        })
        .await
    }

    async fn with_search_deadline<T, F>(
        &self,
        token: &CancellationToken,
        operation: &'static str,
        work: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&MetadataStore, &QueryScope) -> Result<T> + Send + 'static,
    {
        let deadline = deadline_token(token, self.settings.search_timeout);
        let _stop_timer = deadline.clone().drop_guard();
        match self.run_blocking(operation, &deadline, work).await {
            Err(MetadataError::Cancelled) if !token.is_cancelled() => {
                Err(MetadataError::Timeout(self.settings.search_timeout))
            }
            other => other,
        }
    }
}

fn validate_search_query(query: &str) -> Result<String> {
    let query = query.trim();
    if query.chars().count() < MIN_SEARCH_QUERY_LEN {
        return Err(MetadataError::InvalidRequest(format!(
            "search query must be at least {} characters",
            MIN_SEARCH_QUERY_LEN
        )));
    }
    Ok(query.to_string())
}
