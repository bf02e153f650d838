//! Bounded read-only connection pools and per-call query scopes.
//!
//! Every store operation runs inside a [`QueryScope`]. The scope carries the
//! caller's cancellation token, keeps the interrupt handles of connections it
//! currently holds, and counts the statements it issued.

use crate::error::{MetadataError, Result};
use rusqlite::{
    CachedStatement, Connection, InterruptHandle, OpenFlags, OptionalExtension, Params, Row,
    Statement,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Connection pragmas applied to every pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePragmas {
    /// Page cache size in KiB
    pub cache_size_kib: i64,
    pub mmap_size_bytes: u64,
}

impl Default for StorePragmas {
    fn default() -> Self {
        Self {
            cache_size_kib: 65536,
            mmap_size_bytes: 1 << 30,
        }
    }
}

// =============================================================================
// Query scope
// =============================================================================

pub struct QueryScope {
    token: CancellationToken,
    active: Mutex<HashMap<u64, Arc<InterruptHandle>>>,
    next_registration: AtomicU64,
    round_trips: AtomicUsize,
}

impl QueryScope {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            active: Mutex::new(HashMap::new()),
            next_registration: AtomicU64::new(0),
            round_trips: AtomicUsize::new(0),
        }
    }

    /// A scope nobody will cancel.
    pub fn detached() -> Self {
        Self::new(CancellationToken::new())
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(MetadataError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Number of statements issued so far, across both stores.
    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }

    /// Aborts every statement currently running on a connection held by this scope.
    pub fn interrupt_all(&self) {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in active.values() {
            handle.interrupt();
        }
        if !active.is_empty() {
            debug!("Interrupted {} in-flight queries", active.len());
        }
    }

    /// Maps a driver error, reporting interrupted statements as cancellation.
    pub fn classify(&self, err: rusqlite::Error) -> MetadataError {
        if self.is_cancelled() {
            MetadataError::Cancelled
        } else {
            MetadataError::Query(err)
        }
    }

    fn register(&self, handle: Arc<InterruptHandle>) -> Result<u64> {
        let id = self.next_registration.fetch_add(1, Ordering::Relaxed);
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, handle);
        if self.is_cancelled() {
            self.unregister(id);
            return Err(MetadataError::Cancelled);
        }
        Ok(id)
    }

    fn unregister(&self, id: u64) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    fn count_round_trip(&self) {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Pool
// =============================================================================

struct PoolSlot {
    conn: Mutex<Connection>,
    interrupt: Arc<InterruptHandle>,
}

pub struct ReadPool {
    label: &'static str,
    slots: Vec<PoolSlot>,
    next: AtomicUsize,
}

impl ReadPool {
    /// Opens `size` read-only connections to the database at `path`.
    pub fn open(label: &'static str, path: &Path, size: usize, pragmas: StorePragmas) -> Result<Self> {
        if size == 0 {
            return Err(MetadataError::Config(format!(
                "{} pool size must be at least 1",
                label
            )));
        }

        let mmap_size = i64::try_from(pragmas.mmap_size_bytes).map_err(|_| {
            MetadataError::Config(format!(
                "{} mmap size {} exceeds {}",
                label,
                pragmas.mmap_size_bytes,
                i64::MAX
            ))
        })?;

        let mut slots = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.pragma_update(None, "cache_size", -pragmas.cache_size_kib)?;
            conn.pragma_update(None, "mmap_size", mmap_size)?;
            conn.pragma_update(None, "query_only", true)?;
            let interrupt = Arc::new(conn.get_interrupt_handle());
            slots.push(PoolSlot {
                conn: Mutex::new(conn),
                interrupt,
            });
        }

        debug!("Opened {} pool with {} connections at {:?}", label, size, path);
        Ok(Self {
            label,
            slots,
            next: AtomicUsize::new(0),
        })
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Takes an idle connection, or waits on one if all are busy.
    pub fn acquire<'a>(&'a self, scope: &'a QueryScope) -> Result<PooledConnection<'a>> {
        scope.check()?;

        let len = self.slots.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed);

        let mut acquired = None;
        for offset in 0..len {
            let slot = &self.slots[(start + offset) % len];
            match slot.conn.try_lock() {
                Ok(guard) => {
                    acquired = Some((slot, guard));
                    break;
                }
                // A panic in another reader leaves the connection itself usable
                Err(TryLockError::Poisoned(poisoned)) => {
                    acquired = Some((slot, poisoned.into_inner()));
                    break;
                }
                Err(TryLockError::WouldBlock) => continue,
            }
        }

        let (slot, guard) = match acquired {
            Some(found) => found,
            None => {
                let slot = &self.slots[start % len];
                let guard = slot.conn.lock().unwrap_or_else(PoisonError::into_inner);
                (slot, guard)
            }
        };

        let registration = scope.register(slot.interrupt.clone())?;
        Ok(PooledConnection {
            guard,
            scope,
            registration,
        })
    }
}

/// A connection checked out of a [`ReadPool`] for one scope.
///
/// Statements are prepared through this wrapper so the scope can count them
/// and refuse new work once cancelled.
pub struct PooledConnection<'a> {
    guard: MutexGuard<'a, Connection>,
    scope: &'a QueryScope,
    registration: u64,
}

impl PooledConnection<'_> {
    pub fn prepare_cached(&self, sql: &str) -> Result<CachedStatement<'_>> {
        self.scope.check()?;
        self.scope.count_round_trip();
        self.guard
            .prepare_cached(sql)
            .map_err(|e| self.scope.classify(e))
    }

    /// For statements whose text depends on the input size (IN lists).
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        self.scope.check()?;
        self.scope.count_round_trip();
        self.guard.prepare(sql).map_err(|e| self.scope.classify(e))
    }

    /// Runs a cached statement and collects every mapped row.
    pub fn query_all<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.prepare_cached(sql)?;
        let rows = stmt
            .query_map(params, f)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<T>>>());
        rows.map_err(|e| self.scope.classify(e))
    }

    /// Same as [`Self::query_all`] for statements built around an IN list.
    pub fn query_in<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.prepare(sql)?;
        let rows = stmt
            .query_map(params, f)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<T>>>());
        rows.map_err(|e| self.scope.classify(e))
    }

    pub fn query_optional<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.prepare_cached(sql)?;
        let row = stmt.query_row(params, f).optional();
        row.map_err(|e| self.scope.classify(e))
    }

    pub fn scope(&self) -> &QueryScope {
        self.scope
    }

    /// Direct access for schema checks, bypassing round-trip accounting.
    pub(crate) fn raw(&self) -> &Connection {
        &self.guard
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        // Unregister before the guard is released so an interrupt can never
        // reach a connection that has been handed to another scope.
        self.scope.unregister(self.registration);
    }
}

/// Builds `?, ?, ?` for an IN clause of `count` values.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
