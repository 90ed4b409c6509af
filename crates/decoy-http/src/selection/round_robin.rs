//! Per-endpoint round-robin cursors.

use parking_lot::{RwLock, RwLockWriteGuard};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Cursor for one endpoint: the index served last and when.
struct Cursor {
    last_index: AtomicI64,
    /// Milliseconds since the scheduler's epoch.
    last_used: AtomicU64,
}

impl Cursor {
    fn new(now: u64) -> Self {
        Self {
            last_index: AtomicI64::new(-1),
            last_used: AtomicU64::new(now),
        }
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("last_index", &self.last_index.load(Ordering::Relaxed))
            .field("last_used", &self.last_used.load(Ordering::Relaxed))
            .finish()
    }
}

/// Rotates through an endpoint's responses, one step per call.
///
/// Each endpoint has its own cursor, created on first use and dropped once it
/// has been idle for longer than the state TTL. Expiry is lazy: stale cursors
/// are purged during [`RoundRobinScheduler::next_index`], there is no timer.
///
/// Consistency is relaxed. The cursor is read and then written back as two
/// separate atomic operations, so concurrent calls for the same endpoint may
/// observe the same index and the last write wins. Cursors of different
/// endpoints never affect each other.
pub struct RoundRobinScheduler {
    cursors: RwLock<HashMap<String, Cursor>>,
    ttl: Duration,
    epoch: Instant,
}

impl Default for RoundRobinScheduler {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

impl RoundRobinScheduler {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cursors: RwLock::new(HashMap::new()),
            ttl,
            epoch: Instant::now(),
        }
    }

    /// Index of the next response to serve for `endpoint_id` out of `len`
    /// candidates, or `None` when there are none.
    pub fn next_index(&self, endpoint_id: &str, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let now = self.now_ms();

        let next = {
            let mut cursors = self.cursors.read();
            // Read lock on the hot path; insert under a write lock on first use
            // and downgrade.
            let cursor = if let Some(cursor) = cursors.get(endpoint_id) {
                cursor
            } else {
                drop(cursors);
                let mut write = self.cursors.write();
                write
                    .entry(endpoint_id.to_string())
                    .or_insert_with(|| Cursor::new(now));
                cursors = RwLockWriteGuard::downgrade(write);
                cursors.get(endpoint_id)?
            };

            let last = cursor.last_index.load(Ordering::Relaxed);
            let next = (last + 1).rem_euclid(len as i64);
            cursor.last_index.store(next, Ordering::Relaxed);
            cursor.last_used.store(now, Ordering::Relaxed);
            next as usize
        };

        self.purge_stale(now);
        Some(next)
    }

    /// Pick the next item of `items` for `endpoint_id`.
    pub fn next<'a, T>(&self, endpoint_id: &str, items: &'a [T]) -> Option<&'a T> {
        self.next_index(endpoint_id, items.len())
            .and_then(|index| items.get(index))
    }

    /// Number of endpoints with live cursors.
    pub fn tracked_endpoints(&self) -> usize {
        self.cursors.read().len()
    }

    pub fn reset(&self, endpoint_id: &str) {
        self.cursors.write().remove(endpoint_id);
    }

    fn purge_stale(&self, now: u64) {
        let ttl = self.ttl.as_millis() as u64;
        let is_stale =
            |cursor: &Cursor| now.saturating_sub(cursor.last_used.load(Ordering::Relaxed)) > ttl;

        if !self.cursors.read().values().any(is_stale) {
            return;
        }

        let mut cursors = self.cursors.write();
        let before = cursors.len();
        cursors.retain(|_, cursor| !is_stale(cursor));
        debug!(
            "Purged {} idle round-robin cursor(s)",
            before - cursors.len()
        );
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}
