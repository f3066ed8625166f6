//! # Core Request Gate
//!
//! A fixed-window counter keyed by action category. Each key owns one
//! [`RateRecord`]: how many actions were admitted in the current window and
//! when that window ends.
//!
//! ## Fixed Windows
//!
//! ```text
//!     max_requests = 3, window = 60s
//!
//!     t=0s   ✅ count=1   window opens, ends at t=60s
//!     t=5s   ✅ count=2
//!     t=9s   ✅ count=3
//!     t=20s  ❌ retry in 40s
//!     t=60s  ✅ count=1   window expired, a fresh one opens
//! ```
//!
//! The counter resets entirely at the first check after expiry. A burst that
//! straddles a boundary can therefore be admitted up to `2 * max_requests - 1`
//! times in a short span. That is the accepted cost of fixed windows over
//! sliding windows or token buckets.
//!
//! ## Per-Key State Machine
//!
//! ```text
//!     NoRecord ──check──► Active(1, now+w)
//!     Active(c, e) ──check, now<e, c<max──► Active(c+1, e)      ✅
//!     Active(c, e) ──check, now<e, c>=max─► Active(c, e)        ❌
//!     Active(c, e) ──check, now>=e────────► Active(1, now+w)    ✅
//!     Active ──reset / cleanup(expired)───► NoRecord
//! ```
//!
//! ## Concurrency
//!
//! Records live in a sharded [`DashMap`]. The whole read-modify-write of a
//! check happens under the shard lock of its key, so the admission ceiling is
//! exact even when several threads hit the same key.

use super::{
    clock::{Clock, SystemClock},
    config::{ConfigError, GateConfig},
    metrics::GateMetrics,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Key used by [`RequestGate::check`] when a caller has no category.
///
/// Every caller using it shares one bucket.
pub const GLOBAL_KEY: &str = "global";

/// Live window state for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateRecord {
    /// Admissions in the current window, at least 1.
    pub count: u32,

    /// Instant the window expires, in clock milliseconds.
    pub window_end_ms: u64,
}

impl RateRecord {
    #[inline]
    fn open(now_ms: u64, window_ms: u64) -> Self {
        Self {
            count: 1,
            window_end_ms: now_ms.saturating_add(window_ms),
        }
    }

    /// A window ending exactly at `now_ms` is already over.
    #[inline]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.window_end_ms <= now_ms
    }

    /// Whole seconds until expiry, rounded up.
    #[inline]
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        self.window_end_ms.saturating_sub(now_ms).div_ceil(1000)
    }
}

/// Outcome of a gate check.
///
/// ```rust
/// use recipe_gate::{Admission, GateConfig, RequestGate};
///
/// let gate = RequestGate::new(GateConfig::per_minute(1));
/// assert_eq!(gate.check_limit("chat"), Admission::Allowed { count: 1 });
///
/// match gate.check_limit("chat") {
///     Admission::Allowed { .. } => unreachable!(),
///     Admission::Limited { retry_after_secs } => assert!(retry_after_secs >= 1),
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The caller may proceed. `count` is the admission's position in the
    /// current window, starting at 1.
    Allowed {
        /// Admissions in the window including this one.
        count: u32,
    },

    /// The ceiling was reached. The record was not touched.
    Limited {
        /// Seconds until the window ends, always at least 1.
        retry_after_secs: u64,
    },
}

impl Admission {
    /// `true` when the caller may proceed.
    #[inline]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    /// Wait hint, present only on rejection.
    #[inline]
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Allowed { .. } => None,
            Self::Limited { retry_after_secs } => Some(*retry_after_secs),
        }
    }

    /// Converts a rejection into [`RateLimited`] so callers can use `?`.
    pub fn into_result(self) -> Result<u32, RateLimited> {
        match self {
            Self::Allowed { count } => Ok(count),
            Self::Limited { retry_after_secs } => Err(RateLimited { retry_after_secs }),
        }
    }
}

/// A rejected check, as an error value.
///
/// This is the normal "please wait" branch of a throttle, not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rate limited, retry after {retry_after_secs}s")]
pub struct RateLimited {
    /// Seconds until the window ends.
    pub retry_after_secs: u64,
}

/// Fixed-window request gate.
///
/// Construct one per throttled concern and own it from your application
/// state; there are no global instances.
///
/// ```rust
/// use recipe_gate::{GateConfig, RequestGate};
///
/// let gate = RequestGate::new(GateConfig::recipe_generation());
///
/// for _ in 0..5 {
///     assert!(gate.check_limit("recipe-generation").is_allowed());
/// }
/// let sixth = gate.check_limit("recipe-generation");
/// assert_eq!(sixth.retry_after_secs(), Some(60));
///
/// // Other keys are unaffected
/// assert!(gate.check_limit("chat").is_allowed());
/// ```
pub struct RequestGate {
    records: DashMap<String, RateRecord, ahash::RandomState>,

    max_requests: u32,

    window_ms: u64,

    clock: Arc<dyn Clock>,

    total_admitted: AtomicU64,

    total_rejected: AtomicU64,

    windows_opened: AtomicU64,

    total_swept: AtomicU64,
}

impl RequestGate {
    /// Creates a gate on the system clock.
    ///
    /// # Panics
    ///
    /// Panics if the configuration fails [`GateConfig::validate`]. Use
    /// [`try_new`](Self::try_new) to handle that case.
    pub fn new(config: GateConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a gate on the system clock, validating the configuration.
    pub fn try_new(config: GateConfig) -> Result<Self, ConfigError> {
        Self::try_with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a gate reading time from `clock`.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn with_clock(config: GateConfig, clock: Arc<dyn Clock>) -> Self {
        match Self::try_with_clock(config, clock) {
            Ok(gate) => gate,
            Err(err) => panic!("invalid request gate configuration: {err}"),
        }
    }

    /// Creates a gate reading time from `clock`, validating the configuration.
    pub fn try_with_clock(config: GateConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;

        // dashmap needs at least two shards
        let num_shards = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8)
            .next_power_of_two()
            .clamp(2, 64);

        Ok(Self {
            records: DashMap::with_capacity_and_hasher_and_shard_amount(
                0,
                ahash::RandomState::new(),
                num_shards,
            ),
            max_requests: config.max_requests,
            window_ms: config.window_ms,
            clock,
            total_admitted: AtomicU64::new(0),
            total_rejected: AtomicU64::new(0),
            windows_opened: AtomicU64::new(0),
            total_swept: AtomicU64::new(0),
        })
    }

    /// The configuration this gate was built with.
    pub fn config(&self) -> GateConfig {
        GateConfig::new(self.max_requests, self.window_ms)
    }

    /// Decides whether an action for `key` may proceed now.
    ///
    /// Admission opens or extends the key's window; rejection leaves it
    /// untouched and reports how long to wait. Never fails.
    pub fn check_limit(&self, key: &str) -> Admission {
        let now = self.clock.now_ms();

        // Existing keys avoid allocating an owned key for the entry API.
        if let Some(mut record) = self.records.get_mut(key) {
            return self.evaluate(key, record.value_mut(), now);
        }

        match self.records.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => self.evaluate(key, occupied.get_mut(), now),
            Entry::Vacant(vacant) => {
                vacant.insert(RateRecord::open(now, self.window_ms));
                self.on_window_opened(key, now);
                self.on_admitted();
                Admission::Allowed { count: 1 }
            }
        }
    }

    /// [`check_limit`](Self::check_limit) on the shared [`GLOBAL_KEY`] bucket.
    #[inline]
    pub fn check(&self) -> Admission {
        self.check_limit(GLOBAL_KEY)
    }

    /// Runs `action` only if `key` is admitted.
    ///
    /// The closure's return value is passed through untouched, so it can be a
    /// plain value, a `Result`, or a future to await afterwards.
    ///
    /// ```rust
    /// use recipe_gate::{GateConfig, RequestGate};
    ///
    /// let gate = RequestGate::new(GateConfig::per_minute(1));
    ///
    /// let first = gate.guard("chat", || "sent");
    /// assert_eq!(first, Ok("sent"));
    ///
    /// let second = gate.guard("chat", || "sent");
    /// assert!(second.is_err());
    /// ```
    pub fn guard<T, F>(&self, key: &str, action: F) -> Result<T, RateLimited>
    where
        F: FnOnce() -> T,
    {
        self.check_limit(key).into_result()?;
        Ok(action())
    }

    /// Forgets `key` entirely; its next check opens a fresh window.
    pub fn reset(&self, key: &str) {
        if self.records.remove(key).is_some() {
            debug!(key, "Reset request gate record");
        }
    }

    /// Removes every record whose window has ended.
    ///
    /// Only bounds memory: checks replace expired records on their own, so
    /// skipping cleanup never changes an admission decision. Returns the
    /// number of records removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now_ms();
        let mut removed = 0;

        self.records.retain(|_, record| {
            if record.is_expired(now) {
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            self.total_swept.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, remaining = self.records.len(), "Swept expired gate records");
            self.shrink_to_fit();
        }

        removed
    }

    /// Drops all records, live or not.
    ///
    /// Not counted in `total_swept`, which only tracks expiry.
    pub fn clear(&self) {
        let count = self.records.len();
        self.records.clear();
        info!(count, "Cleared all gate records");
    }

    /// The live record for `key`, or `None` when there is none or it expired.
    pub fn peek(&self, key: &str) -> Option<RateRecord> {
        let now = self.clock.now_ms();
        self.records
            .get(key)
            .map(|record| *record.value())
            .filter(|record| !record.is_expired(now))
    }

    /// Admissions still available to `key` in its current window.
    pub fn remaining(&self, key: &str) -> u32 {
        match self.peek(key) {
            Some(record) => self.max_requests.saturating_sub(record.count),
            None => self.max_requests,
        }
    }

    /// Number of stored records, including expired ones not yet swept.
    #[inline]
    pub fn tracked_keys(&self) -> usize {
        self.records.len()
    }

    /// Snapshot of this gate's counters.
    pub fn metrics(&self) -> GateMetrics {
        GateMetrics {
            total_admitted: self.total_admitted.load(Ordering::Relaxed),
            total_rejected: self.total_rejected.load(Ordering::Relaxed),
            windows_opened: self.windows_opened.load(Ordering::Relaxed),
            total_swept: self.total_swept.load(Ordering::Relaxed),
            tracked_keys: self.tracked_keys(),
            max_requests: self.max_requests,
            window_ms: self.window_ms,
        }
    }

    fn evaluate(&self, key: &str, record: &mut RateRecord, now: u64) -> Admission {
        if record.is_expired(now) {
            *record = RateRecord::open(now, self.window_ms);
            self.on_window_opened(key, now);
            self.on_admitted();
            return Admission::Allowed { count: 1 };
        }

        // Strict `<` before incrementing: the check that finds
        // count == max_requests is the first rejection.
        if record.count < self.max_requests {
            record.count += 1;
            self.on_admitted();
            return Admission::Allowed {
                count: record.count,
            };
        }

        let retry_after_secs = record.retry_after_secs(now);
        self.total_rejected.fetch_add(1, Ordering::Relaxed);
        debug!(key, retry_after_secs, "Request gate rejected check");
        Admission::Limited { retry_after_secs }
    }

    #[inline]
    fn on_admitted(&self) {
        self.total_admitted.fetch_add(1, Ordering::Relaxed);
    }

    fn on_window_opened(&self, key: &str, now: u64) {
        self.windows_opened.fetch_add(1, Ordering::Relaxed);
        debug!(
            key,
            window_end_ms = now.saturating_add(self.window_ms),
            "Opened request gate window"
        );
    }

    fn shrink_to_fit(&self) {
        let len = self.records.len();
        let capacity = self.records.capacity();

        if capacity > len * 4 && capacity > 1024 {
            self.records.shrink_to_fit();
            debug!(from = capacity, to = len, "Shrunk gate record map");
        }
    }
}

impl fmt::Debug for RequestGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestGate")
            .field("max_requests", &self.max_requests)
            .field("window_ms", &self.window_ms)
            .field("tracked_keys", &self.tracked_keys())
            .field("clock", &self.clock)
            .finish()
    }
}
