//! # Time Sources
//!
//! The gate never reads the system clock directly. It asks a [`Clock`] for
//! "now" in milliseconds, which lets tests drive window expiry precisely
//! instead of sleeping.
//!
//! ```text
//!     RequestGate ──► Arc<dyn Clock>
//!                         │
//!              ┌──────────┴──────────┐
//!              ▼                     ▼
//!         SystemClock           ManualClock
//!     (monotonic epoch ms)   (set / advance by hand)
//! ```
//!
//! Window expiry is only correct for a clock that never moves backwards.
//! [`SystemClock`] guarantees this by anchoring a monotonic [`Instant`] to the
//! wall clock once per process.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

// Wall-clock epoch milliseconds captured at first use, advanced by a
// monotonic Instant so system clock jumps never move "now" backwards.
static START_TIME_BASE: OnceLock<(Instant, u64)> = OnceLock::new();

/// Returns the current time in milliseconds since UNIX epoch.
///
/// The value is monotonically non-decreasing for the life of the process.
///
/// # Example
///
/// ```rust
/// use recipe_gate::current_time_ms;
///
/// let before = current_time_ms();
/// let after = current_time_ms();
/// assert!(after >= before);
/// ```
#[inline]
pub fn current_time_ms() -> u64 {
    let (start, base_ms) = START_TIME_BASE.get_or_init(|| {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        (Instant::now(), epoch_ms)
    });
    base_ms.saturating_add(start.elapsed().as_millis() as u64)
}

/// Source of the current instant, in milliseconds.
///
/// Implementations must be non-decreasing across calls.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in milliseconds.
    fn now_ms(&self) -> u64;
}

/// Process clock backed by [`current_time_ms`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        current_time_ms()
    }
}

/// A clock that only moves when told to.
///
/// Share it with a gate through `Arc` and keep a handle in the test:
///
/// ```rust
/// use recipe_gate::{ManualClock, RequestGate, GateConfig};
/// use std::sync::Arc;
///
/// let clock = Arc::new(ManualClock::new(0));
/// let gate = RequestGate::with_clock(GateConfig::new(1, 1_000), clock.clone());
///
/// assert!(gate.check_limit("chat").is_allowed());
/// assert!(!gate.check_limit("chat").is_allowed());
///
/// clock.advance_ms(1_000);
/// assert!(gate.check_limit("chat").is_allowed());
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    /// Creates a clock frozen at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
        }
    }

    /// Moves the clock forward by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::AcqRel);
    }

    /// Moves the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        self.advance_ms(duration.as_millis() as u64);
    }

    /// Jumps to an absolute instant.
    ///
    /// Setting a value earlier than the current one breaks the
    /// non-decreasing contract of [`Clock`]; the gate does not guard against it.
    pub fn set_ms(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::Release);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_monotonicity() {
        let mut last_ms = 0;

        for _ in 0..10 {
            let ms = current_time_ms();
            assert!(ms >= last_ms);
            last_ms = ms;
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_system_clock_tracks_epoch() {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;

        // Anchored at first use, so it can lag the wall clock slightly but
        // never by more than the test run.
        let now = SystemClock.now_ms();
        assert!(now + 60_000 > epoch_ms);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(500);
        assert_eq!(clock.now_ms(), 500);

        clock.advance_ms(250);
        assert_eq!(clock.now_ms(), 750);

        clock.advance(Duration::from_secs(2));
        assert_eq!(clock.now_ms(), 2_750);

        clock.set_ms(10_000);
        assert_eq!(clock.now_ms(), 10_000);
    }

    #[test]
    fn test_manual_clock_default_starts_at_zero() {
        assert_eq!(ManualClock::default().now_ms(), 0);
    }
}
