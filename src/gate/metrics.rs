//! Counters and health reporting for request gates.
//!
//! ```text
//!     Gate Metrics:
//!     ┌─────────────────────────────────────┐
//!     │  Admitted: 42     Rejected: 3       │
//!     │  Windows opened: 12                 │
//!     │  Tracked keys: 2  Swept: 9          │
//!     │  Health: ✅ Healthy                 │
//!     └─────────────────────────────────────┘
//! ```
//!
//! Rejections are an expected outcome for a user-facing throttle, so the
//! health thresholds are loose: a gate only reads as degraded once it turns
//! away more than half of what it sees.

use std::fmt;

/// Rejection ratio above which a gate reads as [`HealthStatus::Degraded`].
const DEGRADED_REJECTION_RATIO: f64 = 0.5;

/// Rejection ratio above which a gate reads as [`HealthStatus::Critical`].
const CRITICAL_REJECTION_RATIO: f64 = 0.8;

/// Snapshot of a gate's lifetime counters.
///
/// Counters are read with relaxed ordering and may be slightly behind each
/// other under concurrent load.
///
/// ```rust
/// use recipe_gate::{GateConfig, RequestGate};
///
/// let gate = RequestGate::new(GateConfig::per_minute(2));
/// gate.check_limit("chat");
/// gate.check_limit("chat");
/// gate.check_limit("chat");
///
/// let metrics = gate.metrics();
/// assert_eq!(metrics.total_admitted, 2);
/// assert_eq!(metrics.total_rejected, 1);
/// println!("{}", metrics);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GateMetrics {
    /// Checks that were admitted.
    pub total_admitted: u64,

    /// Checks that were rejected.
    pub total_rejected: u64,

    /// Windows opened, including replacements of expired records.
    pub windows_opened: u64,

    /// Records removed by `cleanup`.
    pub total_swept: u64,

    /// Records currently stored, live or expired.
    pub tracked_keys: usize,

    /// Configured admission ceiling.
    pub max_requests: u32,

    /// Configured window length in milliseconds.
    pub window_ms: u64,
}

impl GateMetrics {
    /// Total checks seen.
    #[inline]
    pub fn total_checks(&self) -> u64 {
        self.total_admitted + self.total_rejected
    }

    /// Fraction of checks admitted, `1.0` when nothing was checked yet.
    #[inline]
    pub fn success_rate(&self) -> f64 {
        let total = self.total_checks();
        if total == 0 {
            1.0
        } else {
            self.total_admitted as f64 / total as f64
        }
    }

    /// Fraction of checks rejected.
    #[inline]
    pub fn rejection_rate(&self) -> f64 {
        1.0 - self.success_rate()
    }

    /// Counter movement between `earlier` and this snapshot.
    ///
    /// Counters are lifetime totals, so a burst long past keeps weighing on
    /// [`health_status`](Self::health_status). The difference reflects only
    /// what happened in between. Gauges and policy come from `self`.
    ///
    /// ```rust
    /// use recipe_gate::{GateConfig, HealthStatus, RequestGate};
    ///
    /// let gate = RequestGate::new(GateConfig::per_minute(1));
    /// for _ in 0..10 {
    ///     gate.check();
    /// }
    /// let after_burst = gate.metrics();
    /// assert_eq!(after_burst.health_status(), HealthStatus::Critical);
    ///
    /// let quiet = gate.metrics().since(&after_burst);
    /// assert_eq!(quiet.total_checks(), 0);
    /// assert_eq!(quiet.health_status(), HealthStatus::Healthy);
    /// ```
    pub fn since(&self, earlier: &GateMetrics) -> GateMetrics {
        GateMetrics {
            total_admitted: self.total_admitted.saturating_sub(earlier.total_admitted),
            total_rejected: self.total_rejected.saturating_sub(earlier.total_rejected),
            windows_opened: self.windows_opened.saturating_sub(earlier.windows_opened),
            total_swept: self.total_swept.saturating_sub(earlier.total_swept),
            ..self.clone()
        }
    }

    /// Classifies the rejection ratio of the counters in this snapshot.
    pub fn health_status(&self) -> HealthStatus {
        let rejection = self.rejection_rate();
        if rejection > CRITICAL_REJECTION_RATIO {
            HealthStatus::Critical
        } else if rejection > DEGRADED_REJECTION_RATIO {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Multi-line report suitable for logs.
    ///
    /// ```text
    /// Request Gate Metrics:
    /// ├─ Policy: 5 per 60000ms
    /// ├─ Checks:
    /// │  ├─ Admitted: 42
    /// │  ├─ Rejected: 3
    /// │  └─ Success Rate: 93.33%
    /// ├─ Records:
    /// │  ├─ Tracked Keys: 2
    /// │  ├─ Windows Opened: 12
    /// │  └─ Swept: 9
    /// └─ Health: ✅ Healthy
    /// ```
    pub fn summary(&self) -> String {
        format!(
            "Request Gate Metrics:\n\
             ├─ Policy: {} per {}ms\n\
             ├─ Checks:\n\
             │  ├─ Admitted: {}\n\
             │  ├─ Rejected: {}\n\
             │  └─ Success Rate: {:.2}%\n\
             ├─ Records:\n\
             │  ├─ Tracked Keys: {}\n\
             │  ├─ Windows Opened: {}\n\
             │  └─ Swept: {}\n\
             └─ Health: {}",
            self.max_requests,
            self.window_ms,
            self.total_admitted,
            self.total_rejected,
            self.success_rate() * 100.0,
            self.tracked_keys,
            self.windows_opened,
            self.total_swept,
            self.health_status(),
        )
    }
}

impl fmt::Display for GateMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Three-level reading of how hard a gate is pushing back.
///
/// ```text
///     Healthy ──────► at most half of checks rejected
///        │
///     Degraded ─────► more than half rejected
///        │
///     Critical ─────► more than 80% rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Most callers get through.
    Healthy,

    /// Callers are hitting the ceiling regularly.
    Degraded,

    /// Nearly every check is rejected.
    Critical,
}

impl HealthStatus {
    /// `true` for anything but [`HealthStatus::Healthy`].
    pub fn is_unhealthy(&self) -> bool {
        !matches!(self, Self::Healthy)
    }

    /// Operator hint for the status.
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::Healthy => "No action needed",
            Self::Degraded => "Users are waiting often, review the window or ceiling",
            Self::Critical => "Nearly all requests are throttled, check for a runaway client",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "✅ Healthy"),
            Self::Degraded => write!(f, "⚠️ Degraded"),
            Self::Critical => write!(f, "🔴 Critical"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(admitted: u64, rejected: u64) -> GateMetrics {
        GateMetrics {
            total_admitted: admitted,
            total_rejected: rejected,
            windows_opened: 1,
            total_swept: 0,
            tracked_keys: 1,
            max_requests: 5,
            window_ms: 60_000,
        }
    }

    #[test]
    fn test_rates() {
        let m = metrics(80, 20);
        assert_eq!(m.total_checks(), 100);
        assert_eq!(m.success_rate(), 0.8);
        assert!((m.rejection_rate() - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_metrics_are_healthy() {
        let m = metrics(0, 0);
        assert_eq!(m.success_rate(), 1.0);
        assert_eq!(m.health_status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_health_status_thresholds() {
        assert_eq!(metrics(50, 50).health_status(), HealthStatus::Healthy);
        assert_eq!(metrics(40, 60).health_status(), HealthStatus::Degraded);
        assert_eq!(metrics(10, 90).health_status(), HealthStatus::Critical);
    }

    #[test]
    fn test_since_recovers_after_quiet_interval() {
        let burst = metrics(10, 90);
        assert_eq!(burst.health_status(), HealthStatus::Critical);

        let later = GateMetrics {
            total_admitted: 16,
            total_rejected: 92,
            tracked_keys: 0,
            ..burst.clone()
        };
        let interval = later.since(&burst);

        assert_eq!(interval.total_admitted, 6);
        assert_eq!(interval.total_rejected, 2);
        assert_eq!(interval.tracked_keys, 0);
        assert_eq!(interval.health_status(), HealthStatus::Healthy);

        // Lifetime view still carries the burst
        assert_eq!(later.health_status(), HealthStatus::Critical);
    }

    #[test]
    fn test_health_status_helpers() {
        assert!(!HealthStatus::Healthy.is_unhealthy());
        assert!(HealthStatus::Degraded.is_unhealthy());
        assert!(HealthStatus::Critical.is_unhealthy());
        assert_eq!(HealthStatus::Healthy.suggested_action(), "No action needed");
        assert_eq!(format!("{}", HealthStatus::Critical), "🔴 Critical");
    }

    #[test]
    fn test_summary() {
        let summary = metrics(42, 3).summary();
        assert!(summary.contains("Policy: 5 per 60000ms"));
        assert!(summary.contains("Admitted: 42"));
        assert!(summary.contains("Rejected: 3"));
        assert!(summary.contains("Healthy"));
        assert_eq!(summary, format!("{}", metrics(42, 3)));
    }
}
