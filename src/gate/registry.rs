//! # Gate Registry
//!
//! The application owns one gate per expensive action. The registry is that
//! ownership point: it builds both gates from a [`RegistryConfig`], routes
//! checks by [`GateCategory`], and runs the periodic sweep that keeps the
//! record maps from growing without bound.
//!
//! ```text
//!     Recipe submit ──┐                   ┌──► recipe_generation gate (5/min)
//!                     ├──► GateRegistry ──┤
//!     Chat send ──────┘        │          └──► chat gate (10/min)
//!                              │
//!                         sweep() every sweep_interval_ms
//!                         (caller-owned thread, optional)
//! ```
//!
//! Gates never spawn anything themselves. Sweeping is either called by the
//! host's own scheduler or driven by one of the sweeper threads started here.

use super::{
    clock::{Clock, SystemClock},
    config::{ConfigError, RegistryConfig},
    core::{Admission, RequestGate},
    metrics::GateMetrics,
};
use std::fmt;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// The throttled actions of the recipe application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateCategory {
    /// Generating a full recipe from a free-text prompt.
    RecipeGeneration,

    /// Sending a message to the AI chat assistant.
    Chat,
}

impl GateCategory {
    /// Both categories, in a stable order.
    pub const ALL: [GateCategory; 2] = [GateCategory::RecipeGeneration, GateCategory::Chat];

    /// Bucket key used in the category's gate.
    pub fn key(&self) -> &'static str {
        match self {
            Self::RecipeGeneration => "recipe-generation",
            Self::Chat => "chat",
        }
    }
}

impl fmt::Display for GateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Owner of the application's request gates.
///
/// ```rust
/// use recipe_gate::{GateCategory, GateRegistry, RegistryConfig};
///
/// let registry = GateRegistry::new(RegistryConfig::default());
///
/// // Per-user buckets inside the recipe generation gate
/// assert!(registry.check(GateCategory::RecipeGeneration, "user-42").is_allowed());
///
/// // Or the category-wide bucket
/// assert!(registry.check_category(GateCategory::Chat).is_allowed());
/// ```
#[derive(Debug)]
pub struct GateRegistry {
    recipe_generation: RequestGate,

    chat: RequestGate,

    sweep_interval_ms: u64,

    clock: Arc<dyn Clock>,
}

impl GateRegistry {
    /// Builds both gates on the system clock.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid. Use
    /// [`try_new`](Self::try_new) to handle that case.
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Builds both gates on the system clock, validating the configuration.
    pub fn try_new(config: RegistryConfig) -> Result<Self, ConfigError> {
        Self::try_with_clock(config, Arc::new(SystemClock))
    }

    /// Builds both gates sharing `clock`.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn with_clock(config: RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        match Self::try_with_clock(config, clock) {
            Ok(registry) => registry,
            Err(err) => panic!("invalid gate registry configuration: {err}"),
        }
    }

    /// Builds both gates sharing `clock`, validating the configuration.
    pub fn try_with_clock(
        config: RegistryConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            recipe_generation: RequestGate::try_with_clock(config.recipe_generation, clock.clone())?,
            chat: RequestGate::try_with_clock(config.chat, clock.clone())?,
            sweep_interval_ms: config.sweep_interval_ms,
            clock,
        })
    }

    /// Builds the registry from environment variables.
    ///
    /// See [`RegistryConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::try_new(RegistryConfig::from_env()?)
    }

    /// The gate guarding `category`.
    #[inline]
    pub fn gate(&self, category: GateCategory) -> &RequestGate {
        match category {
            GateCategory::RecipeGeneration => &self.recipe_generation,
            GateCategory::Chat => &self.chat,
        }
    }

    /// Checks `key` inside the gate of `category`.
    #[inline]
    pub fn check(&self, category: GateCategory, key: &str) -> Admission {
        self.gate(category).check_limit(key)
    }

    /// Checks the category-wide bucket, shared by every caller.
    #[inline]
    pub fn check_category(&self, category: GateCategory) -> Admission {
        self.check(category, category.key())
    }

    /// Sweeps expired records from every gate and returns how many went.
    pub fn sweep(&self) -> usize {
        let removed: usize = GateCategory::ALL
            .iter()
            .map(|category| self.gate(*category).cleanup())
            .sum();

        if removed > 0 {
            debug!(removed, "Registry sweep removed expired records");
        }
        removed
    }

    /// Current time on the clock shared by both gates, in milliseconds.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Configured sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Counters for both gates.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            recipe_generation: self.recipe_generation.metrics(),
            chat: self.chat.metrics(),
        }
    }

    /// Starts a named thread calling [`sweep`](Self::sweep) every
    /// `sweep_interval_ms`, for the life of the process.
    ///
    /// Hosts with their own scheduler should call `sweep` from it instead.
    pub fn start_sweeper(self: Arc<Self>) -> std::io::Result<thread::JoinHandle<()>> {
        let registry = self;

        thread::Builder::new()
            .name("recipe-gate-sweeper".to_string())
            .spawn(move || {
                info!(
                    interval_ms = registry.sweep_interval_ms,
                    "Started gate sweeper thread"
                );

                let mut baseline = registry.stats();
                loop {
                    thread::sleep(registry.sweep_interval());
                    registry.sweep_and_report(&mut baseline);
                }
            })
    }

    /// Starts a sweeper thread that stops when the returned sender fires or
    /// is dropped.
    ///
    /// ```rust
    /// use recipe_gate::{GateRegistry, RegistryConfig};
    /// use std::sync::Arc;
    ///
    /// let registry = Arc::new(GateRegistry::new(RegistryConfig::default()));
    /// let (handle, stop_tx) = registry.clone().start_stoppable_sweeper().unwrap();
    ///
    /// stop_tx.send(()).unwrap();
    /// handle.join().unwrap();
    /// ```
    pub fn start_stoppable_sweeper(
        self: Arc<Self>,
    ) -> std::io::Result<(thread::JoinHandle<()>, mpsc::Sender<()>)> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let registry = self;

        let handle = thread::Builder::new()
            .name("recipe-gate-sweeper".to_string())
            .spawn(move || {
                info!(
                    interval_ms = registry.sweep_interval_ms,
                    "Started stoppable gate sweeper thread"
                );

                let mut baseline = registry.stats();
                loop {
                    match stop_rx.recv_timeout(registry.sweep_interval()) {
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                            info!("Gate sweeper thread stopping");
                            break;
                        }
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            registry.sweep_and_report(&mut baseline);
                        }
                    }
                }
            })?;

        Ok((handle, stop_tx))
    }

    /// Sweeps, then reports how hard each gate pushed back since `baseline`.
    ///
    /// Rejections are the normal throttling branch, so pressure is logged at
    /// `debug`. The baseline moves forward to the current counters.
    fn sweep_and_report(&self, baseline: &mut RegistryStats) -> RegistryStats {
        self.sweep();

        let current = self.stats();
        let interval = current.since(baseline);

        for category in GateCategory::ALL {
            let metrics = interval.for_category(category);
            let health = metrics.health_status();
            if health.is_unhealthy() {
                debug!(
                    %category,
                    %health,
                    admitted = metrics.total_admitted,
                    rejected = metrics.total_rejected,
                    action = health.suggested_action(),
                    "Request gate pushed back during sweep interval"
                );
            }
        }

        *baseline = current;
        interval
    }
}

/// Metrics of every gate in a registry.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryStats {
    /// Recipe generation gate.
    pub recipe_generation: GateMetrics,

    /// Chat gate.
    pub chat: GateMetrics,
}

impl RegistryStats {
    /// Metrics of the gate guarding `category`.
    pub fn for_category(&self, category: GateCategory) -> &GateMetrics {
        match category {
            GateCategory::RecipeGeneration => &self.recipe_generation,
            GateCategory::Chat => &self.chat,
        }
    }

    /// Counter movement of both gates since `earlier`.
    ///
    /// See [`GateMetrics::since`].
    pub fn since(&self, earlier: &RegistryStats) -> RegistryStats {
        RegistryStats {
            recipe_generation: self.recipe_generation.since(&earlier.recipe_generation),
            chat: self.chat.since(&earlier.chat),
        }
    }

    /// Records stored across both gates.
    pub fn tracked_keys(&self) -> usize {
        self.recipe_generation.tracked_keys + self.chat.tracked_keys
    }

    /// Rejections across both gates.
    pub fn total_rejected(&self) -> u64 {
        self.recipe_generation.total_rejected + self.chat.total_rejected
    }

    /// Human-readable report.
    pub fn summary(&self) -> String {
        format!(
            "Gate Registry Stats:\n\
             ├─ Tracked Keys: {}\n\
             ├─ Total Rejected: {}\n\
             ├─ [recipe-generation]\n{}\n\
             └─ [chat]\n{}",
            self.tracked_keys(),
            self.total_rejected(),
            self.recipe_generation.summary(),
            self.chat.summary()
        )
    }
}

impl fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::clock::ManualClock;
    use crate::gate::config::GateConfig;
    use crate::gate::metrics::HealthStatus;

    fn registry() -> (GateRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let registry = GateRegistry::with_clock(RegistryConfig::default(), clock.clone());
        (registry, clock)
    }

    #[test]
    fn test_now_follows_shared_clock() {
        let (registry, clock) = registry();
        clock.advance_ms(1_234);
        assert_eq!(registry.now_ms(), 1_234);
    }

    #[test]
    fn test_category_keys() {
        assert_eq!(GateCategory::RecipeGeneration.key(), "recipe-generation");
        assert_eq!(GateCategory::Chat.key(), "chat");
        assert_eq!(GateCategory::Chat.to_string(), "chat");
    }

    #[test]
    fn test_gates_use_their_own_policy() {
        let (registry, _clock) = registry();

        assert_eq!(
            registry.gate(GateCategory::RecipeGeneration).config(),
            GateConfig::recipe_generation()
        );
        assert_eq!(registry.gate(GateCategory::Chat).config(), GateConfig::chat());

        for _ in 0..5 {
            assert!(registry.check_category(GateCategory::RecipeGeneration).is_allowed());
        }
        assert!(!registry.check_category(GateCategory::RecipeGeneration).is_allowed());

        // Chat is untouched and allows ten
        for _ in 0..10 {
            assert!(registry.check_category(GateCategory::Chat).is_allowed());
        }
        assert_eq!(
            registry.check_category(GateCategory::Chat).retry_after_secs(),
            Some(60)
        );
    }

    #[test]
    fn test_per_user_keys() {
        let (registry, _clock) = registry();

        for _ in 0..5 {
            registry.check(GateCategory::RecipeGeneration, "alice");
        }
        assert!(!registry.check(GateCategory::RecipeGeneration, "alice").is_allowed());
        assert!(registry.check(GateCategory::RecipeGeneration, "bob").is_allowed());
    }

    #[test]
    fn test_sweep() {
        let (registry, clock) = registry();

        registry.check(GateCategory::RecipeGeneration, "a");
        registry.check(GateCategory::Chat, "b");
        clock.advance_ms(30_000);
        registry.check(GateCategory::Chat, "c");

        clock.advance_ms(30_000);
        assert_eq!(registry.sweep(), 2);

        let stats = registry.stats();
        assert_eq!(stats.tracked_keys(), 1);
        assert_eq!(stats.chat.total_swept, 1);
        assert_eq!(stats.recipe_generation.total_swept, 1);
    }

    #[test]
    fn test_sweep_report_covers_only_the_interval() {
        let (registry, clock) = registry();
        let mut baseline = registry.stats();

        for _ in 0..60 {
            registry.check_category(GateCategory::Chat);
        }

        let busy = registry.sweep_and_report(&mut baseline);
        assert_eq!(busy.chat.total_admitted, 10);
        assert_eq!(busy.chat.total_rejected, 50);
        assert_eq!(busy.chat.health_status(), HealthStatus::Critical);
        assert_eq!(
            busy.for_category(GateCategory::RecipeGeneration).health_status(),
            HealthStatus::Healthy
        );

        clock.advance(Duration::from_secs(24 * 60 * 60));
        let idle = registry.sweep_and_report(&mut baseline);

        assert_eq!(idle.chat.total_checks(), 0);
        assert_eq!(idle.chat.total_swept, 1);
        assert_eq!(idle.chat.health_status(), HealthStatus::Healthy);
        assert_eq!(registry.stats().tracked_keys(), 0);
    }

    #[test]
    fn test_stats_summary() {
        let (registry, _clock) = registry();

        registry.check_category(GateCategory::Chat);
        let summary = registry.stats().summary();
        assert!(summary.contains("Tracked Keys: 1"));
        assert!(summary.contains("[recipe-generation]"));
        assert!(summary.contains("Policy: 10 per 60000ms"));
    }

    #[test]
    fn test_invalid_config() {
        let config = RegistryConfig {
            chat: GateConfig::new(0, 1_000),
            ..RegistryConfig::default()
        };
        assert_eq!(
            GateRegistry::try_new(config).unwrap_err(),
            ConfigError::ZeroMaxRequests
        );
    }

    #[test]
    fn test_stoppable_sweeper() {
        let clock = Arc::new(ManualClock::new(0));
        let registry = Arc::new(GateRegistry::with_clock(
            RegistryConfig::default().with_sweep_interval_ms(20),
            clock.clone(),
        ));

        for i in 0..5 {
            registry.check(GateCategory::Chat, &format!("user-{i}"));
        }
        clock.advance_ms(60_000);

        let (handle, stop_tx) = registry.clone().start_stoppable_sweeper().unwrap();
        thread::sleep(Duration::from_millis(150));

        stop_tx.send(()).unwrap();
        handle.join().unwrap();

        assert_eq!(registry.stats().tracked_keys(), 0);
    }

    #[test]
    fn test_sweeper_stops_when_sender_dropped() {
        let registry = Arc::new(GateRegistry::new(
            RegistryConfig::default().with_sweep_interval_ms(10),
        ));

        let (handle, stop_tx) = registry.start_stoppable_sweeper().unwrap();
        drop(stop_tx);
        handle.join().unwrap();
    }

    #[test]
    fn test_background_sweeper() {
        let clock = Arc::new(ManualClock::new(0));
        let registry = Arc::new(GateRegistry::with_clock(
            RegistryConfig::default().with_sweep_interval_ms(20),
            clock.clone(),
        ));

        registry.check_category(GateCategory::RecipeGeneration);
        clock.advance_ms(60_000);

        let handle = registry.clone().start_sweeper().unwrap();
        thread::sleep(Duration::from_millis(150));

        assert_eq!(registry.stats().tracked_keys(), 0);
        // Runs until the process exits
        drop(handle);
    }
}
