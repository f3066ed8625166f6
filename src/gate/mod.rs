//! # Request Gate Module
//!
//! Internal layout of the fixed-window request gate.
//!
//! ```text
//!     gate/
//!     ├── mod.rs          (You are here - Module organization)
//!     ├── clock.rs        (Injectable time sources)
//!     ├── config.rs       (Gate and registry settings, env loading)
//!     ├── core.rs         (Fixed-window gate and admission outcome)
//!     ├── metrics.rs      (Counters and health)
//!     └── registry.rs     (Application gates and sweeping)
//! ```
//!
//! ## Flow
//!
//! ```text
//!     Action handler
//!          │
//!          ▼
//!     ┌──────────┐
//!     │ Registry │ ◄── picks the gate for the category
//!     └────┬─────┘
//!          ▼
//!     ┌──────────┐
//!     │   Core   │ ◄── fixed-window check per key
//!     └────┬─────┘
//!          ▼
//!     ┌──────────┐
//!     │  Clock   │ ◄── "now" in milliseconds
//!     └──────────┘
//! ```

mod clock;
mod config;
mod core;
mod metrics;
mod registry;

/// Time sources
pub use clock::{current_time_ms, Clock, ManualClock, SystemClock};

/// Configuration and its errors
pub use config::{
    ConfigError, GateConfig, RegistryConfig, DEFAULT_MAX_REQUESTS, DEFAULT_SWEEP_INTERVAL_MS,
    DEFAULT_WINDOW_MS,
};

/// The gate itself
pub use self::core::{Admission, RateLimited, RateRecord, RequestGate, GLOBAL_KEY};

/// Observability
pub use metrics::{GateMetrics, HealthStatus};

/// Composition root for the application's gates
pub use registry::{GateCategory, GateRegistry, RegistryStats};
