//! # Recipe Gate - Request Throttling for a Recipe Planning App
//!
//! A recipe app lets people ask a language model for a full recipe or chat
//! with it about what to cook. Both calls are slow and billed per request, so
//! the app throttles them before they leave the process. This crate is that
//! throttle: a fixed-window request gate keyed by action category, and the
//! small assistant seam that puts it in front of the model.
//!
//! ## Fixed-Window Counting
//!
//! ```text
//!     5 requests per 60s window:
//!
//!     t=0s    [✅]                 window opens, ends at t=60s
//!     t=1s    [✅✅✅✅]            counts 2..5
//!     t=2s    [✅✅✅✅✅] ❌       "retry in 58s"
//!     t=60s   [✅]                 fresh window
//! ```
//!
//! - **Key** = the action category (or a per-user bucket inside it)
//! - **Window** = fixed interval; the count resets fully once it ends
//! - **Rejection** = a normal outcome carrying a retry-after hint, never an error
//!
//! ## Quick Start
//!
//! ```rust
//! use recipe_gate::{GateConfig, RequestGate};
//!
//! let gate = RequestGate::new(GateConfig::recipe_generation());
//!
//! let admission = gate.check_limit("recipe-generation");
//! if admission.is_allowed() {
//!     // call the generator
//! } else if let Some(secs) = admission.retry_after_secs() {
//!     println!("Please try again in {secs} seconds");
//! }
//! ```
//!
//! ### Application Gates
//!
//! ```rust
//! use recipe_gate::{GateCategory, GateRegistry, RegistryConfig};
//! use std::sync::Arc;
//!
//! // Recipe generation: 5/min, chat: 10/min, sweep every 5 minutes
//! let registry = Arc::new(GateRegistry::new(RegistryConfig::default()));
//!
//! assert!(registry.check_category(GateCategory::Chat).is_allowed());
//!
//! // Optional: let a background thread drop expired records
//! let (handle, stop) = registry.clone().start_stoppable_sweeper().unwrap();
//! stop.send(()).unwrap();
//! handle.join().unwrap();
//! ```
//!
//! ## Architecture Overview
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │   Recipe App Handlers   │
//!                    └──────────┬──────────────┘
//!                               │
//!                    ┌──────────▼──────────────┐
//!                    │       Assistant         │
//!                    │  • generate_recipe()    │
//!                    │  • send_chat()          │
//!                    └──────────┬──────────────┘
//!                               │
//!                ┌──────────────┴───────────────┐
//!                │                               │
//!     ┌──────────▼──────────┐       ┌───────────▼──────────┐
//!     │   Gate Registry     │       │   Collaborators      │
//!     ├─────────────────────┤       ├──────────────────────┤
//!     │ • recipe gate       │       │ • RecipeGenerator    │
//!     │ • chat gate         │       │ • ChatSuggester      │
//!     │ • sweep()           │       │   (host-provided)    │
//!     └─────────────────────┘       └──────────────────────┘
//! ```
//!
//! ## Known Property
//!
//! Fixed windows reset all at once. A burst straddling a boundary can be
//! admitted up to `2 * max_requests - 1` times in quick succession. For a
//! user-experience throttle that is acceptable; the model provider enforces
//! its own authoritative limits.
//!
//! ## Thread Safety
//!
//! [`RequestGate`] and [`GateRegistry`] are `Send + Sync` and meant to be
//! shared through `Arc`. Each check runs under the lock of its key's shard,
//! so the admission ceiling holds exactly under concurrent callers.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    missing_debug_implementations
)]
#![forbid(unsafe_code)]

mod assistant;
mod gate;
mod recipe;

pub use assistant::{
    Assistant, AssistantError, ChatSuggester, GenerationReply, RateLimitNotice, RecipeGenerator,
    CHAT_FAILED_MESSAGE, GENERATION_FAILED_MESSAGE,
};
pub use gate::{
    current_time_ms, Admission, Clock, ConfigError, GateCategory, GateConfig, GateMetrics,
    GateRegistry, HealthStatus, ManualClock, RateLimited, RateRecord, RegistryConfig,
    RegistryStats, RequestGate, SystemClock, DEFAULT_MAX_REQUESTS, DEFAULT_SWEEP_INTERVAL_MS,
    DEFAULT_WINDOW_MS, GLOBAL_KEY,
};
pub use recipe::{
    ChatMessage, ChatRole, GeneratedRecipe, IngredientItem, RecipeStep, INVALID_REQUEST_NAME,
};

use std::sync::Arc;
use std::time::Duration;

/// A request gate wrapped in `Arc` for sharing across threads.
pub type SharedGate = Arc<RequestGate>;

/// A gate registry wrapped in `Arc`, the usual form held by app state.
pub type SharedRegistry = Arc<GateRegistry>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports.
///
/// ```rust
/// use recipe_gate::prelude::*;
///
/// let gate = RequestGate::new(GateConfig::chat());
/// assert!(gate.check().is_allowed());
/// ```
pub mod prelude {
    pub use crate::{
        Admission, Assistant, AssistantError, ChatMessage, ChatSuggester, GateCategory,
        GateConfig, GateRegistry, GeneratedRecipe, GenerationReply, RateLimited, RecipeGenerator,
        RegistryConfig, RequestGate, SharedGate, SharedRegistry,
    };
}

/// Fluent construction of a [`RequestGate`].
///
/// ```rust
/// use recipe_gate::{ManualClock, RequestGateBuilder};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let gate = RequestGateBuilder::new()
///     .max_requests(3)
///     .window(Duration::from_secs(10))
///     .clock(Arc::new(ManualClock::new(0)))
///     .build();
///
/// assert_eq!(gate.remaining("chat"), 3);
///
/// // try_build() reports bad input instead of panicking
/// assert!(RequestGateBuilder::new().max_requests(0).try_build().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct RequestGateBuilder {
    config: GateConfig,
    clock: Arc<dyn Clock>,
}

impl RequestGateBuilder {
    /// Starts from [`GateConfig::default`] on the system clock.
    pub fn new() -> Self {
        Self {
            config: GateConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Starts from an existing configuration.
    pub fn from_config(config: GateConfig) -> Self {
        Self {
            config,
            ..Self::new()
        }
    }

    /// Admissions per window.
    pub fn max_requests(mut self, max_requests: u32) -> Self {
        self.config.max_requests = max_requests;
        self
    }

    /// Window length in milliseconds.
    pub fn window_ms(mut self, window_ms: u64) -> Self {
        self.config.window_ms = window_ms;
        self
    }

    /// Window length.
    pub fn window(self, window: Duration) -> Self {
        self.window_ms(window.as_millis() as u64)
    }

    /// Time source, for tests or custom clocks.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the gate.
    ///
    /// # Panics
    ///
    /// Panics if `max_requests` or the window is zero. Use
    /// [`try_build`](Self::try_build) to handle that case.
    pub fn build(self) -> RequestGate {
        RequestGate::with_clock(self.config, self.clock)
    }

    /// Builds the gate, returning an error for invalid settings.
    pub fn try_build(self) -> Result<RequestGate, ConfigError> {
        RequestGate::try_with_clock(self.config, self.clock)
    }
}

impl Default for RequestGateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
