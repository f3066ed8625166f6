//! # Gated AI Assistant
//!
//! The recipe app talks to a language model in two places: generating a full
//! recipe from a prompt, and a lighter chat that suggests dishes. Both calls
//! are slow and billed, so each goes through its own request gate first.
//!
//! ```text
//!     prompt ──► blank? ──yes──► EmptyPrompt (no admission spent)
//!                  │
//!                  no
//!                  ▼
//!         min send interval ──too soon──► TooSoon
//!                  │
//!                  ▼
//!         caller already waiting? ──yes──► Busy
//!                  │
//!                  ▼
//!            gate.check ──limited──► RateLimitNotice for the user
//!                  │
//!               allowed
//!                  ▼
//!            collaborator call ──► reply / Upstream error
//! ```
//!
//! `EmptyPrompt`, `TooSoon` and `Busy` are refusals: nothing was sent and no
//! admission was spent. The `*_or_fallback` methods turn collaborator failures
//! into the apology the user sees, and leave refusals as errors.
//!
//! The model itself lives behind the [`RecipeGenerator`] and [`ChatSuggester`]
//! traits; this crate never opens a network connection.

use crate::gate::{Admission, GateCategory, GateRegistry};
use crate::recipe::{ChatMessage, GeneratedRecipe};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Failures of the assistant seam. Rate limiting is not one of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssistantError {
    /// The prompt was empty after trimming.
    #[error("prompt is empty")]
    EmptyPrompt,

    /// The same caller sent again inside the minimum send interval.
    #[error("{category} sent again too soon, retry in {retry_after_ms}ms")]
    TooSoon {
        /// The refused action.
        category: GateCategory,
        /// Milliseconds until the next send is accepted.
        retry_after_ms: u64,
    },

    /// The same caller already has a request of this category in progress.
    #[error("a {category} request is already in progress")]
    Busy {
        /// The refused action.
        category: GateCategory,
    },

    /// The generator's reply did not match the recipe schema.
    #[error("generator returned a malformed recipe: {0}")]
    MalformedRecipe(String),

    /// The remote collaborator failed.
    #[error("{category} call failed: {message}")]
    Upstream {
        /// Which action failed.
        category: GateCategory,
        /// Collaborator's description of the failure.
        message: String,
    },
}

impl AssistantError {
    /// Convenience constructor for collaborator implementations.
    pub fn upstream(category: GateCategory, message: impl Into<String>) -> Self {
        Self::Upstream {
            category,
            message: message.into(),
        }
    }

    /// `true` when the request was refused before anything was sent.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            Self::EmptyPrompt | Self::TooSoon { .. } | Self::Busy { .. }
        )
    }
}

/// Alert shown when recipe generation fails upstream.
pub const GENERATION_FAILED_MESSAGE: &str =
    "Sorry, something went wrong while creating the recipe. Please try again.";

/// Transcript entry shown when a chat suggestion fails upstream.
pub const CHAT_FAILED_MESSAGE: &str = "Sorry, something went wrong. Please try again later.";

/// Produces a recipe from a free-text prompt.
///
/// Implementations return the generator's refusal placeholder (see
/// [`GeneratedRecipe::is_invalid_request`]) for prompts unrelated to food.
pub trait RecipeGenerator: Send + Sync {
    /// Generates one recipe.
    fn generate(&self, prompt: &str) -> Result<GeneratedRecipe, AssistantError>;
}

/// Suggests a dish in conversational form.
pub trait ChatSuggester: Send + Sync {
    /// `catalog` holds the names of recipes already in the app, which the
    /// model may recommend instead of inventing a new dish.
    fn suggest(&self, prompt: &str, catalog: &[String]) -> Result<String, AssistantError>;
}

impl<F> RecipeGenerator for F
where
    F: Fn(&str) -> Result<GeneratedRecipe, AssistantError> + Send + Sync,
{
    fn generate(&self, prompt: &str) -> Result<GeneratedRecipe, AssistantError> {
        self(prompt)
    }
}

impl<F> ChatSuggester for F
where
    F: Fn(&str, &[String]) -> Result<String, AssistantError> + Send + Sync,
{
    fn suggest(&self, prompt: &str, catalog: &[String]) -> Result<String, AssistantError> {
        self(prompt, catalog)
    }
}

/// User-facing wait message for a rejected action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitNotice {
    /// The throttled action.
    pub category: GateCategory,
    /// Seconds the user should wait.
    pub retry_after_secs: u64,
}

impl RateLimitNotice {
    /// Builds a notice from a rejected admission, `None` if it was allowed.
    pub fn from_admission(category: GateCategory, admission: Admission) -> Option<Self> {
        admission.retry_after_secs().map(|retry_after_secs| Self {
            category,
            retry_after_secs,
        })
    }

    /// Text to show the user.
    pub fn message(&self) -> String {
        match self.category {
            GateCategory::RecipeGeneration => format!(
                "You have generated too many recipes. Please try again in {} seconds.",
                self.retry_after_secs
            ),
            GateCategory::Chat => format!(
                "You have sent too many messages. Please wait {} seconds.",
                self.retry_after_secs
            ),
        }
    }
}

impl fmt::Display for RateLimitNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// What a recipe request produced.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationReply {
    /// A usable recipe.
    Recipe(GeneratedRecipe),

    /// The generator declined the prompt as unrelated to cooking.
    Declined {
        /// Refusal text from the generator.
        message: String,
    },

    /// The gate rejected the request; nothing was sent.
    Throttled(RateLimitNotice),

    /// The generator failed; `message` is the apology to show instead.
    Failed {
        /// User-facing text.
        message: String,
    },
}

/// Per-category send bookkeeping, keyed by caller.
#[derive(Debug, Default)]
struct SendLane {
    min_interval_ms: Option<u64>,
    last_send_ms: DashMap<String, u64, ahash::RandomState>,
    in_flight: DashSet<String, ahash::RandomState>,
}

impl SendLane {
    /// Leading-edge spacing: a send is accepted only `min_interval_ms` after
    /// the last accepted one. Refused sends do not move the mark.
    fn space(&self, caller: &str, now_ms: u64) -> Result<(), u64> {
        let Some(min_interval_ms) = self.min_interval_ms else {
            return Ok(());
        };

        match self.last_send_ms.entry(caller.to_owned()) {
            Entry::Occupied(mut last) => {
                let next_ms = last.get().saturating_add(min_interval_ms);
                if now_ms < next_ms {
                    return Err(next_ms - now_ms);
                }
                last.insert(now_ms);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now_ms);
            }
        }
        Ok(())
    }

    fn enter(&self, caller: &str) -> Option<InFlight<'_>> {
        self.in_flight.insert(caller.to_owned()).then(|| InFlight {
            in_flight: &self.in_flight,
            caller: caller.to_owned(),
        })
    }

    fn prune(&self, now_ms: u64) -> usize {
        let Some(min_interval_ms) = self.min_interval_ms else {
            return 0;
        };

        let before = self.last_send_ms.len();
        self.last_send_ms
            .retain(|_, last| last.saturating_add(min_interval_ms) > now_ms);
        before.saturating_sub(self.last_send_ms.len())
    }
}

/// Marks a caller busy until dropped, whichever way the call ends.
struct InFlight<'a> {
    in_flight: &'a DashSet<String, ahash::RandomState>,
    caller: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.caller);
    }
}

/// Gates and forwards the app's AI actions.
///
/// ```rust
/// use recipe_gate::prelude::*;
/// use std::sync::Arc;
///
/// let registry = Arc::new(GateRegistry::new(RegistryConfig::default()));
/// let generator = |_: &str| GeneratedRecipe::from_json(r#"{"name":"Phở bò","description":"Beef noodle soup",
///     "servings":2,"prepTime":30,"cookTime":180,"ingredients":[],"steps":[]}"#);
/// let suggester = |prompt: &str, _: &[String]| {
///     Ok::<_, AssistantError>(format!("How about phở for '{prompt}'?"))
/// };
///
/// let assistant = Assistant::new(registry, generator, suggester);
///
/// match assistant.generate_recipe("something warm").unwrap() {
///     GenerationReply::Recipe(recipe) => assert_eq!(recipe.name, "Phở bò"),
///     other => panic!("unexpected reply: {other:?}"),
/// }
/// ```
pub struct Assistant<G, S> {
    gates: Arc<GateRegistry>,
    generator: G,
    suggester: S,
    recipe_lane: SendLane,
    chat_lane: SendLane,
}

impl<G, S> Assistant<G, S>
where
    G: RecipeGenerator,
    S: ChatSuggester,
{
    /// Wires the collaborators to the registry's gates.
    pub fn new(gates: Arc<GateRegistry>, generator: G, suggester: S) -> Self {
        Self {
            gates,
            generator,
            suggester,
            recipe_lane: SendLane::default(),
            chat_lane: SendLane::default(),
        }
    }

    /// Refuses a caller's sends of `category` that come sooner than
    /// `interval` after their last accepted one. A zero interval turns
    /// spacing off, which is the default.
    ///
    /// ```rust
    /// use recipe_gate::prelude::*;
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let registry = Arc::new(GateRegistry::new(RegistryConfig::default()));
    /// let assistant = Assistant::new(
    ///     registry,
    ///     |_: &str| -> Result<GeneratedRecipe, AssistantError> { Err(AssistantError::EmptyPrompt) },
    ///     |_: &str, _: &[String]| Ok::<_, AssistantError>("Try gỏi cuốn".to_string()),
    /// )
    /// .with_min_send_interval(GateCategory::Chat, Duration::from_secs(1));
    ///
    /// assert!(assistant.send_chat("hi", &[]).is_ok());
    /// assert!(matches!(
    ///     assistant.send_chat("hi again", &[]),
    ///     Err(AssistantError::TooSoon { .. })
    /// ));
    /// ```
    pub fn with_min_send_interval(mut self, category: GateCategory, interval: Duration) -> Self {
        let interval_ms = interval.as_millis() as u64;
        let lane = match category {
            GateCategory::RecipeGeneration => &mut self.recipe_lane,
            GateCategory::Chat => &mut self.chat_lane,
        };
        lane.min_interval_ms = (interval_ms > 0).then_some(interval_ms);
        self
    }

    /// The registry this assistant checks against.
    pub fn gates(&self) -> &Arc<GateRegistry> {
        &self.gates
    }

    /// `true` while `caller` has a request of `category` in progress.
    pub fn in_flight(&self, category: GateCategory, caller: &str) -> bool {
        self.lane(category).in_flight.contains(caller)
    }

    /// Forgets send marks older than their interval and returns how many
    /// went. Only needed when spacing is on and callers come and go.
    pub fn prune_send_history(&self) -> usize {
        let now_ms = self.gates.now_ms();
        let removed = self.recipe_lane.prune(now_ms) + self.chat_lane.prune(now_ms);
        if removed > 0 {
            debug!(removed, "Pruned assistant send history");
        }
        removed
    }

    /// Generates a recipe using the category-wide bucket.
    pub fn generate_recipe(&self, prompt: &str) -> Result<GenerationReply, AssistantError> {
        self.generate_recipe_as(GateCategory::RecipeGeneration.key(), prompt)
    }

    /// Generates a recipe counting against `caller`'s bucket.
    pub fn generate_recipe_as(
        &self,
        caller: &str,
        prompt: &str,
    ) -> Result<GenerationReply, AssistantError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(AssistantError::EmptyPrompt);
        }

        let category = GateCategory::RecipeGeneration;
        let _in_flight = self.enter(category, caller)?;
        if let Some(notice) = self.admit(category, caller) {
            return Ok(GenerationReply::Throttled(notice));
        }

        let recipe = self.generator.generate(prompt).map_err(|err| {
            warn!(%category, caller, error = %err, "Recipe generation failed");
            err
        })?;

        if recipe.is_invalid_request() {
            debug!(caller, "Generator declined a non-cooking prompt");
            return Ok(GenerationReply::Declined {
                message: recipe.description,
            });
        }

        Ok(GenerationReply::Recipe(recipe))
    }

    /// Sends a chat message using the category-wide bucket.
    pub fn send_chat(
        &self,
        message: &str,
        catalog: &[String],
    ) -> Result<ChatMessage, AssistantError> {
        self.send_chat_as(GateCategory::Chat.key(), message, catalog)
    }

    /// Sends a chat message counting against `caller`'s bucket.
    ///
    /// A throttled message comes back as an assistant-role entry carrying the
    /// wait notice, ready to append to the transcript.
    pub fn send_chat_as(
        &self,
        caller: &str,
        message: &str,
        catalog: &[String],
    ) -> Result<ChatMessage, AssistantError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AssistantError::EmptyPrompt);
        }

        let category = GateCategory::Chat;
        let _in_flight = self.enter(category, caller)?;
        if let Some(notice) = self.admit(category, caller) {
            return Ok(ChatMessage::model(notice.message()));
        }

        let reply = self.suggester.suggest(message, catalog).map_err(|err| {
            warn!(%category, caller, error = %err, "Chat suggestion failed");
            err
        })?;

        Ok(ChatMessage::model(reply.trim()))
    }

    /// Like [`generate_recipe_as`](Self::generate_recipe_as), but a failed
    /// generator call becomes [`GenerationReply::Failed`] carrying
    /// [`GENERATION_FAILED_MESSAGE`]. Refusals stay errors.
    pub fn generate_recipe_or_fallback(
        &self,
        caller: &str,
        prompt: &str,
    ) -> Result<GenerationReply, AssistantError> {
        match self.generate_recipe_as(caller, prompt) {
            Err(err) if !err.is_refusal() => Ok(GenerationReply::Failed {
                message: GENERATION_FAILED_MESSAGE.to_string(),
            }),
            reply => reply,
        }
    }

    /// Like [`send_chat_as`](Self::send_chat_as), but a failed suggestion
    /// becomes an assistant-role entry carrying [`CHAT_FAILED_MESSAGE`].
    /// Refusals stay errors.
    pub fn send_chat_or_fallback(
        &self,
        caller: &str,
        message: &str,
        catalog: &[String],
    ) -> Result<ChatMessage, AssistantError> {
        match self.send_chat_as(caller, message, catalog) {
            Err(err) if !err.is_refusal() => Ok(ChatMessage::model(CHAT_FAILED_MESSAGE)),
            reply => reply,
        }
    }

    fn lane(&self, category: GateCategory) -> &SendLane {
        match category {
            GateCategory::RecipeGeneration => &self.recipe_lane,
            GateCategory::Chat => &self.chat_lane,
        }
    }

    fn enter(&self, category: GateCategory, caller: &str) -> Result<InFlight<'_>, AssistantError> {
        let lane = self.lane(category);

        lane.space(caller, self.gates.now_ms())
            .map_err(|retry_after_ms| {
                debug!(%category, caller, retry_after_ms, "Send inside minimum interval");
                AssistantError::TooSoon {
                    category,
                    retry_after_ms,
                }
            })?;

        lane.enter(caller).ok_or_else(|| {
            debug!(%category, caller, "Request already in progress");
            AssistantError::Busy { category }
        })
    }

    fn admit(&self, category: GateCategory, caller: &str) -> Option<RateLimitNotice> {
        let admission = self.gates.check(category, caller);
        let notice = RateLimitNotice::from_admission(category, admission);
        if let Some(notice) = &notice {
            debug!(
                %category,
                caller,
                retry_after_secs = notice.retry_after_secs,
                "Assistant action throttled"
            );
        }
        notice
    }
}

impl<G, S> fmt::Debug for Assistant<G, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assistant")
            .field("gates", &self.gates)
            .field("recipe_min_interval_ms", &self.recipe_lane.min_interval_ms)
            .field("chat_min_interval_ms", &self.chat_lane.min_interval_ms)
            .finish_non_exhaustive()
    }
}
