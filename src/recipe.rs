//! Structured output of the recipe generator and chat transcript types.
//!
//! The generator replies with one JSON object per prompt. When the prompt has
//! nothing to do with cooking it still replies with a recipe-shaped object,
//! but with a fixed sentinel name and the refusal text in `description`.

use crate::assistant::AssistantError;
use serde::{Deserialize, Serialize};

/// Name the generator uses for the "not a cooking request" placeholder.
pub const INVALID_REQUEST_NAME: &str = "Yêu cầu không hợp lệ";

/// One ingredient line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientItem {
    /// Ingredient name.
    pub name: String,
    /// Amount with unit, free text.
    pub quantity: String,
}

/// One preparation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeStep {
    /// What to do.
    pub description: String,
    /// Optional illustration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A recipe as produced by the generator.
///
/// Field names follow the generator's camelCase schema. Only `name`,
/// `description`, the three numbers, `ingredients` and `steps` are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedRecipe {
    /// Dish name.
    pub name: String,
    /// Short pitch, or the refusal text for the sentinel.
    pub description: String,
    /// Portions.
    pub servings: u32,
    /// Minutes.
    pub prep_time: u32,
    /// Minutes.
    pub cook_time: u32,
    /// Regional cuisine.
    #[serde(default)]
    pub region: String,
    /// Main ingredient category.
    #[serde(default)]
    pub main_ingredient: String,
    /// Cooking method.
    #[serde(default)]
    pub method: String,
    /// Dominant taste.
    #[serde(default)]
    pub taste: String,
    /// Occasions the dish suits.
    #[serde(default)]
    pub occasion: Vec<String>,
    /// Spice level.
    #[serde(default)]
    pub spice_level: String,
    /// Diet style.
    #[serde(default)]
    pub diet_style: String,
    /// Ingredient list.
    pub ingredients: Vec<IngredientItem>,
    /// Steps in order.
    pub steps: Vec<RecipeStep>,
    /// Cooking tips.
    #[serde(default)]
    pub tips: Vec<String>,
}

impl GeneratedRecipe {
    /// Parses the generator's JSON reply.
    ///
    /// ```rust
    /// use recipe_gate::GeneratedRecipe;
    ///
    /// let recipe = GeneratedRecipe::from_json(r#"{
    ///     "name": "Gà xào sả ớt",
    ///     "description": "Spicy lemongrass chicken",
    ///     "servings": 4, "prepTime": 15, "cookTime": 20,
    ///     "ingredients": [{"name": "chicken", "quantity": "500 g"}],
    ///     "steps": [{"description": "Stir-fry everything"}]
    /// }"#).unwrap();
    ///
    /// assert_eq!(recipe.total_time_minutes(), 35);
    /// assert!(!recipe.is_invalid_request());
    /// ```
    pub fn from_json(raw: &str) -> Result<Self, AssistantError> {
        serde_json::from_str(raw.trim()).map_err(|err| AssistantError::MalformedRecipe(err.to_string()))
    }

    /// `true` when this is the generator's refusal placeholder.
    pub fn is_invalid_request(&self) -> bool {
        self.name.trim() == INVALID_REQUEST_NAME
    }

    /// Preparation plus cooking time, in minutes.
    pub fn total_time_minutes(&self) -> u32 {
        self.prep_time.saturating_add(self.cook_time)
    }
}

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The person using the app.
    User,
    /// The AI assistant.
    Model,
}

/// One entry of the chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author.
    pub role: ChatRole,
    /// Text shown in the transcript.
    pub content: String,
}

impl ChatMessage {
    /// Message typed by the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Message shown as the assistant's.
    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            content: content.into(),
        }
    }
}
