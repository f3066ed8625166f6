//! The assistant seam with stand-in collaborators.
//!
//! A real app would call a hosted model here; these closures return canned
//! answers so the throttling behaviour is easy to watch.

use recipe_gate::prelude::*;
use recipe_gate::INVALID_REQUEST_NAME;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn canned_recipe(prompt: &str) -> Result<GeneratedRecipe, AssistantError> {
    let raw = if prompt.contains("homework") {
        serde_json::json!({
            "name": INVALID_REQUEST_NAME,
            "description": "I can only help with cooking and recipes.",
            "servings": 0, "prepTime": 0, "cookTime": 0,
            "ingredients": [], "steps": []
        })
    } else {
        serde_json::json!({
            "name": "Bún bò Huế",
            "description": format!("Spicy beef noodle soup, for '{prompt}'"),
            "servings": 4, "prepTime": 40, "cookTime": 120,
            "region": "Miền Trung",
            "ingredients": [{"name": "beef shank", "quantity": "600 g"}],
            "steps": [{"description": "Simmer the broth with lemongrass"}],
            "tips": ["Add shrimp paste at the end"]
        })
    };
    GeneratedRecipe::from_json(&raw.to_string())
}

fn canned_suggestion(prompt: &str, catalog: &[String]) -> Result<String, AssistantError> {
    match catalog.first() {
        Some(dish) => Ok(format!("For \"{prompt}\", the app already has {dish}.")),
        None => Ok(format!("For \"{prompt}\", try a bowl of phở.")),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let registry = Arc::new(GateRegistry::from_env()?);
    let assistant = Assistant::new(registry, canned_recipe, canned_suggestion)
        .with_min_send_interval(GateCategory::Chat, Duration::from_millis(200));

    println!("=== Recipe Generation ===\n");
    for prompt in ["something spicy", "my math homework", "", "soup", "noodles", "beef", "rice"] {
        match assistant.generate_recipe_or_fallback("an", prompt) {
            Ok(GenerationReply::Recipe(recipe)) => println!(
                "   {:<18} -> {} ({} min)",
                prompt,
                recipe.name,
                recipe.total_time_minutes()
            ),
            Ok(GenerationReply::Declined { message }) => println!("   {:<18} -> declined: {}", prompt, message),
            Ok(GenerationReply::Throttled(notice)) => println!("   {:<18} -> {}", prompt, notice),
            Ok(GenerationReply::Failed { message }) => println!("   {:<18} -> {}", prompt, message),
            Err(err) => println!("   {:<18} -> error: {}", prompt, err),
        }
    }

    println!("\n=== Chat ===\n");
    let catalog = vec!["Cá kho tộ".to_string()];
    for i in 1..=12 {
        match assistant.send_chat_or_fallback("an", &format!("idea #{i}"), &catalog) {
            Ok(reply) => println!("   [{:?}] {}", reply.role, reply.content),
            Err(refused) => println!("   (dropped: {})", refused),
        }
        thread::sleep(Duration::from_millis(if i % 3 == 0 { 50 } else { 250 }));
    }

    info!(stats = %assistant.gates().stats().summary(), "Final gate state");
    Ok(())
}
