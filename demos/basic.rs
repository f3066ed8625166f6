//! Basic usage example for the recipe-gate crate.
//!
//! Run with `RUST_LOG=recipe_gate=debug cargo run --example basic` to see the
//! gate's own log events.

use recipe_gate::{
    Clock, GateCategory, GateConfig, GateRegistry, ManualClock, RegistryConfig, RequestGate,
    RequestGateBuilder,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Basic Request Gate Example ===\n");

    // Example 1: The recipe generation policy
    recipe_generation_example();

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 2: Windows on a controlled clock
    window_expiry_example();

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 3: Guarding an action
    guard_example();

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 4: Registry, sweeping and metrics
    registry_example();
}

fn recipe_generation_example() {
    println!("1. Recipe Generation (5 per minute):");

    let gate = RequestGate::new(GateConfig::recipe_generation());

    for i in 1..=7 {
        match gate.check_limit("recipe-generation").retry_after_secs() {
            None => println!("   Request {} - ✅ Allowed", i),
            Some(secs) => println!("   Request {} - ❌ Try again in {}s", i, secs),
        }
    }

    println!("   Remaining: {}", gate.remaining("recipe-generation"));
}

fn window_expiry_example() {
    println!("2. Window Expiry:");

    let clock = Arc::new(ManualClock::new(0));
    let gate = RequestGateBuilder::new()
        .max_requests(2)
        .window(Duration::from_secs(10))
        .clock(clock.clone())
        .build();

    for step_ms in [0, 1_000, 3_500, 5_500] {
        clock.advance_ms(step_ms);
        println!("   t={:>6}ms -> {:?}", clock.now_ms(), gate.check_limit("chat"));
    }

    println!("   Window record: {:?}", gate.peek("chat"));
}

fn guard_example() {
    println!("3. Guarded Actions:");

    let gate = RequestGate::new(GateConfig::per_minute(2));

    for i in 1..=3 {
        match gate.guard("chat", || format!("message #{i} sent")) {
            Ok(outcome) => println!("   {}", outcome),
            Err(limited) => println!("   message #{} held back: {}", i, limited),
        }
    }
}

fn registry_example() {
    println!("4. Registry:");

    let config = RegistryConfig::default().with_sweep_interval_ms(50);
    let registry = Arc::new(GateRegistry::new(config));

    let (handle, stop_tx) = registry
        .clone()
        .start_stoppable_sweeper()
        .expect("failed to spawn sweeper thread");

    for user in ["an", "binh", "chi"] {
        for _ in 0..12 {
            registry.check(GateCategory::Chat, user);
        }
        registry.check(GateCategory::RecipeGeneration, user);
    }

    thread::sleep(Duration::from_millis(120));

    let stats = registry.stats();
    println!("{}", stats);
    println!("   Chat health: {}", stats.chat.health_status());

    stop_tx.send(()).ok();
    handle.join().ok();
}
