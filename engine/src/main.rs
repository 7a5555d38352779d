//! RitualOS Habit Engine — goal → system → micro-action consistency tracking
//!
//! Converts a user's goal into a repeatable System of MicroActions,
//! records at most one completion per action per calendar day, and derives
//! streaks and a 7-day heatmap from the append-only completion ledger.
//! Ritual content comes from an LLM collaborator with a deterministic
//! offline fallback.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

mod api;
mod claude;
mod config;
mod error;
mod generator;
mod openai;
mod recorder;
mod stats;
mod store;
mod streak;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .compact()
        .init();

    info!("RitualOS habit engine starting...");

    let cfg = config::Config::from_env();

    let store = Arc::new(store::Store::new(&cfg.db_path)?);
    info!("Entity store ready: {}", cfg.db_path);

    let gateway = Arc::new(generator::RitualGateway::from_config(&cfg));
    info!("Ritual generation provider: {}", cfg.provider);

    let state = api::ApiState {
        store,
        gateway,
        free_goal_limit: cfg.free_goal_limit,
    };

    api::serve(&cfg.bind_addr, state).await
}
