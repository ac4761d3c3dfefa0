use clap::Subcommand;
use serde_json::json;
use tabwarden_core::manager::keys;
use tabwarden_core::{Config, EnforcementEngine};

use super::common;

#[derive(Subcommand)]
pub enum EnforceAction {
    /// Enable blocking after sustained non-productive dwell
    On,
    /// Disable blocking; forgives all active blocks
    Off,
    /// Show the current enforcement state
    Status,
}

pub fn run(action: EnforceAction) -> Result<(), Box<dyn std::error::Error>> {
    common::runtime()?.block_on(apply(action))
}

async fn apply(action: EnforceAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store = common::open_store()?;
    let mut engine = EnforcementEngine::new(
        config.enforcement.enabled,
        config.enforcement.block_delay_ms,
    );
    if let Some(v) = store
        .get(&[keys::ENFORCEMENT.to_string()])
        .await?
        .remove(keys::ENFORCEMENT)
    {
        engine.restore(v);
    }

    let mutated = match action {
        EnforceAction::On => {
            engine.set_enabled(true);
            true
        }
        EnforceAction::Off => {
            engine.set_enabled(false);
            true
        }
        EnforceAction::Status => false,
    };
    if mutated {
        store.set_one(keys::ENFORCEMENT, engine.to_value()).await?;
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "enabled": engine.enabled(),
            "activeBlocks": engine.registry().len(),
        }))?
    );
    Ok(())
}
