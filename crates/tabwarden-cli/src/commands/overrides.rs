use clap::{Subcommand, ValueEnum};
use serde_json::json;
use tabwarden_core::manager::keys;
use tabwarden_core::overrides::OverrideRegistry;
use tabwarden_core::OverrideState;

use super::common;

#[derive(Clone, Copy, ValueEnum)]
pub enum Classification {
    Productive,
    NonProductive,
}

impl From<Classification> for OverrideState {
    fn from(value: Classification) -> Self {
        match value {
            Classification::Productive => OverrideState::Productive,
            Classification::NonProductive => OverrideState::NonProductive,
        }
    }
}

#[derive(Subcommand)]
pub enum OverrideAction {
    /// Pin a URL's classification, outranking cache and oracle
    Set {
        url: String,
        #[arg(value_enum)]
        classification: Classification,
    },
    /// Remove a pin; the next lookup resolves normally
    Remove { url: String },
    /// List all pinned URLs
    List,
}

pub fn run(action: OverrideAction) -> Result<(), Box<dyn std::error::Error>> {
    common::runtime()?.block_on(apply(action))
}

async fn apply(action: OverrideAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = common::open_store()?;
    let mut registry = OverrideRegistry::default();
    if let Some(v) = store
        .get(&[keys::OVERRIDES.to_string()])
        .await?
        .remove(keys::OVERRIDES)
    {
        registry.restore(v);
    }

    match action {
        OverrideAction::Set {
            url,
            classification,
        } => {
            registry.set(&url, classification.into());
            store.set_one(keys::OVERRIDES, registry.to_value()).await?;
            println!("{}", serde_json::to_string_pretty(&json!({"set": url}))?);
        }
        OverrideAction::Remove { url } => {
            let removed = registry.remove(&url).is_some();
            store.set_one(keys::OVERRIDES, registry.to_value()).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({"removed": removed}))?
            );
        }
        OverrideAction::List => {
            println!("{}", serde_json::to_string_pretty(&registry.to_value())?);
        }
    }
    Ok(())
}
