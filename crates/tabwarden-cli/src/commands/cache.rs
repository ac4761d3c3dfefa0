use clap::Subcommand;
use serde_json::{json, Value};
use tabwarden_core::manager::keys;

use super::common;

#[derive(Subcommand)]
pub enum CacheAction {
    /// Number of cached classifications
    Size,
    /// Drop every cached classification
    Clear,
}

pub fn run(action: CacheAction) -> Result<(), Box<dyn std::error::Error>> {
    let rt = common::runtime()?;
    match action {
        CacheAction::Size => rt.block_on(size()),
        CacheAction::Clear => rt.block_on(clear()),
    }
}

async fn size() -> Result<(), Box<dyn std::error::Error>> {
    let store = common::open_store()?;
    let values = store.get(&[keys::CACHE.to_string()]).await?;
    let size = values
        .get(keys::CACHE)
        .and_then(|v| v.as_object())
        .map(|m| m.len())
        .unwrap_or(0);
    println!("{}", serde_json::to_string_pretty(&json!({"cacheSize": size}))?);
    Ok(())
}

async fn clear() -> Result<(), Box<dyn std::error::Error>> {
    let store = common::open_store()?;
    store.set_one(keys::CACHE, Value::Object(Default::default())).await?;
    println!("{}", serde_json::to_string_pretty(&json!({"cleared": true}))?);
    Ok(())
}
