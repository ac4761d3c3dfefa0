use serde_json::json;
use tabwarden_core::manager::keys;

use super::common;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    common::runtime()?.block_on(show())
}

async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let store = common::open_store()?;
    let wanted: Vec<String> = [keys::QUOTA, keys::ENFORCEMENT, keys::CACHE]
        .iter()
        .map(|k| k.to_string())
        .collect();
    let values = store.get(&wanted).await?;

    let cache_size = values
        .get(keys::CACHE)
        .and_then(|v| v.as_object())
        .map(|m| m.len())
        .unwrap_or(0);
    let enforcement = values.get(keys::ENFORCEMENT);
    let enabled = enforcement
        .and_then(|v| v.get("enabled"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let active_blocks = enforcement
        .and_then(|v| v.get("registry"))
        .and_then(|v| v.as_object())
        .map(|m| m.len())
        .unwrap_or(0);

    let summary = json!({
        "enforcementEnabled": enabled,
        "activeBlocks": active_blocks,
        "cacheSize": cache_size,
        "quota": values.get(keys::QUOTA),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
