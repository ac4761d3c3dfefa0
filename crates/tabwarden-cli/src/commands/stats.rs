use clap::Subcommand;
use serde_json::{json, Value};
use tabwarden_core::manager::keys;
use tabwarden_core::stats::StatsBook;

use super::common;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Totals and per-domain breakdown
    Show,
    /// Clear all accumulated dwell statistics
    Reset,
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let rt = common::runtime()?;
    match action {
        StatsAction::Show => rt.block_on(show()),
        StatsAction::Reset => rt.block_on(reset()),
    }
}

async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let store = common::open_store()?;
    let wanted: Vec<String> = [keys::STATS, keys::CACHE]
        .iter()
        .map(|k| k.to_string())
        .collect();
    let mut values = store.get(&wanted).await?;

    let mut book = StatsBook::default();
    if let Some(v) = values.remove(keys::STATS) {
        book.restore(v);
    }
    let cache_size = values
        .get(keys::CACHE)
        .and_then(|v| v.as_object())
        .map(|m| m.len())
        .unwrap_or(0);
    println!(
        "{}",
        serde_json::to_string_pretty(&book.snapshot(cache_size))?
    );
    Ok(())
}

async fn reset() -> Result<(), Box<dyn std::error::Error>> {
    let store = common::open_store()?;
    store.set_one(keys::STATS, Value::Object(Default::default())).await?;
    println!("{}", serde_json::to_string_pretty(&json!({"reset": true}))?);
    Ok(())
}
