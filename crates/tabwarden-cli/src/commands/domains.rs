use clap::Subcommand;
use serde_json::json;
use tabwarden_core::manager::keys;

use super::common;

#[derive(Subcommand)]
pub enum DomainsAction {
    /// Replace the user-blocked domain list
    Set { domains: Vec<String> },
    /// Show the user-blocked domain list
    List,
}

pub fn run(action: DomainsAction) -> Result<(), Box<dyn std::error::Error>> {
    common::runtime()?.block_on(apply(action))
}

async fn apply(action: DomainsAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = common::open_store()?;
    match action {
        DomainsAction::Set { domains } => {
            store
                .set_one(keys::USER_BLOCKED, serde_json::to_value(&domains)?)
                .await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({"userBlocked": domains}))?
            );
        }
        DomainsAction::List => {
            let values = store.get(&[keys::USER_BLOCKED.to_string()]).await?;
            let list = values
                .get(keys::USER_BLOCKED)
                .cloned()
                .unwrap_or_else(|| json!([]));
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
    }
    Ok(())
}
