use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tabwarden-cli", version, about = "Tabwarden CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tracked-state overview
    Status,
    /// Dwell statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Classification cache management
    Cache {
        #[command(subcommand)]
        action: commands::cache::CacheAction,
    },
    /// Enforcement (blocking) policy
    Enforce {
        #[command(subcommand)]
        action: commands::enforce::EnforceAction,
    },
    /// Manual classification overrides
    Override {
        #[command(subcommand)]
        action: commands::overrides::OverrideAction,
    },
    /// User-blocked domain list
    Domains {
        #[command(subcommand)]
        action: commands::domains::DomainsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Status => commands::status::run(),
        Commands::Stats { action } => commands::stats::run(action),
        Commands::Cache { action } => commands::cache::run(action),
        Commands::Enforce { action } => commands::enforce::run(action),
        Commands::Override { action } => commands::overrides::run(action),
        Commands::Domains { action } => commands::domains::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
