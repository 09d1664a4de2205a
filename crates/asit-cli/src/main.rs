//! ASIT CLI: the `asit` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{AnchorCommands, Cli, Commands};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "ASIT_LOG";

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let ruleset = cli.ruleset;

    match cli.command.unwrap_or(Commands::Check {
        root: ".".to_string(),
        json: false,
    }) {
        Commands::Check { root, json } => commands::check::run(root, ruleset, json),

        Commands::TreeCheck { root, json } => commands::tree_check::run(root, ruleset, json),

        Commands::LeafCheck {
            path,
            kind,
            domain,
            layer,
            json,
        } => commands::leaf_check::run(commands::leaf_check::Args {
            path,
            kind,
            domain,
            layer,
            ruleset,
            json,
        }),

        Commands::FederationCheck { path, json } => commands::contract_check::run(
            commands::contract_check::Contract::Federation,
            path,
            ruleset,
            json,
        ),

        Commands::CoalitionCheck { path, json } => commands::contract_check::run(
            commands::contract_check::Contract::Coalition,
            path,
            ruleset,
            json,
        ),

        Commands::OrchestrationCheck { path, json } => commands::contract_check::run(
            commands::contract_check::Contract::Orchestration,
            path,
            ruleset,
            json,
        ),

        Commands::Anchor { command } => match command {
            AnchorCommands::Build {
                event,
                trace_refs,
                key,
                out,
                json,
            } => commands::anchor::build(event, trace_refs, key, out, json),
            AnchorCommands::Verify {
                path,
                public_key,
                json,
            } => commands::anchor::verify(path, public_key, ruleset, json),
            AnchorCommands::PublicKey { key } => commands::anchor::public_key(key),
        },

        Commands::Canonicalize { path, hash, json } => {
            commands::canonicalize::run(path, hash, ruleset, json)
        }
    }
}
