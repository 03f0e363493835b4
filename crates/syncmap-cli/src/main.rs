//! syncmap CLI - Inspect and drive object identity reconciliation
//!
//! Resolves counterparts, records reconciled syncs, and maintains the internal
//! identifier index from the terminal.

mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::{load_config, resolve_config_path, resolve_db_path};
use crate::commands::index::run_index;
use crate::commands::mappings::run_mappings;
use crate::commands::reconcile::run_reconcile;
use crate::commands::resolve::{run_resolve, Direction};
use crate::error::CliError;

fn main() {
    if let Err(error) = run() {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "syncmap=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let config = load_config(&resolve_config_path(cli.config))?;

    match cli.command {
        Commands::Resolve {
            integration,
            object_type,
            input,
        } => run_resolve(
            Direction::ToInternal,
            &integration,
            &object_type,
            input.as_deref(),
            &db_path,
            &config,
        )?,
        Commands::Reverse {
            integration,
            object_type,
            input,
        } => run_resolve(
            Direction::ToIntegration,
            &integration,
            &object_type,
            input.as_deref(),
            &db_path,
            &config,
        )?,
        Commands::Reconcile { input } => run_reconcile(input.as_deref(), &db_path, &config)?,
        Commands::Index {
            object_type,
            id,
            fields,
            remove,
        } => run_index(&object_type, &id, &fields, remove, &db_path, &config)?,
        Commands::Mappings {
            integration,
            limit,
            json,
        } => run_mappings(&integration, limit, json, &db_path, &config)?,
    }

    Ok(())
}
