use std::io::stdout;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dwell_cli::commands::{clear, export, prune, report, run, settings, status};
use dwell_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(dwell_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db =
        dwell_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // stdout carries the daemon's JSON lines, so logs always go to stderr
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (mut db, config) = open_database(cli.config.as_deref())?;
    let mut out = stdout();

    match command {
        Commands::Run => run::run(db, &config)?,
        Commands::Status => status::run(&mut out, &mut db, &config.database_path)?,
        Commands::Report { date, json } => {
            report::run(&mut out, &mut db, date.as_deref(), *json)?;
        }
        Commands::Export { start, end, output } => {
            export::run(&mut out, &db, start, end, output.as_deref())?;
        }
        Commands::Prune { days } => prune::run(&mut out, &mut db, *days)?,
        Commands::Clear { yes } => clear::run(&mut out, &mut db, *yes)?,
        Commands::Settings(action) => settings::run(&mut out, &mut db, action)?,
    }

    Ok(())
}
