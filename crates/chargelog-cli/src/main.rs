use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chargelog_cli::commands::{process, upload, uploads};
use chargelog_cli::{Cli, Commands, Config};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

/// Opens the upload database, ensuring the parent directory exists.
fn open_database(config: &Config) -> Result<chargelog_db::Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    chargelog_db::Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // try_init: tests may have installed a subscriber already
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let config = load_config(cli.config.as_deref())?;
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Some(Commands::Process { file, source, json }) => {
            let source = source.unwrap_or(config.data_source);
            process::run(&mut stdout, &file, source, json)?;
        }
        Some(Commands::Upload {
            file,
            owner,
            source,
        }) => {
            let mut db = open_database(&config)?;
            let source = source.unwrap_or(config.data_source);
            upload::run(&mut stdout, &mut db, &file, &owner, source)?;
        }
        Some(Commands::Uploads { owner, json }) => {
            let db = open_database(&config)?;
            uploads::list(&mut stdout, &db, owner.as_deref(), json)?;
        }
        Some(Commands::Show { id, json }) => {
            let db = open_database(&config)?;
            uploads::show(&mut stdout, &db, id, json)?;
        }
        Some(Commands::Delete { id }) => {
            let mut db = open_database(&config)?;
            uploads::delete(&mut stdout, &mut db, id)?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
