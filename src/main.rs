//! Binary entry point for dotstore.
//!
//! This binary provides a small CLI over the store facade: get, set, has,
//! delete, push, and all, against either backend.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print output in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotstore::config::{BackendKind, StoreConfig};
use dotstore::observability::{self, InitOptions};
use dotstore::{PostgresBackend, RowBackend, SqliteBackend, Store};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;

/// Dotstore - a dot-path document store over SQLite and PostgreSQL.
#[derive(Parser)]
#[command(name = "dotstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides config).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// PostgreSQL connection URL (overrides config).
    #[arg(long, global = true, env = "DOTSTORE_POSTGRES_URL")]
    postgres_url: Option<String>,

    /// Table name (overrides config).
    #[arg(short, long, global = true)]
    table: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Read a value at a dotted key.
    Get {
        /// The key, e.g. "user.money".
        key: String,

        /// Default to persist and return when the root key is absent.
        #[arg(short, long)]
        default: Option<String>,
    },

    /// Set a value at a dotted key.
    Set {
        /// The key, e.g. "user.money".
        key: String,

        /// The value, parsed as JSON with a plain-string fallback.
        value: String,
    },

    /// Check whether a dotted key exists.
    Has {
        /// The key.
        key: String,
    },

    /// Delete a root key and its document.
    Delete {
        /// The root key.
        key: String,
    },

    /// Append values to the array at a dotted key.
    Push {
        /// The key.
        key: String,

        /// Values to append, each parsed as JSON with a string fallback.
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// List every root key and its document.
    All,
}

/// Parses a CLI value as JSON, falling back to a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Builds the backend selected by flags and config.
fn build_backend(cli: &Cli, config: &StoreConfig) -> anyhow::Result<Box<dyn RowBackend>> {
    let table = cli.table.clone().unwrap_or_else(|| config.table.clone());

    if let Some(url) = &cli.postgres_url {
        let backend = PostgresBackend::with_pool_size(url, table, config.pool_max_size)
            .context("failed to create PostgreSQL backend")?;
        return Ok(Box::new(backend));
    }
    if let Some(path) = &cli.db {
        let backend =
            SqliteBackend::new(path, table).context("failed to open SQLite database")?;
        return Ok(Box::new(backend));
    }

    match &config.backend {
        BackendKind::Postgres { url } => {
            let backend = PostgresBackend::with_pool_size(url, table, config.pool_max_size)
                .context("failed to create PostgreSQL backend")?;
            Ok(Box::new(backend))
        },
        BackendKind::Sqlite { path } => {
            let backend =
                SqliteBackend::new(path, table).context("failed to open SQLite database")?;
            Ok(Box::new(backend))
        },
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli
        .config
        .as_deref()
        .map_or_else(StoreConfig::load_default, |path| {
            StoreConfig::load_from_file(path).unwrap_or_default()
        });

    let backend = build_backend(&cli, &config)?;
    let mut store = Store::new(backend);
    store.init().context("store initialization failed")?;

    match cli.command {
        Commands::Get { key, default } => {
            let value = match default {
                Some(raw) => store.get_or_insert(&key, parse_value(&raw))?,
                None => store.get(&key).unwrap_or(Value::Null),
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        },
        Commands::Set { key, value } => {
            let row = store.set(&key, parse_value(&value))?;
            println!("{}", row.value);
        },
        Commands::Has { key } => {
            println!("{}", store.has(&key));
        },
        Commands::Delete { key } => {
            let deleted = store.delete(&key)?;
            println!("{deleted}");
        },
        Commands::Push { key, values } => {
            let parsed: Vec<Value> = values.iter().map(|v| parse_value(v)).collect();
            let value = store.push(&key, parsed)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        },
        Commands::All => {
            let all = store.all()?;
            println!("{}", serde_json::to_string_pretty(&all)?);
        },
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    observability::init(InitOptions {
        verbose: cli.verbose,
        json: cli.json_logs,
    });

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        },
    }
}
