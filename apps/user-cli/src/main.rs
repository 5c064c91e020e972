//! user-cli — command-line front-end over the user store.
//!
//! Wires configuration, logging and the store registry together, then runs
//! one command against whatever is bound to `db`:
//! - Storage: JSON file (default) or in-memory via `STORAGE_PROVIDER`.
//! - Logs go to stderr; command output (JSON) goes to stdout.
//!
//! Run:
//! ```bash
//! cargo run -p user-cli -- create John
//! DB_PATH=/tmp/users.json cargo run -p user-cli -- list
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;

use std::process;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use domain::adapters::memory_store::InMemoryStore;
use domain::operation::{CreateUser, NewUser};
use domain::registry::{Registry, DEFAULT_STORE};
use domain::{RecordId, SharedStore};
use json_file_adapter::JsonFileStore;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "user-cli", version, about = "Manage user records in the configured store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a user and print its id
    Create { name: String },
    /// Print one record as JSON
    Get { id: String },
    /// Print every record as a JSON object keyed by id
    List,
    /// Print the number of records
    Count,
    /// Delete a record; succeeds when the id is absent
    Remove { id: String },
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}

// Bind `db` according to config. Nothing is opened until the first resolve.
fn build_registry(cfg: &config::Config) -> Registry {
    let registry = Registry::new();
    match cfg.storage_provider {
        config::StorageProvider::File => {
            let path = cfg.db_path.clone();
            registry.register(DEFAULT_STORE, move || {
                debug!(path = %path.display(), "opening json file store");
                let store: SharedStore = Arc::new(JsonFileStore::new(path.clone()));
                Ok(store)
            });
        }
        config::StorageProvider::Memory => {
            registry.register(DEFAULT_STORE, || {
                let store: SharedStore = Arc::new(InMemoryStore::new());
                Ok(store)
            });
        }
    }
    registry
}

/// Execute one command and return what should be printed on stdout.
fn execute(command: Command, registry: &Registry) -> anyhow::Result<String> {
    match command {
        Command::Create { name } => {
            let op = CreateUser::from_registry(registry)?;
            let id = op.perform(NewUser { name }).context("create failed")?;
            Ok(id.to_string())
        }
        Command::Get { id } => {
            let db = registry.resolve(DEFAULT_STORE)?;
            let id = RecordId::from(id);
            match db.get(&id)? {
                Some(record) => Ok(serde_json::to_string_pretty(&record)?),
                None => bail!("record {id} not found"),
            }
        }
        Command::List => {
            let db = registry.resolve(DEFAULT_STORE)?;
            Ok(serde_json::to_string_pretty(&db.list()?)?)
        }
        Command::Count => {
            let db = registry.resolve(DEFAULT_STORE)?;
            Ok(db.count()?.to_string())
        }
        Command::Remove { id } => {
            let db = registry.resolve(DEFAULT_STORE)?;
            let id = RecordId::from(id);
            db.remove(&id)?;
            info!(%id, "record removed");
            Ok(String::new())
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::Config::from_env()?;
    init_tracing(&cfg);
    cfg.warn_if_ephemeral();

    let registry = build_registry(&cfg);
    let output = execute(cli.command, &registry)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file_config(path: PathBuf) -> config::Config {
        config::Config {
            storage_provider: config::StorageProvider::File,
            db_path: path,
            log_format: config::LogFormat::Pretty,
        }
    }

    fn create(name: &str) -> Command {
        Command::Create {
            name: name.to_string(),
        }
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["user-cli", "create", "John"]).unwrap();
        assert!(matches!(cli.command, Command::Create { name } if name == "John"));
        let cli = Cli::try_parse_from(["user-cli", "remove", "7"]).unwrap();
        assert!(matches!(cli.command, Command::Remove { id } if id == "7"));
        assert!(Cli::try_parse_from(["user-cli", "get"]).is_err());
    }

    #[test]
    fn file_provider_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/db.json");
        let registry = build_registry(&file_config(path.clone()));

        assert_eq!(execute(create("John"), &registry).unwrap(), "1");
        assert_eq!(execute(create("Jane"), &registry).unwrap(), "2");
        assert_eq!(execute(Command::Count, &registry).unwrap(), "2");

        let got = execute(Command::Get { id: "1".into() }, &registry).unwrap();
        let got: serde_json::Value = serde_json::from_str(&got).unwrap();
        assert_eq!(got, serde_json::json!({"name": "John"}));

        execute(Command::Remove { id: "1".into() }, &registry).unwrap();
        execute(Command::Remove { id: "1".into() }, &registry).unwrap();
        let listed: serde_json::Value =
            serde_json::from_str(&execute(Command::List, &registry).unwrap()).unwrap();
        assert_eq!(listed, serde_json::json!({"2": {"name": "Jane"}}));
        assert!(path.exists());
    }

    #[test]
    fn memory_provider_and_stubbing() {
        let cfg = config::Config {
            storage_provider: config::StorageProvider::Memory,
            db_path: PathBuf::from("unused.json"),
            log_format: config::LogFormat::Json,
        };
        let registry = build_registry(&cfg);
        execute(create("John"), &registry).unwrap();

        let stub: SharedStore = Arc::new(InMemoryStore::new());
        let stubbed_count = registry
            .with_stub(DEFAULT_STORE, stub, |_| {
                execute(create("Ghost"), &registry).unwrap();
                execute(Command::Count, &registry).unwrap()
            })
            .unwrap();
        assert_eq!(stubbed_count, "1");
        assert_eq!(execute(Command::Count, &registry).unwrap(), "1");
        let john = execute(Command::Get { id: "1".into() }, &registry).unwrap();
        assert!(john.contains("John"));
    }

    #[test]
    fn get_missing_record_is_an_error() {
        let cfg = config::Config {
            storage_provider: config::StorageProvider::Memory,
            db_path: PathBuf::from("unused.json"),
            log_format: config::LogFormat::Pretty,
        };
        let registry = build_registry(&cfg);
        let err = execute(Command::Get { id: "42".into() }, &registry).unwrap_err();
        assert_eq!(err.to_string(), "record 42 not found");
    }

    #[test]
    fn invalid_name_reports_context() {
        let registry = build_registry(&config::Config {
            storage_provider: config::StorageProvider::Memory,
            db_path: PathBuf::from("unused.json"),
            log_format: config::LogFormat::Pretty,
        });
        let err = execute(create("   "), &registry).unwrap_err();
        assert_eq!(format!("{err:#}"), "create failed: invalid name: empty");
    }
}
