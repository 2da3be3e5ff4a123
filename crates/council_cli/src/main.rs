//! `council-host` entry point.
//!
//! # Responsibility
//! - Resolve configuration, start logging, open the vault and the database.
//! - Serve bridge frames over stdio, or run one command and print its
//!   envelope.
//!
//! # Invariants
//! - Startup fails before any command runs when the vault secret is missing.
//! - stdout carries only frames/envelopes; diagnostics go to stderr or logs.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use council_bridge::HostBridge;
use council_core::config::{DB_PATH_ENV, LOG_DIR_ENV, LOG_LEVEL_ENV};
use council_core::dispatch::dispatcher::command_names;
use council_core::{
    init_logging, AppConfig, CredentialStore, Dispatcher, KeyringCredentialStore, LogLevel,
    MemoryCredentialStore, SqliteRecordStore, Vault,
};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::BufReader;

#[derive(Parser, Debug)]
#[clap(
    name = "council-host",
    version = env!("CARGO_PKG_VERSION"),
    about = "Host process for AI Character Council: API key vault, project records and simulated character dialogue."
)]
struct Cli {
    /// SQLite database file.
    #[clap(long, global = true, env = DB_PATH_ENV)]
    db: Option<PathBuf>,
    /// Absolute directory for rolling log files.
    #[clap(long, global = true, env = LOG_DIR_ENV)]
    log_dir: Option<PathBuf>,
    /// trace|debug|info|warn|error
    #[clap(long, global = true, env = LOG_LEVEL_ENV)]
    log_level: Option<LogLevel>,
    /// Keep API keys in process memory instead of the OS keychain.
    #[clap(long, global = true)]
    memory_keystore: bool,
    #[clap(subcommand)]
    command: HostCommand,
}

#[derive(Subcommand, Debug)]
enum HostCommand {
    /// Serve newline-delimited JSON frames on stdin/stdout until EOF.
    Serve,
    /// Run one command and print its envelope.
    Invoke {
        /// Command name, e.g. `has-api-key`.
        command: String,
        /// JSON payload object.
        payload: Option<String>,
    },
    /// List every command name.
    Commands,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    if let HostCommand::Commands = cli.command {
        for name in command_names() {
            println!("{name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = resolve_config(&cli)?;
    if let Some(log_dir) = config.log_dir.as_deref() {
        init_logging(config.log_level, log_dir).map_err(|err| anyhow!(err))?;
    }

    let store: Box<dyn CredentialStore> = if cli.memory_keystore {
        Box::new(MemoryCredentialStore::new())
    } else {
        Box::new(KeyringCredentialStore::new())
    };
    let vault = Vault::new(store, &config.app_secret).context("failed to initialize API key vault")?;
    let records = SqliteRecordStore::open(&config.db_path)
        .with_context(|| format!("failed to open database at {}", config.db_path.display()))?;
    let bridge = HostBridge::new(Dispatcher::new(vault, records));

    match cli.command {
        HostCommand::Serve => {
            info!(
                "event=host_serve module=cli status=start memory_keystore={}",
                cli.memory_keystore
            );
            bridge
                .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await
                .context("bridge stopped with an I/O error")?;
            Ok(ExitCode::SUCCESS)
        }
        HostCommand::Invoke { command, payload } => {
            let payload = match payload.as_deref() {
                Some(raw) => serde_json::from_str(raw).context("payload is not valid JSON")?,
                None => serde_json::Value::Null,
            };
            let envelope = bridge.invoke(command, payload).await;
            println!("{}", serde_json::to_string(&envelope)?);
            Ok(if envelope.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        HostCommand::Commands => Ok(ExitCode::SUCCESS),
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::from_env()?;
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(log_dir) = &cli.log_dir {
        if !log_dir.is_absolute() {
            return Err(anyhow!("--log-dir must be an absolute path"));
        }
        config.log_dir = Some(log_dir.clone());
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    Ok(config)
}
