//! `RelayKey` CLI
//!
//! Manage the keychain behind the encrypted session protocol: store and
//! inspect symmetric keys, generate keypairs and derive shared keys.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use relaykey_cli::keys_cmd::{self, KeyCommand};
use relaykey_core::StoreBackend;
use relaykey_core::config::load_config;
use relaykey_core::tracing_init::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "relaykey")]
#[command(version, about = "RelayKey keychain tool", long_about = None)]
struct Cli {
    /// Project directory holding `.relaykey/settings.json`
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,

    /// Keychain backend: memory, file or sqlite
    #[arg(long, global = true)]
    backend: Option<StoreBackend>,

    /// Keychain file or database path
    #[arg(long, global = true)]
    path: Option<PathBuf>,

    /// Log level filter (overrides config)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: KeyCommand,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.project_dir.as_deref()).context("Failed to load config")?;
    if let Some(backend) = cli.backend {
        config.keychain.backend = backend;
    }
    if let Some(path) = cli.path {
        config.keychain.path = Some(path);
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.log_json;

    init_tracing(&config.logging);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = %config.keychain.backend,
        "Starting relaykey"
    );

    let output = keys_cmd::execute(&config.keychain, cli.command).await?;
    print_output(&output);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_output(output: &str) {
    print!("{output}");
}
