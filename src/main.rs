// ABOUTME: Entry point for the scpe CLI application.
// ABOUTME: Loads the inventory, lets the operator pick a host and runs the session.

mod cli;

use clap::Parser;
use cli::Cli;
use scpe::config::{self, Inventory};
use scpe::error::{Error, Result};
use scpe::{picker, runtime, ssh};
use std::env;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    // The stdin forwarder may still be parked in a blocking read here; exit
    // explicitly instead of letting runtime teardown wait for another key.
    let code = match runtime::block_on_detached(execute(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {e}");
            1
        }
    };
    std::process::exit(code);
}

async fn execute(cli: Cli) -> i32 {
    let inventory = match load_inventory() {
        Ok(inventory) => inventory,
        Err(e) => {
            tracing::error!("load config error: {e}");
            eprintln!("Error: {e}");
            return 1;
        }
    };

    match run(&cli, &inventory).await {
        Ok(()) => 0,
        Err(e @ Error::InvalidArguments(_)) => {
            eprintln!("Error: {e}");
            1
        }
        Err(e) => {
            tracing::error!("{e}");
            0
        }
    }
}

fn load_inventory() -> Result<Inventory> {
    let cwd = env::current_dir()?;
    Inventory::discover(config::home_dir().as_deref(), &cwd)
}

async fn run(cli: &Cli, inventory: &Inventory) -> Result<()> {
    let transfer = cli.transfer().ok_or_else(|| {
        Error::InvalidArguments("exactly one source/target pair is required".to_string())
    })?;

    let Some(host) = picker::pick_from_terminal(inventory.hosts())? else {
        return Ok(());
    };

    let status = ssh::run_session(host, &transfer).await?;
    tracing::debug!(?status, host = %host, "session finished");
    Ok(())
}
