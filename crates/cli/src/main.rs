//! fedsts CLI - Main Entry Point
//!
//! Drives the automated federated sign-on ceremony and hands the resulting
//! temporary AWS credentials to a credentials file or a subprocess
//! environment.

use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;
mod credfile;
mod resolve;

use commands::{creds, exec, profiles};
use resolve::GlobalArgs;

/// Fetch temporary AWS credentials through an institutional federated
/// sign-on ceremony (username/password plus a push or call second factor).
#[derive(Parser)]
#[command(name = "fedsts")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write new temporary credentials to a credentials file
    Creds(creds::CredsArgs),

    /// Run a command (or a shell) with new temporary credentials
    Exec(exec::ExecArgs),

    /// List profiles found in the config file
    Profiles,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.global.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Creds(args) => creds::execute(args, &cli.global).await,
        Commands::Exec(args) => exec::execute(args, &cli.global).await,
        Commands::Profiles => profiles::execute(&cli.global),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "ERROR:".red().bold(), e);
        std::process::exit(1);
    }
}
