mod commands;
mod fetch;
mod logging;
mod mirror;
mod notify;
mod pipeline;
mod render;
mod utils;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "calwatch")]
#[command(about = "Watch remote calendars, filter them, and report what changed")]
struct Cli {
    /// Show debug logs and every changed event
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file
    Init {
        /// Config file to create (defaults to ~/.config/calwatch/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Check every configured source once
    Run {
        /// Config file to use (defaults to ~/.config/calwatch/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Report changes without storing, mirroring or notifying
        #[arg(long)]
        dry_run: bool,
    },
    /// Compare two local calendar files
    Diff {
        old: PathBuf,
        new: PathBuf,

        /// Drop events whose description starts with this line (repeatable)
        #[arg(short, long)]
        blacklist: Vec<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Init { config } => commands::init::run(config),
        Commands::Run { config, dry_run } => {
            commands::run::run(config.as_deref(), dry_run, cli.verbose).await
        }
        Commands::Diff {
            old,
            new,
            blacklist,
            json,
        } => commands::diff::run(&old, &new, &blacklist, json, cli.verbose),
    }
}
