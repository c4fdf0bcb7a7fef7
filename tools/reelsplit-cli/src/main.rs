//! ReelSplit CLI: turn one long video into numbered vertical parts.
//!
//! Usage:
//!   reelsplit split <INPUT> [OPTIONS]   Split and decorate a video
//!   reelsplit check                     Check that ffmpeg and ffprobe are usable
//!   reelsplit config                    Print the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use reelsplit_common::config::AppConfig;

mod commands;

use commands::split::SplitArgs;

#[derive(Parser)]
#[command(
    name = "reelsplit",
    about = "Split long videos into branded 9:16 parts",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to $XDG_CONFIG_HOME/reelsplit/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a video into decorated vertical parts
    Split(SplitArgs),

    /// Check that the media tools are installed
    Check,

    /// Print the effective configuration as JSON
    Config {
        /// Write the defaults to the configuration file if it does not exist
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    reelsplit_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Split(args) => commands::split::run(args, &config).await,
        Commands::Check => commands::check::run(),
        Commands::Config { init } => commands::config::run(&config, cli.config, init),
    }
}
