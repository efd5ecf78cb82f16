mod commands;
mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "pulse")]
#[command(about = "In-process metrics aggregation with periodic flush", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a metrics engine from a config file and run until Ctrl-C
    Run {
        /// Path to config file (YAML, TOML, or JSON)
        config_file: PathBuf,

        /// Count `hit.counter` on this interval (e.g. "3s")
        #[arg(long)]
        heartbeat: Option<String>,

        /// Fetch this URL through the instrumented fetch on every heartbeat
        #[arg(long, requires = "heartbeat")]
        ping: Option<String>,
    },

    /// Validate a config file
    Validate {
        /// Path to config file
        config_file: PathBuf,
    },

    /// Show which configured service a target would be classified as
    Classify {
        /// Path to config file
        config_file: PathBuf,

        /// Outbound call target, usually a URL
        target: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            config_file,
            heartbeat,
            ping,
        } => {
            commands::run::execute(config_file, heartbeat, ping).await?;
        }

        Commands::Validate { config_file } => {
            commands::validate::execute(config_file).await?;
        }

        Commands::Classify {
            config_file,
            target,
        } => {
            commands::classify::execute(config_file, target).await?;
        }
    }

    Ok(())
}
