use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Strata - apply and roll back versioned change-scripts", long_about = None)]
struct Cli {
    /// Config file (defaults to ./strata.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Options shared by every subcommand that targets an evolution directory.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Evolution directory
    path: Option<PathBuf>,

    /// Shared state file (defaults to <path>/.evolution.json)
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Change-script file extension
    #[arg(long)]
    extension: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evolve or roll back a directory to a version
    Apply {
        #[command(flatten)]
        target: TargetArgs,

        /// Target version, or `latest`
        #[arg(long = "to", value_name = "VERSION")]
        version: Option<String>,

        /// Working directory for change-script commands (defaults to the current directory)
        #[arg(long)]
        workdir: Option<PathBuf>,
    },
    /// Show the recorded state of a directory
    Status {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// List the change-scripts found in a directory
    List {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format)?;

    let cwd = std::env::current_dir()?;
    let ctx = commands::Context::load(cli.config.as_deref(), &cwd)?;

    match cli.command {
        Commands::Apply {
            target,
            version,
            workdir,
        } => commands::apply::run(&ctx, &target, version, workdir.unwrap_or(cwd)).await?,
        Commands::Status { target } => commands::status::run(&ctx, &target).await?,
        Commands::List { target } => commands::list::run(&ctx, &target).await?,
    }

    Ok(())
}
