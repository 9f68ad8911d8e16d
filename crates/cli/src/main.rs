//! saucejs CLI - Main Entry Point
//!
//! Runs JavaScript unit-test pages on Sauce Labs browsers and exits 0 only
//! when every job passed.

use clap::{Parser, Subcommand};
use tracing::error;

use saucejs_cli::commands::{jobs, run};
use saucejs_cli::config::{AccountArgs, RunOptions};
use saucejs_cli::output::{self, OutputFormat};

/// saucejs - JavaScript unit tests on Sauce Labs browsers
#[derive(Parser)]
#[command(name = "saucejs")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    account: AccountArgs,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the test pages on every configured browser
    Run(run::RunArgs),

    /// Administer remote jobs
    #[command(subcommand)]
    Jobs(jobs::JobsCommands),

    /// Print the resolved run configuration
    Config(RunOptions),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    // Logs stay off stdout so `--format json|yaml` output can be piped.
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let outcome = match cli.command {
        Commands::Run(args) => run::execute(args, &cli.account, cli.format, cli.verbose).await,
        Commands::Jobs(cmd) => jobs::execute(cmd, &cli.account).await.map(|_| true),
        Commands::Config(options) => run::show(options, &cli.account, cli.format).map(|_| true),
        Commands::Version => {
            println!("saucejs v{}", saucejs_common::VERSION);
            Ok(true)
        }
    };

    match outcome {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            output::print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}
