//! vidgen CLI: entry point.
//!
//! # Commands
//!
//! - `vidgen init`: write the default config and create the videos dir
//! - `vidgen status`: show configuration, models, and config problems
//! - `vidgen models` / `capabilities` / `templates`: browse what is available
//! - `vidgen generate PROMPT [...]`: run one generation end to end
//! - `vidgen task status|cancel --model ID REMOTE_ID`: talk to a provider directly

mod catalog;
mod generate;
mod helpers;
mod onboard;
mod status;
mod task_cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// 🎬 vidgen: multi-provider video generation queue
#[derive(Parser)]
#[command(name = "vidgen", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and the videos directory
    Init,

    /// Show configuration and model status
    Status,

    /// List configured models
    Models,

    /// Show declared provider/model capabilities
    Capabilities {
        /// Only this provider (e.g. "volcengine")
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// List prompt templates
    Templates,

    /// Generate a video and wait for the result
    Generate(generate::GenerateArgs),

    /// Query or cancel a remote task directly
    Task {
        #[command(subcommand)]
        action: task_cmd::TaskCommands,
    },
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => onboard::run(),
        Commands::Status => status::run(),
        Commands::Models => catalog::models(),
        Commands::Capabilities { provider } => catalog::capabilities(provider.as_deref()),
        Commands::Templates => catalog::templates(),
        Commands::Generate(args) => {
            init_logging(args.logs);
            generate::run(args).await
        }
        Commands::Task { action } => {
            init_logging(false);
            task_cmd::dispatch(action).await
        }
    }
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("vidgen=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
