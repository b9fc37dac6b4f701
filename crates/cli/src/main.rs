//! Kudachat CLI: the main entry point.
//!
//! Commands:
//! - `onboard`    Write the default configuration
//! - `run`        Start the bot (Discord channel, dispatcher, HTTP ingress)
//! - `status`     Show the effective configuration
//! - `usage`      Show a community's token usage
//! - `personas`   List a community's personas
//! - `model`      Show or change the active model
//! - `benchmark`  Probe model access with the configured API key

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "kudachat",
    about = "Kudachat: persona-driven Discord bot",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "KUDACHAT_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Onboard,

    /// Start the bot
    Run {
        /// Override the ingress port
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not register slash commands with Discord on startup
        #[arg(long)]
        skip_register: bool,
    },

    /// Show the effective configuration
    Status,

    /// Show the token usage and estimated cost of a community
    Usage {
        #[arg(short, long)]
        community: String,
    },

    /// List the personas of a community
    Personas {
        #[arg(short, long)]
        community: String,
    },

    /// Show the active model, or change it
    Model {
        #[command(subcommand)]
        action: Option<ModelAction>,
    },

    /// Check which benchmark models the API key can access
    Benchmark,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Switch the active model (must be in `models.allowed`)
    Set { name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Run {
            port,
            skip_register,
        } => commands::run::run(port, !skip_register).await?,
        Commands::Status => commands::status::run().await?,
        Commands::Usage { community } => commands::store::usage(&community).await?,
        Commands::Personas { community } => commands::store::personas(&community).await?,
        Commands::Model { action: None } => commands::store::show_model().await?,
        Commands::Model {
            action: Some(ModelAction::Set { name }),
        } => commands::store::set_model(&name).await?,
        Commands::Benchmark => commands::benchmark::run().await?,
    }

    Ok(())
}
