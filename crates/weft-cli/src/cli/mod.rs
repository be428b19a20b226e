//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use weft_core::{config, interrupt, logging};

use crate::render::OutputFormat;

mod commands;

#[derive(Parser)]
#[command(name = "weft")]
#[command(version)]
#[command(about = "Translate LLM provider streams into normalized events")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Streams from a provider and prints normalized events
    Translate {
        /// Provider id (default: from config, or the model's `provider:` prefix)
        #[arg(long)]
        provider: Option<String>,

        /// Model id, optionally prefixed with `provider:`
        #[arg(short, long)]
        model: Option<String>,

        /// JSON Lines file for the replay provider
        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,

        /// Prompt forwarded to remote providers
        #[arg(short, long)]
        prompt: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    /// Lists available providers
    Providers,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    interrupt::init().context("install Ctrl+C handler")?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Translate {
            provider,
            model,
            input,
            prompt,
            format,
        } => {
            let config = config::Config::load().context("load config")?;
            logging::init(config.log_file.as_deref()).context("init logging")?;
            commands::translate::run(commands::translate::TranslateOptions {
                config: &config,
                provider_override: provider.as_deref(),
                model_override: model.as_deref(),
                input,
                prompt,
                format,
            })
            .await
        }
        Commands::Providers => {
            commands::providers::list();
            Ok(())
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
