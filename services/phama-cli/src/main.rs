#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use phama_client::ChatPage;
use phama_common::Config;

mod commands;
mod render;
mod repl;

/// PHAMA - agricultural assistant chat in the terminal.
#[derive(Parser, Debug)]
#[command(name = "phama")]
#[command(version = "0.1.0")]
#[command(about = "Chat with the PHAMA agricultural assistant.", long_about = None)]
struct Cli {
    /// Path to the config file (default: ~/.phama/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, overrides config and PHAMA_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in and remember the session
    Login {
        #[arg(short, long)]
        username: String,

        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account (does not sign in)
    Signup {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        username: String,

        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Sign out and forget the session
    Logout,

    /// Print the conversation
    History,

    /// Send one message and print the updated conversation
    Send {
        /// Message text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Delete the whole conversation
    Clear,

    /// Upload an image to the conversation
    Upload { path: PathBuf },

    /// Interactive chat
    Chat,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_with_env(cli.config.as_deref())?;
    if let Some(url) = &cli.api_url {
        config.backend.base_url.clone_from(url);
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    phama_common::logging::init_from_config(&config.observability);
    tracing::debug!(api_url = %config.api_base_url(), "Starting PHAMA client");

    let page = ChatPage::from_config(&config).context("Failed to set up chat client")?;
    let mut notices = page.subscribe_notices();
    page.init().await;
    commands::drain_notices(&mut notices);

    let result = match cli.command {
        Commands::Login { username, password } => {
            commands::login(&page, &username, password).await
        }
        Commands::Signup {
            name,
            username,
            password,
        } => commands::signup(&page, &name, &username, password).await,
        Commands::Logout => commands::logout(&page).await,
        Commands::History => commands::history(&page).await,
        Commands::Send { text } => commands::send(&page, &text.join(" ")).await,
        Commands::Clear => commands::clear(&page).await,
        Commands::Upload { path } => commands::upload(&page, &path).await,
        Commands::Chat => repl::run(&page, &config).await,
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        // Already shown to the user as a notice
        Err(e) if e.is::<commands::Reported>() => Ok(ExitCode::FAILURE),
        Err(e) => Err(e),
    }
}
