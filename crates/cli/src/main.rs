//! Stockwatch CLI - log in and browse store inventory from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Log in (password from STOCKWATCH_PASSWORD or the first stdin line)
//! stockwatch login -e associate@store.example
//!
//! # Who is logged in
//! stockwatch whoami
//!
//! # Product table and stock overview
//! stockwatch products
//! stockwatch dashboard
//!
//! # Create an account (password and confirmation from env or stdin)
//! stockwatch register -e jane@store.example --first-name Jane --last-name Doe --phone 555-0100
//!
//! # Log out
//! stockwatch logout
//! ```
//!
//! # Commands
//!
//! - `login` / `logout` / `whoami` - Session management
//! - `register` - Create an account
//! - `products` / `dashboard` - Inventory views

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use stockwatch_client::{AppState, ClientConfig};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "stockwatch")]
#[command(author, version, about = "Stockwatch inventory CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// End the current session
    Logout,
    /// Create a new account
    Register {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Given name
        #[arg(long)]
        first_name: String,

        /// Family name
        #[arg(long)]
        last_name: String,

        /// Contact phone number
        #[arg(long)]
        phone: String,
    },
    /// Show the logged-in user
    Whoami,
    /// List every product
    Products,
    /// Show stock totals and the product list
    Dashboard,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout stays clean for tables
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::from_env()?;
    let state = AppState::from_config(config)?;

    let outcome = match cli.command {
        Commands::Login { email } => commands::auth::login(&state, &email).await,
        Commands::Logout => commands::auth::logout(&state).await,
        Commands::Register {
            email,
            first_name,
            last_name,
            phone,
        } => commands::auth::register(&state, email, first_name, last_name, phone).await,
        Commands::Whoami => commands::auth::whoami(&state).await,
        Commands::Products => commands::products::list(&state).await,
        Commands::Dashboard => commands::products::dashboard(&state).await,
    };

    // Save cookie changes even when the command failed (e.g. an expired session)
    state.persist_session_cookies()?;
    outcome?;
    Ok(())
}
