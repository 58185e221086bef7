//! configdesk - command-line client for the config manager.
//!
//! # Usage
//!
//! ```bash
//! # Log in, then continue to the page that asked for it
//! configdesk login -u alice --return-url /dashboard
//!
//! # Resolve a page the way the web client would
//! configdesk open /dashboard
//!
//! # Manage configurations
//! configdesk configs list
//! configdesk configs create db.url postgres://db -d "Primary database"
//!
//! # End the session
//! configdesk logout
//! ```
//!
//! Every request carries the stored session's bearer token. If the server
//! rejects it, the session is dropped and the next command starts logged out.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use configdesk_core::auth::Subscription;
use configdesk_core::{ApiError, App, Config};

mod commands;

#[derive(Parser)]
#[command(name = "configdesk")]
#[command(author, version, about = "Config manager command-line client")]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and continue to the requested page
    Login {
        #[arg(short, long)]
        username: Option<String>,
        /// Page to continue to; accepts a path or a `/login?returnUrl=...` URL
        #[arg(long)]
        return_url: Option<String>,
    },
    /// Create an account and log in as it
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: Option<String>,
    },
    /// End the current session
    Logout,
    /// Show who is logged in
    Status,
    /// Resolve an application URL, following redirects
    Open { url: String },
    /// Manage configurations
    Configs {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// List all configurations
    List,
    /// Show a configuration by id
    Get { id: i64 },
    /// Show a configuration by key
    GetKey { key: String },
    /// Create a configuration
    Create {
        key: String,
        value: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Replace a configuration
    Update {
        id: i64,
        key: String,
        value: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a configuration
    Delete { id: i64 },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();

    guard
}

/// Watch for the session going away while a command runs
fn watch_session(app: &App, ended: Arc<AtomicBool>) -> Subscription {
    let had_session = AtomicBool::new(false);
    app.store().subscribe(move |state| match state {
        Some(_) => had_session.store(true, Ordering::SeqCst),
        None => {
            if had_session.swap(false, Ordering::SeqCst) {
                info!("Session ended");
                ended.store(true, Ordering::SeqCst);
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let guard = init_tracing();

    let config = Config::load()?;
    let mut app = App::new(config)?;

    let ended = Arc::new(AtomicBool::new(false));
    let subscription = watch_session(&app, ended.clone());

    let result = commands::run(&mut app, cli.command, cli.json).await;
    subscription.unsubscribe();

    if let Err(e) = result {
        let rejected = matches!(e.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized));
        match e.downcast_ref::<ApiError>() {
            Some(api_error) => {
                debug!(status = ?api_error.status(), error = %api_error, "Command failed");
                eprintln!("Error: {}", api_error.user_message());
            }
            None => eprintln!("Error: {:#}", e),
        }
        if rejected && ended.load(Ordering::SeqCst) {
            if let Ok(landing) = app.navigate("/dashboard") {
                eprintln!("Logged out. Continue at {}", landing.url);
            }
        }
        drop(guard);
        std::process::exit(1);
    }

    Ok(())
}
