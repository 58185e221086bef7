//! Command handlers.

use std::future::Future;
use std::io::{self, Write};

use anyhow::{Context, Result};
use futures::future::AbortHandle;
use tracing::debug;

use configdesk_core::api::cancellable;
use configdesk_core::models::{Configuration, RegisterRequest};
use configdesk_core::navigation::{PendingIntent, View, LOGIN_PATH};
use configdesk_core::{ApiError, App};

use crate::{Commands, ConfigAction};

/// Password source for non-interactive use
const ENV_PASSWORD: &str = "CONFIGDESK_PASSWORD";

pub async fn run(app: &mut App, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Login { username, return_url } => login(app, username, return_url).await,
        Commands::Register { username, email } => register(app, username, email).await,
        Commands::Logout => {
            let redirect = app.logout();
            println!("Logged out. Continue at {}", redirect.url());
            Ok(())
        }
        Commands::Status => {
            match app.store().current().filter(|r| r.is_valid()) {
                Some(record) => println!("Logged in as {}", record.principal),
                None => println!("Not logged in"),
            }
            Ok(())
        }
        Commands::Open { url } => open(app, &url),
        Commands::Configs { action } => configs(app, action, json).await,
    }
}

/// Read the intent from either a bare path or a login URL
fn intent_from_arg(arg: Option<&str>) -> PendingIntent {
    let Some(arg) = arg else {
        return PendingIntent::none();
    };
    match arg
        .strip_prefix(LOGIN_PATH)
        .and_then(|rest| rest.strip_prefix('?'))
    {
        Some(query) => PendingIntent::from_query(query),
        None => PendingIntent::new(arg),
    }
}

fn prompt_username(default: Option<&str>) -> Result<String> {
    match default {
        Some(last) => print!("Username [{}]: ", last),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match default {
        Some(last) if input.is_empty() => last.to_string(),
        _ => input.to_string(),
    })
}

fn prompt_password() -> Result<String> {
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        return Ok(password);
    }
    rpassword::prompt_password("Password: ").context("Failed to read password")
}

async fn login(app: &mut App, username: Option<String>, return_url: Option<String>) -> Result<()> {
    let username = match username {
        Some(u) => u,
        None => prompt_username(app.config.last_username.as_deref())?,
    };
    let password = prompt_password()?;
    let intent = intent_from_arg(return_url.as_deref());

    let destination = app.login(&username, &password, intent).await?;
    let landing = app.navigate(&destination)?;
    println!("Login successful. Continue at {}", landing.url);
    Ok(())
}

async fn register(app: &mut App, username: String, email: Option<String>) -> Result<()> {
    let password = prompt_password()?;
    let request = RegisterRequest {
        username,
        password,
        email,
    };

    let destination = app.register(&request, PendingIntent::none()).await?;
    println!("Account created. Continue at {}", destination);
    Ok(())
}

fn open(app: &App, url: &str) -> Result<()> {
    let landing = app.navigate(url)?;
    match landing.view {
        View::Dashboard => println!("{} -> dashboard", landing.url),
        View::Login { .. } => println!("{} -> login required", landing.url),
    }
    Ok(())
}

/// Run a request that Ctrl-C cancels
async fn interruptible<T, F>(future: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    let (handle, registration) = AbortHandle::new_pair();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted, cancelling request");
            handle.abort();
        }
    });

    let outcome = cancellable(registration, future).await;
    watcher.abort();
    outcome
}

async fn configs(app: &App, action: ConfigAction, json: bool) -> Result<()> {
    let api = app.api();
    match action {
        ConfigAction::List => {
            let configs = interruptible(api.list_configurations()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&configs)?);
            } else if configs.is_empty() {
                println!("No configurations");
            } else {
                print_header();
                for config in &configs {
                    print_row(config);
                }
            }
        }
        ConfigAction::Get { id } => {
            let config = interruptible(api.get_configuration(id)).await?;
            print_one(&config, json)?;
        }
        ConfigAction::GetKey { key } => {
            let config = interruptible(api.get_configuration_by_key(&key)).await?;
            print_one(&config, json)?;
        }
        ConfigAction::Create {
            key,
            value,
            description,
        } => {
            let config = draft(key, value, description);
            let created = interruptible(api.create_configuration(&config)).await?;
            print_one(&created, json)?;
        }
        ConfigAction::Update {
            id,
            key,
            value,
            description,
        } => {
            let config = draft(key, value, description);
            let updated = interruptible(api.update_configuration(id, &config)).await?;
            print_one(&updated, json)?;
        }
        ConfigAction::Delete { id } => {
            interruptible(api.delete_configuration(id)).await?;
            println!("Deleted configuration {}", id);
        }
    }
    Ok(())
}

fn draft(key: String, value: String, description: Option<String>) -> Configuration {
    let config = Configuration::new(key, value);
    match description {
        Some(description) => config.with_description(description),
        None => config,
    }
}

fn print_header() {
    println!("{:>5}  {:<28} {:<32} {}", "ID", "KEY", "VALUE", "MODIFIED BY");
}

fn print_row(config: &Configuration) {
    let id = config.id.map(|id| id.to_string()).unwrap_or_default();
    println!(
        "{:>5}  {:<28} {:<32} {}",
        id,
        config.key,
        config.value,
        config.last_editor()
    );
}

fn print_one(config: &Configuration, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print_header();
        print_row(config);
        if let Some(ref description) = config.description {
            println!("       {}", description);
        }
    }
    Ok(())
}
