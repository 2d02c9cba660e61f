//! propdesk - property-management console.
//!
//! Command-line access to the property-management backend with persistent sessions.

#![deny(clippy::all)]

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use propdesk::api::{ApiClient, RecordId, Resource};
use propdesk::auth::token_manager::{format_duration, time_until_expiry};
use propdesk::auth::{AuthClient, SessionManager, SessionState};
use propdesk::config::{Config, StoreKind};
use propdesk::error::AppError;
use propdesk::store::{FileCookieJar, MemoryCookieJar, TokenStore};

#[derive(Debug, Parser)]
#[command(name = "propdesk", version, about = "Property-management console")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and store the session.
    Login {
        /// Username or email.
        #[arg(long)]
        identifier: String,
        /// Password; read from PROPDESK_PASSWORD when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out and clear the stored session.
    Logout,
    /// Show the session state.
    Status,
    /// Show the signed-in user.
    Whoami,
    /// List records of a collection.
    List { resource: Resource },
    /// Show one record.
    Get { resource: Resource, id: String },
    /// Create a record from a JSON object.
    Create { resource: Resource, json: String },
    /// Update fields of a record from a JSON object.
    Update {
        resource: Resource,
        id: String,
        json: String,
    },
    /// Delete a record.
    Delete { resource: Resource, id: String },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present) before anything else
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            eprintln!("\nSet PROPDESK_API_BASE_URL=<backend url> or update config.toml");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    info!("Starting {} v{}", config.app.name, config.app.version);

    if let Err(e) = run(cli.command, &config).await {
        error!("{:#}", e);
        match e.downcast_ref::<AppError>() {
            Some(app_error) => {
                eprintln!("{}", app_error.user_message());
                if app_error.requires_sign_out() {
                    eprintln!("Run `propdesk login` to sign in again.");
                }
            }
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

/// Initialize tracing/logging.
fn init_logging(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(config: &Config) -> Result<Arc<dyn TokenStore>> {
    let store: Arc<dyn TokenStore> = match config.session.store {
        StoreKind::File => {
            let jar = FileCookieJar::open_default().context("Failed to open cookie jar")?;
            info!("Using cookie jar at {:?}", jar.path());
            Arc::new(jar)
        }
        StoreKind::Memory => Arc::new(MemoryCookieJar::new()),
    };
    Ok(store)
}

fn build_client(config: &Config) -> Result<ApiClient> {
    let base_url = config.base_url()?;
    let http_client = reqwest::Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .build()
        .context("Failed to create HTTP client")?;

    let auth_client = AuthClient::with_http_client(base_url.clone(), http_client.clone());
    let session = Arc::new(SessionManager::new(auth_client, open_store(config)?));

    Ok(ApiClient::with_http_client(base_url, http_client, session)
        .with_login_path(config.session.login_path.clone())
        .on_login_required(|path| {
            eprintln!("Session expired, sign-in required at {}.", path);
        }))
}

async fn run(command: Command, config: &Config) -> Result<()> {
    let client = build_client(config)?;

    match command {
        Command::Login {
            identifier,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => env::var("PROPDESK_PASSWORD")
                    .context("No --password given and PROPDESK_PASSWORD is not set")?,
            };
            let message = client.login(&identifier, &password).await?;
            println!(
                "{}",
                if message.is_empty() {
                    "Signed in."
                } else {
                    message.as_str()
                }
            );
        }
        Command::Logout => {
            client.logout().await.map_err(AppError::from)?;
            println!("Signed out.");
        }
        Command::Status => print_status(&client),
        Command::Whoami => {
            let user = client.current_user().await.map_err(AppError::from)?;
            println!("{} <{}>", user.display_name_or_username(), user.email());
            println!("Role: {}", user.role);
        }
        Command::List { resource } => {
            let records = client.list(resource).await.map_err(AppError::from)?;
            print_json(&Value::Array(records))?;
        }
        Command::Get { resource, id } => {
            let record = client
                .get(resource, &RecordId::from(id.as_str()))
                .await
                .map_err(AppError::from)?;
            print_json(&record)?;
        }
        Command::Create { resource, json } => {
            let body = parse_object(&json)?;
            let record = client
                .create(resource, &body)
                .await
                .map_err(AppError::from)?;
            print_json(&record)?;
        }
        Command::Update { resource, id, json } => {
            let body = parse_object(&json)?;
            let record = client
                .update(resource, &RecordId::from(id.as_str()), &body)
                .await
                .map_err(AppError::from)?;
            print_json(&record)?;
        }
        Command::Delete { resource, id } => {
            client
                .delete(resource, &RecordId::from(id.as_str()))
                .await
                .map_err(AppError::from)?;
            println!("Deleted {} {}.", resource, id);
        }
    }

    Ok(())
}

fn print_status(client: &ApiClient) {
    let session = client.session();
    let state = session.state();
    println!("Session: {}", state);

    if state == SessionState::ValidAccess {
        if let Some(claims) = session.claims() {
            if let Some(role) = claims.role {
                println!("Role: {}", role);
            }
        }
        if let Some(remaining) = session.access_expires_at().and_then(time_until_expiry) {
            println!("Access token expires in {}", format_duration(remaining));
        }
    }
    if state.is_authenticated() {
        if let Some(remaining) = session.refresh_expires_at().and_then(time_until_expiry) {
            println!("Refresh token expires in {}", format_duration(remaining));
        }
    }
}

fn parse_object(json: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(json).context("Record body is not valid JSON")?;
    if !value.is_object() {
        anyhow::bail!("Record body must be a JSON object");
    }
    Ok(value)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
