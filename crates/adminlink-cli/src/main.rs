//! adminlink - drive the admin console backend from a terminal.
//!
//! Stores credentials the same way the console does, then issues requests
//! through the shared client (session header, bearer token, retry/backoff).

use std::io;
use std::sync::Arc;

use adminlink_core::api::Method;
use adminlink_core::auth;
use adminlink_core::config::CredentialBackend;
use adminlink_core::{
    AdminApi, AdminResource, ApiError, ClientConfig, HttpClient, NetworkMonitor, RequestBody,
    RequestOptions,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the credential vault passphrase
const PASSPHRASE_ENV: &str = "ADMINLINK_PASSPHRASE";

/// Log file prefix inside `<cache_dir>/logs`
const LOG_FILE_PREFIX: &str = "adminlink.log";

#[derive(Parser)]
#[command(name = "adminlink", version, about = "Admin console API client")]
struct Cli {
    /// Also write logs to a daily-rotated file in the cache directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store the auth token used for bearer authentication
    Login {
        #[arg(long)]
        token: Option<String>,
    },
    /// Store the fallback admin token
    AdminToken {
        #[arg(long)]
        token: Option<String>,
    },
    /// Clear tokens and the session ID
    Logout,
    /// Send a request and print the response body
    Request {
        method: String,
        path: String,
        /// JSON body
        #[arg(long)]
        data: Option<String>,
        /// Use the long timeout for slow endpoints
        #[arg(long)]
        streaming: bool,
        #[arg(long)]
        skip_retry: bool,
    },
    /// List an admin collection (users, groups, prompts, tools, workflows, apps, models, registries)
    List { resource: String },
    /// Check backend health
    Health,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_to_file: bool) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr));

    if !log_to_file {
        registry.init();
        return Ok(None);
    }

    let log_dir = ClientConfig::cache_dir()?.join("logs");
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    registry
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

fn read_secret(given: Option<String>, prompt: &str) -> Result<String> {
    let secret = match given {
        Some(secret) => secret,
        None => rpassword::prompt_password(prompt).context("Failed to read input")?,
    };
    let secret = secret.trim().to_string();
    if secret.is_empty() {
        anyhow::bail!("Empty value, nothing stored");
    }
    Ok(secret)
}

fn vault_passphrase(config: &ClientConfig) -> Result<Option<String>> {
    if config.credential_backend != CredentialBackend::EncryptedFile {
        return Ok(None);
    }
    match std::env::var(PASSPHRASE_ENV) {
        Ok(passphrase) if !passphrase.is_empty() => Ok(Some(passphrase)),
        _ => Ok(Some(read_secret(None, "Vault passphrase: ")?)),
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print what the server said before turning the failure into an exit error
fn report(err: ApiError) -> anyhow::Error {
    if let Some(response) = err.response() {
        if !response.body.is_null() {
            eprintln!("{}", response.body_text());
        }
    }
    if let Some(connectivity) = err.connectivity() {
        eprintln!("connectivity: {:?}", connectivity);
    }
    anyhow::Error::new(err)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file)?;

    let config = ClientConfig::load()?;
    let passphrase = vault_passphrase(&config)?;
    let store = auth::open_store(&config, passphrase.as_deref())?;
    info!(base_url = %config.resolved_base_url(), backend = ?config.credential_backend, "adminlink starting");

    let client = HttpClient::builder(config)
        .credentials(store)
        .network_observer(Arc::new(NetworkMonitor::new()))
        .build()?;
    let api = AdminApi::new(client.clone());

    match cli.command {
        Command::Login { token } => {
            client.set_auth_token(&read_secret(token, "Auth token: ")?)?;
            eprintln!("Auth token stored");
        }
        Command::AdminToken { token } => {
            client.set_admin_token(&read_secret(token, "Admin token: ")?)?;
            eprintln!("Admin token stored");
        }
        Command::Logout => {
            client.logout()?;
            eprintln!("Logged out");
        }
        Command::Request {
            method,
            path,
            data,
            streaming,
            skip_retry,
        } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("Invalid HTTP method {}", method))?;
            let mut options = RequestOptions::new(method);
            if let Some(data) = data {
                let body: Value = serde_json::from_str(&data).context("--data is not valid JSON")?;
                options = options.body(RequestBody::Json(body));
            }
            if skip_retry {
                options = options.skip_retry();
            }
            let client = if streaming { client.streaming() } else { client };

            let response = client.request(&path, options).await.map_err(report)?;
            if response.not_modified {
                eprintln!("{} Not Modified", response.status);
            }
            print_json(&response.data)?;
        }
        Command::List { resource } => {
            let resource = AdminResource::from_name(&resource)
                .ok_or_else(|| anyhow::anyhow!("Unknown resource {}", resource))?;
            let items: Value = api.list(resource).await.map_err(report)?;
            print_json(&items)?;
        }
        Command::Health => {
            let response = api.health().await.map_err(report)?;
            eprintln!("{}", response.status);
            print_json(&response.data)?;
        }
    }

    Ok(())
}
