//! Codebase command-line client
//!
//! Thin consumer of `auth-client`:
//! 1. Loads config (file and env)
//! 2. Opens the on-disk session store
//! 3. Runs one command through the authenticated pipeline
//! 4. Prints the JSON payload to stdout; logs go to stderr

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use auth_client::{ApiClient, LogListener, Page};
use session_auth::{CredentialStore, FileStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Command-line client for the codebase API
#[derive(Debug, Parser)]
#[command(name = "codebase", version, about)]
struct Cli {
    /// Config file path (falls back to CONFIG_PATH, then ./codebase.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Command {
    /// Log in and store the session. Password is read from CODEBASE_PASSWORD.
    Login { email: String },
    /// Create an account. Password is read from CODEBASE_PASSWORD.
    Signup { name: String, email: String },
    /// Forget the stored session
    Logout,
    /// Show whether a session is stored
    Status,
    /// Dashboard snippets
    Dashboard(PageArgs),
    /// Your own snippets
    Snippets(PageArgs),
    /// Raw snippet data
    Data(PageArgs),
    /// Search snippets
    Search {
        /// Words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Documentation for one snippet
    Docs { id: u64 },
    /// Generate a new API key
    GenerateKey,
}

#[derive(Debug, PartialEq, Eq, clap::Args)]
struct PageArgs {
    #[arg(default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    page: u32,
    #[arg(default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    per_page: u32,
}

impl From<PageArgs> for Page {
    fn from(args: PageArgs) -> Self {
        Page {
            page: args.page,
            per_page: args.per_page,
        }
    }
}

fn load_config(cli_path: Option<&str>) -> Result<Config> {
    let path = Config::resolve_path(cli_path);
    let explicit = cli_path.is_some() || std::env::var_os("CONFIG_PATH").is_some();
    if !explicit && !path.exists() {
        info!(path = %path.display(), "no config file, using defaults");
        return Config::from_env().context("invalid configuration");
    }
    info!(path = %path.display(), "loading configuration");
    Config::load(&path).with_context(|| format!("failed to load config from {}", path.display()))
}

async fn run(
    client: &ApiClient,
    config: &Config,
    command: Command,
) -> auth_client::Result<serde_json::Value> {
    let password = || {
        config.session.password.as_ref().ok_or_else(|| {
            auth_client::Error::InvalidRequest("CODEBASE_PASSWORD is not set".into())
        })
    };

    match command {
        Command::Login { email } => {
            client.login(&email, password()?).await?;
            Ok(serde_json::json!({"logged_in": true, "email": email}))
        }
        Command::Signup { name, email } => client.signup(&name, &email, password()?).await,
        Command::Logout => {
            client.logout().await?;
            Ok(serde_json::json!({"logged_in": false}))
        }
        Command::Status => Ok(serde_json::json!({
            "logged_in": client.is_authenticated().await?,
            "base_url": client.base_url(),
        })),
        Command::Dashboard(page) => client.dashboard(page.into()).await,
        Command::Snippets(page) => client.user_snippets(page.into()).await,
        Command::Data(page) => client.data(page.into()).await,
        Command::Search { query } => client.search(&query.join(" ")).await,
        Command::Docs { id } => client.documentation(id, true).await,
        Command::GenerateKey => client.generate_api_key().await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.api.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;
    let backend = FileStore::open(config.session.store_path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to open session store {}",
                config.session.store_path.display()
            )
        })?;
    let store = Arc::new(CredentialStore::new(Arc::new(backend)));
    let client = ApiClient::new(http, config.api.base_url.clone(), store, Arc::new(LogListener));

    match run(&client, &config, cli.command).await {
        Ok(value) => {
            let out = serde_json::to_string_pretty(&value).context("failed to encode output")?;
            println!("{out}");
            Ok(())
        }
        Err(e) if e.is_session_ended() => {
            warn!(error = %e, "session expired, run `codebase login <email>` to sign in again");
            Err(anyhow!(e))
        }
        Err(e) => Err(anyhow!(e)),
    }
}
