//! Session CLI
//!
//! Command-line shell around `session-client`:
//! 1. Loads config and the persisted session record
//! 2. Runs one command (`login`, `register`, `logout`, `status`, `request`)
//! 3. Reports session invalidation on stderr so the user knows to sign in again
//!
//! Command output goes to stdout; logs go to stderr as JSON.

mod config;

use anyhow::{Context, Result, bail};
use session_auth::{CredentialStore, FileStorage};
use session_client::SessionClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::{ApiRequest, Method, ReqwestTransport};

use crate::config::Config;

const USAGE: &str = "usage: session-cli [--config PATH] <command>

commands:
  login [EMAIL]              sign in (password from SESSION_PASSWORD or auth.password_file)
  register NAME EMAIL        create an account and sign in
  logout                     revoke the session and forget it locally
  status                     show who is signed in
  request METHOD PATH [JSON] call the API with the stored session";

#[derive(Debug, PartialEq)]
enum Command {
    Login {
        email: Option<String>,
    },
    Register {
        name: String,
        email: String,
    },
    Logout,
    Status,
    Request {
        method: Method,
        path: String,
        body: Option<serde_json::Value>,
    },
}

#[derive(Debug, PartialEq)]
struct Cli {
    config: Option<String>,
    command: Command,
}

/// Parse arguments (without the program name).
fn parse_args(args: &[String]) -> Result<Cli> {
    let mut config = None;
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().context("--config requires a path")?;
            config = Some(path.clone());
        } else {
            positional.push(arg.as_str());
        }
    }

    let command = match positional.as_slice() {
        ["login"] => Command::Login { email: None },
        ["login", email] => Command::Login {
            email: Some((*email).to_owned()),
        },
        ["register", name, email] => Command::Register {
            name: (*name).to_owned(),
            email: (*email).to_owned(),
        },
        ["logout"] => Command::Logout,
        ["status"] => Command::Status,
        ["request", method, path, rest @ ..] if rest.len() <= 1 => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("invalid HTTP method: {method}"))?;
            let body = rest
                .first()
                .map(|raw| serde_json::from_str(raw))
                .transpose()
                .context("request body must be valid JSON")?;
            Command::Request {
                method,
                path: (*path).to_owned(),
                body,
            }
        }
        [] => bail!("missing command\n\n{USAGE}"),
        _ => bail!("unrecognized arguments: {}\n\n{USAGE}", positional.join(" ")),
    };

    Ok(Cli { config, command })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs to stderr so command output on stdout stays clean
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_args(&args)?;

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let store = open_store(FileStorage::new(&config.storage.credentials_path)).await?;
    let transport = ReqwestTransport::new(
        reqwest::Client::new(),
        config.api.base_url.clone(),
        Duration::from_secs(config.api.timeout_secs),
    );
    let client = SessionClient::new(Arc::new(store), Arc::new(transport));
    client.on_session_invalidated(|event| {
        eprintln!(
            "session expired ({}); run `session-cli login` to sign in again",
            event.reason
        );
    });

    run(&client, &config, cli.command).await
}

async fn run(client: &SessionClient, config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Login { email } => {
            let email = email
                .or_else(|| config.auth.email.clone())
                .context("no email given and auth.email is not configured")?;
            let password = config
                .auth
                .password
                .as_ref()
                .context("no password: set SESSION_PASSWORD or auth.password_file")?;
            let user = client.login(&email, password).await.context("login failed")?;
            println!("signed in as {}", display_name(&user));
        }
        Command::Register { name, email } => {
            let password = config
                .auth
                .password
                .as_ref()
                .context("no password: set SESSION_PASSWORD or auth.password_file")?;
            let user = client
                .register(&name, &email, password)
                .await
                .context("registration failed")?;
            println!("registered and signed in as {}", display_name(&user));
        }
        Command::Logout => {
            client.logout().await.context("logout failed")?;
            println!("signed out");
        }
        Command::Status => {
            let credentials = client.credentials().await;
            let status = serde_json::json!({
                "authenticated": credentials.is_authenticated(),
                "user": credentials.principal(),
                "hasAccessToken": credentials.access_token().is_some(),
                "hasRefreshToken": credentials.refresh_token().is_some(),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Request { method, path, body } => {
            let mut call = ApiRequest::new(method, path);
            if let Some(body) = body {
                call = call.json(body);
            }
            match client.request(call).await {
                Ok(response) => {
                    println!("{}", response.text());
                }
                Err(e) => {
                    if let Some(response) = e.response() {
                        println!("{}", response.text());
                    }
                    return Err(e).context("request failed");
                }
            }
        }
    }
    Ok(())
}

/// Hydrate the session record from its file.
async fn open_store(storage: FileStorage) -> Result<CredentialStore> {
    let path = storage.path().to_path_buf();
    info!(path = %path.display(), "loading credentials");
    CredentialStore::load(storage)
        .await
        .with_context(|| format!("failed to load credentials from {}", path.display()))
}

fn display_name(user: &session_auth::Principal) -> &str {
    user.email
        .as_deref()
        .or(user.name.as_deref())
        .unwrap_or(&user.id)
}
