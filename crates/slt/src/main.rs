mod prefs;
mod render;

use std::{env, io, process::ExitCode, sync::Arc, time::Duration};

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use prefs::{PrefsError, PrefsStore};
use serde_json::Value;
use slt_core::{
    RequestResponse, VENDOR_NAME, VisibilityChanged, default_state_dir, event_subscription,
    status,
    vendor::{VISIBILITY_CHANGED, unwrap_response_data},
};
use slt_ws::{
    ClientError, ConnectOptions, ConnectionState, Event, EventHandler, EventRouter, SltClient,
};
use thiserror::Error;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "slt", about = "Remote control for smart lower thirds")]
struct Cli {
    /// WebSocket URL; defaults to the saved URL, then ws://127.0.0.1:4455.
    #[arg(long)]
    url: Option<String>,
    /// Password answering the server's challenge; also read from SLT_PASSWORD.
    #[arg(long)]
    password: Option<String>,
    /// Per-request timeout in milliseconds.
    #[arg(long, default_value_t = 8_000)]
    timeout_ms: u64,
    /// Save the URL between runs.
    #[arg(long, value_name = "BOOL")]
    remember_url: Option<bool>,
    /// Save the password between runs (stored in plain text).
    #[arg(long, value_name = "BOOL")]
    remember_password: Option<bool>,
    /// Log protocol traffic to stderr.
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List configured lower thirds.
    List,
    /// Print ids of visible lower thirds.
    Visible,
    /// Show one lower third.
    Show { id: String },
    /// Hide one lower third.
    Hide { id: String },
    /// Flip visibility of one lower third.
    Toggle { id: String },
    /// Send a raw request and print its response data.
    Request {
        request_type: String,
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
    },
    /// Send a vendor request and print its unwrapped response data.
    Vendor {
        request_type: String,
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
        #[arg(long, default_value = VENDOR_NAME)]
        vendor: String,
    },
    /// Print visibility changes until interrupted.
    Watch,
    /// Clear saved URL and password.
    Forget,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("preferences: {0}")]
    Prefs(#[from] PrefsError),
    #[error("invalid --data json: {0}")]
    InvalidData(serde_json::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            if let Some(hint) = hint(&err) {
                eprintln!("{hint}");
            }
            ExitCode::from(1)
        }
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let store = PrefsStore::new(default_state_dir());
    if let Command::Forget = cli.command {
        store.forget()?;
        println!("Saved settings cleared.");
        return Ok(());
    }

    let watching = matches!(cli.command, Command::Watch);
    let client = connect(&cli, &store, watching).await?;
    let result = execute(&client, cli.command).await;
    client.close().await;
    result
}

/// Follow-up line for request failures the user can act on.
fn hint(err: &CliError) -> Option<&'static str> {
    let CliError::Client(ClientError::RequestFailed { code, .. }) = err else {
        return None;
    };
    match *code {
        status::RESOURCE_NOT_FOUND => {
            Some("hint: no vendor by that name; check that the lower-thirds plugin is loaded")
        }
        status::UNKNOWN_REQUEST_TYPE => Some("hint: the server does not know this request type"),
        status::NOT_READY => Some("hint: the server is still starting; try again shortly"),
        _ => None,
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

async fn connect(cli: &Cli, store: &PrefsStore, watching: bool) -> Result<SltClient, CliError> {
    let mut prefs = store.load().unwrap_or_else(|err| {
        warn!(path = %store.path().display(), error = %err, "ignoring saved preferences");
        Default::default()
    });
    if let Some(remember) = cli.remember_url {
        prefs.remember_url = remember;
    }
    if let Some(remember) = cli.remember_password {
        prefs.remember_password = remember;
    }

    let url = prefs.resolve_url(cli.url.clone());
    let password = prefs.resolve_password(cli.password.clone(), env::var("SLT_PASSWORD").ok());

    prefs.record(&url, password.as_deref());
    if let Err(err) = store.save(&prefs) {
        warn!(path = %store.path().display(), error = %err, "failed saving preferences");
    }

    let mut options = ConnectOptions::new(url)
        .with_password(password)
        .with_request_timeout(Duration::from_millis(cli.timeout_ms));
    if watching {
        options = options
            .with_event_subscriptions(event_subscription::VENDORS)
            .with_events(
                EventRouter::new()
                    .on(VISIBILITY_CHANGED, Arc::new(PrintVisibility))
                    .fallback(Arc::new(LogEvent)),
            );
    }

    Ok(SltClient::connect(options).await?)
}

async fn execute(client: &SltClient, command: Command) -> Result<(), CliError> {
    match command {
        Command::List => {
            let items = client.list_lower_thirds().await?;
            print!("{}", render::render_items(&items));
        }
        Command::Visible => {
            let ids = client.visible_ids().await?;
            if ids.is_empty() {
                println!("(none)");
            }
            for id in ids {
                println!("{id}");
            }
        }
        Command::Show { id } => {
            let result = client.set_visible(&id, true).await?;
            println!("{}", render::render_visibility(&result));
        }
        Command::Hide { id } => {
            let result = client.set_visible(&id, false).await?;
            println!("{}", render::render_visibility(&result));
        }
        Command::Toggle { id } => {
            let result = client.toggle_visible(&id).await?;
            println!("{}", render::render_visibility(&result));
        }
        Command::Request { request_type, data } => {
            let response = client.call(&request_type, parse_data(data)?).await?;
            print_json(response.response_data.as_ref());
        }
        Command::Vendor {
            request_type,
            data,
            vendor,
        } => {
            let response = client
                .call_vendor(&vendor, &request_type, parse_data(data)?)
                .await?;
            print_unwrapped(&response);
        }
        Command::Watch => watch(client).await,
        Command::Forget => {}
    }
    Ok(())
}

async fn watch(client: &SltClient) {
    eprintln!("Watching visibility changes; Ctrl-C to stop.");
    let mut state = client.subscribe_state();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = async {
            while *state.borrow_and_update() != ConnectionState::Disconnected {
                if state.changed().await.is_err() {
                    break;
                }
            }
        } => eprintln!("Disconnected."),
    }
}

fn parse_data(data: Option<String>) -> Result<Value, CliError> {
    match data {
        Some(text) => serde_json::from_str(&text).map_err(CliError::InvalidData),
        None => Ok(Value::Object(Default::default())),
    }
}

fn print_unwrapped(response: &RequestResponse) {
    print_json(unwrap_response_data(response));
}

fn print_json(value: Option<&Value>) {
    match value {
        Some(value) => match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(_) => println!("{value}"),
        },
        None => println!("{{}}"),
    }
}

struct PrintVisibility;

#[async_trait]
impl EventHandler for PrintVisibility {
    async fn handle(&self, event: &Event) {
        match serde_json::from_value::<VisibilityChanged>(event.data().clone()) {
            Ok(changed) => println!("{}", render::render_visibility_changed(&changed)),
            Err(err) => warn!(error = %err, "malformed visibility event"),
        }
    }
}

struct LogEvent;

#[async_trait]
impl EventHandler for LogEvent {
    async fn handle(&self, event: &Event) {
        debug!(event_type = event.event_type(), data = %event.data(), "event");
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use serde_json::json;

    use slt_ws::ClientError;

    use super::{Cli, CliError, Command, hint, parse_data};

    #[test]
    fn parses_vendor_command_with_defaults() {
        let cli = Cli::try_parse_from(["slt", "vendor", "GetVisible"]).expect("args should parse");
        assert_eq!(cli.timeout_ms, 8_000);
        match cli.command {
            Command::Vendor {
                request_type,
                data,
                vendor,
            } => {
                assert_eq!(request_type, "GetVisible");
                assert!(data.is_none());
                assert_eq!(vendor, "smart-lower-thirds");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_connection_flags() {
        let cli = Cli::try_parse_from([
            "slt",
            "--url",
            "ws://studio:4455",
            "--remember-password",
            "true",
            "toggle",
            "lt_1",
        ])
        .expect("args should parse");
        assert_eq!(cli.url.as_deref(), Some("ws://studio:4455"));
        assert_eq!(cli.remember_password, Some(true));
        assert!(matches!(cli.command, Command::Toggle { id } if id == "lt_1"));
    }

    #[test]
    fn data_defaults_to_empty_object() {
        assert_eq!(parse_data(None).expect("empty data"), json!({}));
        assert_eq!(
            parse_data(Some(r#"{"id":"lt_1"}"#.to_string())).expect("valid json"),
            json!({ "id": "lt_1" })
        );
        assert!(parse_data(Some("{".to_string())).is_err());
    }

    #[test]
    fn hints_follow_actionable_status_codes() {
        let failed = |code| {
            CliError::Client(ClientError::RequestFailed {
                request_type: "ListLowerThirds".to_string(),
                code,
                comment: None,
            })
        };

        assert!(hint(&failed(600)).is_some_and(|hint| hint.contains("plugin is loaded")));
        assert!(hint(&failed(204)).is_some_and(|hint| hint.contains("request type")));
        assert!(hint(&failed(207)).is_some());
        assert_eq!(hint(&failed(702)), None);
        assert_eq!(hint(&CliError::Client(ClientError::NotConnected)), None);
    }
}
