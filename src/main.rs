//! Dungeon host - Drives the lifecycle controller against an in-process host
//!
//! Host events are read from stdin, one command per line.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dungeon_host::core::{LifecycleController, Settings};
use dungeon_host::host::{EventSource, HeaderInterception, HostEvent, MemoryHost, ResponseHeaders};
use dungeon_host::{APP_NAME, APP_VERSION};

const HELP: &str = "commands: activate | click | mute | close | tab-removed | window-closed | \
                    window-removed | quit | message <json> | headers [Name=value ...] | status | exit";

/// A line of stdin, parsed
#[derive(Debug, PartialEq)]
enum Command {
    Event(HostEvent),
    Status,
    Help,
    Exit,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load settings")?;

    // Initialize logging
    init_logging(settings.debug_logging);

    info!("{} host v{} starting...", APP_NAME, APP_VERSION);

    let host = Arc::new(MemoryHost::new());
    let controller = LifecycleController::new(host.clone(), settings);
    let listener = tokio::spawn(controller.clone().run(host.subscribe()));

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut interceptions = 0u64;
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line, &mut interceptions) {
            Ok(Command::Event(event)) => host.emit(event),
            Ok(Command::Status) => match controller.instance() {
                Some(record) => println!(
                    "{}: tab={} window={} session={} view={} (up {}s)",
                    controller.state(),
                    record.tab_id,
                    record.window_id,
                    record.session_id,
                    record.view_id,
                    record.uptime().num_seconds()
                ),
                None => println!("{}", controller.state()),
            },
            Ok(Command::Help) => println!("{HELP}"),
            Ok(Command::Exit) => break,
            Err(e) => warn!("{}", e),
        }
    }

    if let Err(e) = controller.destroy_instance().await {
        error!("Failed to tear down instance on exit: {}", e);
    }
    listener.abort();

    info!("{} host shutting down", APP_NAME);
    Ok(())
}

/// Initialize the logging system
fn init_logging(debug: bool) {
    let default = if debug {
        "dungeon_host=debug"
    } else {
        "dungeon_host=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn parse_command(line: &str, interceptions: &mut u64) -> Result<Command> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    let event = match word {
        "" | "help" => return Ok(Command::Help),
        "status" => return Ok(Command::Status),
        "exit" => return Ok(Command::Exit),
        "activate" => HostEvent::ExtensionClick,
        "click" => HostEvent::TabClicked,
        "mute" => HostEvent::TabClickedMute,
        "close" => HostEvent::TabClickedClose,
        "tab-removed" => HostEvent::TabRemoved,
        "window-closed" => HostEvent::WindowClosed,
        "window-removed" => HostEvent::WindowRemoved,
        "quit" => HostEvent::quit(),
        "message" => HostEvent::Message {
            payload: serde_json::from_str(rest)
                .unwrap_or_else(|_| serde_json::Value::String(rest.to_string())),
        },
        "headers" => {
            *interceptions += 1;
            HostEvent::BeforeWebReceiveHeaders(HeaderInterception {
                event_id: format!("event-{}", interceptions),
                details_id: format!("details-{}", interceptions),
                response_headers: parse_headers(rest)?,
            })
        }
        other => anyhow::bail!("Unknown command `{}`", other),
    };
    Ok(Command::Event(event))
}

fn parse_headers(input: &str) -> Result<ResponseHeaders> {
    let mut headers = ResponseHeaders::new();
    for pair in input.split_whitespace() {
        let (name, value) = pair
            .split_once('=')
            .with_context(|| format!("Header `{}` is not Name=value", pair))?;
        headers
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
    }
    Ok(headers)
}
