//! ffs-ctl: command-line client for a Faux Filesystem device.

use anyhow::{bail, Context, Result};

use ffs_core::codec::{from_bytes, to_bytes};
use ffs_core::config::{FfsConfig, TransportKind};
use ffs_core::Endpoint;
use ffs_session::{OutboundState, PumpTiming, Session, SessionManager};

// ── Session helpers ───────────────────────────────────────────────────────────

async fn start(config: &FfsConfig) -> Result<SessionManager> {
    let (read, write) = ffs_session::transport::connect(&config.transport)
        .await
        .context("failed to reach the device, check [transport] in the config")?;
    Ok(SessionManager::with_timing(
        read,
        write,
        PumpTiming::from(&config.timing),
    ))
}

async fn open(manager: &SessionManager, endpoint: Endpoint) -> Result<Session> {
    let pre = manager.new_session(endpoint);
    match pre.get_session().await {
        Some(session) => Ok(session),
        None => bail!("device refused session with {endpoint} ({:?})", pre.state()),
    }
}

fn parse_endpoint(arg: &str) -> Result<Endpoint> {
    arg.parse()
        .with_context(|| format!("bad endpoint {arg:?}, expected <64 hex digits>:<number>"))
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

async fn cmd_open(config: &FfsConfig, endpoint: &str) -> Result<()> {
    let endpoint = parse_endpoint(endpoint)?;
    let manager = start(config).await?;
    let session = open(&manager, endpoint).await?;

    println!("Session opened");
    println!("  endpoint : {endpoint}");
    println!("  id       : {}", session.id());
    println!("  table    : {:?}", manager.session_ids());

    manager.shutdown().await;
    Ok(())
}

async fn cmd_echo(config: &FfsConfig, endpoint: &str, text: &str) -> Result<()> {
    let endpoint = parse_endpoint(endpoint)?;
    let manager = start(config).await?;
    let session = open(&manager, endpoint).await?;

    let request = to_bytes(text).context("message too long")?;
    let state = session.write_blocking(request).await?;
    if state != OutboundState::SentAck {
        bail!("device did not accept the message ({state:?})");
    }

    let reply = session.read().await?;
    let echoed: String = from_bytes(&reply).context("reply is not a string")?;
    println!("{echoed}");

    manager.shutdown().await;
    Ok(())
}

fn cmd_endpoint(content: &str, number: Option<&str>) -> Result<()> {
    let number = match number {
        Some(n) => n.parse().context("endpoint number must fit in 16 bits")?,
        None => 0,
    };
    println!("{}", Endpoint::from_content(content.as_bytes(), number));
    Ok(())
}

fn cmd_config(config: &FfsConfig) -> Result<()> {
    let path = FfsConfig::file_path();
    println!("Config file : {}", path.display());
    match config.transport.kind {
        TransportKind::Socket => println!(
            "Transport   : socket {} (read {}, write {})",
            config.transport.host, config.transport.read_port, config.transport.write_port
        ),
        TransportKind::File => println!(
            "Transport   : file (read {}, write {})",
            config.transport.read_path.display(),
            config.transport.write_path.display()
        ),
    }
    println!(
        "Timing      : poll {}ms, retry {}ms, {} waits",
        config.timing.poll_interval_ms, config.timing.retry_backoff_ms, config.timing.max_status_waits
    );
    Ok(())
}

fn print_usage() {
    println!("Usage: ffs-ctl <command>");
    println!();
    println!("Commands:");
    println!("  open <endpoint>              Open a session and print its id");
    println!("  echo <endpoint> <text>       Send text on a new session, print the reply");
    println!("  endpoint <name> [number]     Derive an endpoint id from a name");
    println!("  config                       Show the active configuration");
    println!();
    println!("Endpoints are written <64 hex digits>:<number>.");
    println!("Set RUST_LOG=ffs_session=debug to trace traffic.");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = FfsConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = FfsConfig::load().context("failed to load config")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["open", endpoint]                 => cmd_open(&config, endpoint).await,
        ["echo", endpoint, text]           => cmd_echo(&config, endpoint, text).await,
        ["endpoint", name]                 => cmd_endpoint(name, None),
        ["endpoint", name, number]         => cmd_endpoint(name, Some(*number)),
        ["config"]                         => cmd_config(&config),
        ["help"] | ["--help"] | ["-h"] | [] => { print_usage(); Ok(()) }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
