//! connect-pair - receive a Connect login from a peer, or push one to a peer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use connect_discovery::{DeviceRegistry, MdnsLocator};
use connect_pairing::{FileCredentialStore, PushSession, ReceiveSession, SessionConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEVICE_MATCH_ENV: &str = "CONNECT_DEVICE_MATCH";
const SETTLE_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Receive,
    Push,
}

/// Command-line arguments
struct Args {
    command: Command,
    /// Advertised device name
    name: String,
    port: u16,
    /// Credential file written by receive, read by push
    credentials: PathBuf,
    /// Give up after this long; wait forever when absent
    timeout: Option<Duration>,
    /// Substring of the target device name (push only)
    device: Option<String>,
    debug: bool,
    log_file: Option<PathBuf>,
}

impl Default for Args {
    fn default() -> Self {
        let config = SessionConfig::default();
        Self {
            command: Command::Receive,
            name: config.device_name,
            port: config.port,
            credentials: PathBuf::from("credentials.json"),
            timeout: None,
            device: None,
            debug: false,
            log_file: None,
        }
    }
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "receive" => args.command = Command::Receive,
            "push" => args.command = Command::Push,
            "--name" | "-n" => {
                if let Some(name) = iter.next() {
                    args.name = name;
                }
            }
            "--port" | "-p" => match iter.next().map(|p| p.parse::<u16>()) {
                Some(Ok(port)) => args.port = port,
                _ => usage_error("--port needs a number between 0 and 65535"),
            },
            "--credentials" | "-c" => {
                if let Some(path) = iter.next() {
                    args.credentials = PathBuf::from(path);
                }
            }
            "--timeout" | "-t" => match iter.next().map(|s| s.parse::<u64>()) {
                Some(Ok(secs)) => args.timeout = Some(Duration::from_secs(secs)),
                _ => usage_error("--timeout needs a number of seconds"),
            },
            "--device" => args.device = iter.next(),
            "--debug" | "-d" => {
                args.debug = true;
            }
            "--log-file" | "-l" => {
                if let Some(path) = iter.next() {
                    args.log_file = Some(PathBuf::from(path));
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => usage_error(&format!("Unknown argument: {}", arg)),
        }
    }

    if args.device.is_none() {
        args.device = std::env::var(DEVICE_MATCH_ENV).ok().filter(|s| !s.is_empty());
    }

    args
}

fn usage_error(message: &str) -> ! {
    eprintln!("{}", message);
    print_help();
    std::process::exit(1);
}

fn print_help() {
    println!("connect-pair - share a Connect login between devices on the local network");
    println!();
    println!("Usage: connect-pair [receive|push] [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  receive              Advertise and wait for a peer to push a login (default)");
    println!("  push                 Find a peer and push the stored login to it");
    println!();
    println!("Options:");
    println!("  -n, --name NAME         Advertised device name (default: connect-pair)");
    println!("  -p, --port PORT         Handshake port (default: 8080)");
    println!("  -c, --credentials PATH  Credential file (default: credentials.json)");
    println!("  -t, --timeout SECS      Give up after SECS seconds");
    println!("      --device MATCH      Push to the first device whose name contains MATCH");
    println!("  -d, --debug             Enable debug logging");
    println!("  -l, --log-file PATH     Write logs to PATH instead of stderr");
    println!("  -h, --help              Show this help message");
    println!();
    println!("The push target can also be set with {}.", DEVICE_MATCH_ENV);
}

fn setup_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let Some(path) = &args.log_file else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return None;
    };

    let file = match std::fs::File::create(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Cannot open log file {:?}: {}", path, e);
            tracing_subscriber::fmt().with_env_filter(filter).init();
            return None;
        }
    };
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Logging to {:?}", path);

    Some(guard)
}

fn session_config(args: &Args) -> SessionConfig {
    SessionConfig::builder()
        .device_name(args.name.clone())
        .port(args.port)
        .credential_path(args.credentials.clone())
        .build()
}

async fn receive(args: &Args) -> Result<()> {
    let mut handle = ReceiveSession::new(session_config(args))
        .start()
        .await
        .context("Failed to start receive session")?;
    println!(
        "Waiting for a login as \"{}\" on port {}",
        args.name,
        handle.local_addr().port()
    );

    let credential = match args.timeout {
        Some(timeout) => handle.wait_timeout(timeout).await,
        None => handle.wait().await,
    }
    .context("No login received")?;

    println!(
        "Received login for {}, saved to {}",
        credential.username(),
        args.credentials.display()
    );
    Ok(())
}

/// Give slower peers `window` to show up, then match by name.
async fn find_after_settle(
    registry: &DeviceRegistry,
    pattern: &str,
    window: Duration,
) -> Option<connect_core::DeviceEntry> {
    tokio::time::sleep(window).await;
    registry.find(pattern).await
}

async fn push(args: &Args) -> Result<()> {
    let store = FileCredentialStore::new(&args.credentials);
    let mut session = PushSession::from_store(session_config(args), &store)
        .await
        .with_context(|| format!("Cannot load login from {}", args.credentials.display()))?;

    let locator = MdnsLocator::new().context("Failed to start mDNS lookup")?;
    session.start_discovery(Arc::new(locator))?;

    let timeout = args.timeout.unwrap_or(Duration::from_secs(10));
    let first = session.wait_for_device(timeout).await?;
    info!("First device found: {}", first.name);

    let device = match &args.device {
        Some(pattern) => match find_after_settle(session.registry(), pattern, SETTLE_WINDOW).await {
            Some(device) => Some(device),
            None => bail!("No device matching \"{}\" found", pattern),
        },
        None => None,
    };
    session.stop_discovery();

    let paired = match device {
        Some(device) => {
            session.connect(&device).await?;
            device
        }
        None => session.connect_first().await?,
    };

    println!(
        "Pushed login for {} to {}",
        session.credential().username(),
        paired.name
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    // Setup logging before anything else
    let _guard = setup_logging(&args);

    info!("Starting connect-pair ({:?})", args.command);

    let result = match args.command {
        Command::Receive => receive(&args).await,
        Command::Push => push(&args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
