//! Flowgate - local control plane for an external proxy engine

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use flowgate::config::Config;
use flowgate::control::ProxyControl;
use flowgate::error::Result;
use flowgate::event::{handlers, EventBus, EventKind};
use flowgate::telemetry::TrafficMonitor;
use flowgate::{api, metrics};

fn main() -> Result<()> {
    let args = Args::parse();

    if args.version {
        print_version();
        return Ok(());
    }

    if args.gen_config {
        let config = Config::default_local();
        println!("{}", serde_json::to_string_pretty(&config).unwrap());
        return Ok(());
    }

    // Load configuration
    let config = if let Some(path) = args.config {
        Config::load(&path)?
    } else {
        Config::default()
    };

    // Initialize logging: RUST_LOG wins over the config file
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .or_else(|| config.log.level.parse().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Flowgate v{} starting...", env!("CARGO_PKG_VERSION"));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config, args.api_listen))?;

    info!("Goodbye!");
    Ok(())
}

async fn run(config: Config, api_override: Option<String>) -> Result<()> {
    let bus = Arc::new(EventBus::new());

    // Default observers
    bus.subscribe(EventKind::TrafficUpdated, handlers::traffic_logger);
    bus.subscribe(EventKind::TrafficUpdated, metrics::export);
    bus.subscribe(EventKind::ModeChanged, handlers::mode_logger);
    bus.subscribe(EventKind::SystemError, handlers::error_filter);
    bus.subscribe(EventKind::EngineError, handlers::error_filter);

    let monitor = Arc::new(TrafficMonitor::new(
        Arc::clone(&bus),
        config.telemetry.monitor_config(),
    )?);

    let control = ProxyControl::new(Arc::clone(&bus), Arc::clone(&monitor), config.mode);
    control.start()?;

    // Stats API, if configured
    let api_listen = api_override.or_else(|| config.api.as_ref().map(|a| a.listen.clone()));
    let api_handle = match api_listen {
        Some(listen) => {
            let addr = listen
                .parse()
                .map_err(|_| flowgate::Error::Config(format!("Invalid API listen address: {}", listen)))?;
            let (api_shutdown_tx, api_shutdown_rx) = tokio::sync::broadcast::channel(1);
            let monitor = Arc::clone(&monitor);
            let handle = tokio::spawn(async move {
                api::start_api_server(addr, monitor, api_shutdown_rx).await;
            });
            Some((api_shutdown_tx, handle))
        }
        None => None,
    };

    // Wait for shutdown signal (Ctrl+C)
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    control.stop().await?;
    if let Some((api_shutdown_tx, handle)) = api_handle {
        let _ = api_shutdown_tx.send(());
        let _ = handle.await;
    }

    Ok(())
}

/// Command line arguments
struct Args {
    config: Option<PathBuf>,
    gen_config: bool,
    version: bool,
    api_listen: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let mut config = None;
        let mut gen_config = false;
        let mut version = false;
        let mut api_listen = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-c" | "--config" => {
                    if i + 1 < args.len() {
                        config = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
                }
                "--gen-config" => gen_config = true,
                "--api" => {
                    if i + 1 < args.len() {
                        api_listen = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "-v" | "--version" => version = true,
                "-h" | "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                arg if !arg.starts_with('-') && config.is_none() => {
                    // Positional argument: treat as config file
                    config = Some(PathBuf::from(arg));
                }
                _ => {}
            }
            i += 1;
        }

        Self {
            config,
            gen_config,
            version,
            api_listen,
        }
    }
}

fn print_help() {
    println!(
        r#"Flowgate - local control plane for an external proxy engine

USAGE:
    flowgate [OPTIONS]

OPTIONS:
    -c, --config <FILE>     Path to configuration file
    --gen-config            Print an example configuration
    --api <ADDR>            Stats API listen address (e.g., 127.0.0.1:9090)
    -v, --version           Print version information
    -h, --help              Print help information

EXAMPLES:
    flowgate -c config.json
    flowgate -c config.json --api 127.0.0.1:9090
    flowgate --gen-config > config.json

STATS API ENDPOINTS:
    GET /metrics            Prometheus metrics
    GET /api/stats          Traffic statistics snapshot (JSON)
"#
    );
}

fn print_version() {
    println!("Flowgate v{}", env!("CARGO_PKG_VERSION"));
    println!("Local control plane for an external proxy engine");
}
