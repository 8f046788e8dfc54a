//! Author Feed - Main Entry Point

use authorfeed::cache::store_from_config;
use authorfeed::config::FeedConfig;
use authorfeed::observability::init_logging_from_env;
use authorfeed::observability::{health::HealthServer, metrics::metrics};
use authorfeed::server::{bind_feed_server, FeedHandler};
use clap::{Parser, Subcommand};
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info};

/// JSON Feed bridge for content platform authors
#[derive(Parser)]
#[command(name = "authorfeed")]
#[command(about = "Serve content platform author listings as JSON Feeds")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve feeds until SIGINT or SIGTERM
    Run {
        /// Override the feed listener port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Validate configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging_from_env(cli.verbose);

    info!("Starting authorfeed v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            run_server(config).await
        }
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<FeedConfig, Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            FeedConfig::load_from_file(path)?
        }
        None => {
            let default_paths = ["authorfeed.toml", "config/authorfeed.toml"];

            match default_paths
                .iter()
                .map(PathBuf::from)
                .find(|path| path.exists())
            {
                Some(path) => {
                    info!("Loading configuration from: {}", path.display());
                    FeedConfig::load_from_file(&path)?
                }
                None => {
                    info!("No configuration file found, using built-in defaults");
                    FeedConfig::default()
                }
            }
        }
    };

    let mut config = config;
    if let Some(port) = env::var("HEALTH_PORT").ok().and_then(|p| p.parse().ok()) {
        config.server.health_port = port;
    }
    config.validate()?;

    Ok(config)
}

async fn run_server(config: FeedConfig) -> Result<(), Box<dyn std::error::Error>> {
    let collector = metrics();
    collector.set_service_state("initializing");

    let host: IpAddr = config.server.host.parse()?;
    let feed_addr = SocketAddr::new(host, config.server.port);
    let health_addr = SocketAddr::new(host, config.server.health_port);

    let store = store_from_config(&config.cache);
    let health_server = Arc::new(HealthServer::new("authorfeed", health_addr));
    let handler = Arc::new(
        FeedHandler::from_config(&config, store)?.with_health(health_server.clone()),
    );

    tokio::spawn(health_server.clone().start());

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let (bound, server) = bind_feed_server(handler, feed_addr, async move {
        let _ = shutdown_rx.await;
    })?;
    let server = tokio::spawn(server);

    health_server.set_feed_listening(true);
    collector.set_service_state("running");
    info!(%bound, upstream = %config.upstream.api_base_url, "Serving author feeds");

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }

    collector.set_service_state("stopping");
    health_server.set_feed_listening(false);
    let _ = shutdown_tx.send(());

    if let Err(e) = server.await {
        error!("Feed server task failed: {}", e);
        collector.set_service_state("error");
        return Err(e.into());
    }

    collector.set_service_state("stopped");
    Ok(())
}

fn handle_config_command(
    config: FeedConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
