use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use capacitor::bucket::{BroadcastSink, BucketEngine, RateLimiter, TracingSink};
use capacitor::config::{CapacitorConfig, LogFormat, LoggingConfig};
use capacitor::grpc::GrpcServer;

/// Token-bucket rate limiting service.
#[derive(Debug, Parser)]
#[command(name = "capacitor", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address for the gRPC server, overriding configuration
    #[arg(long)]
    grpc_addr: Option<SocketAddr>,

    /// Log filter directive, overriding configuration
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CapacitorConfig::load(cli.config.as_deref())?;
    if let Some(addr) = cli.grpc_addr {
        config.server.grpc_addr = addr;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json_logs {
        config.logging.format = LogFormat::Json;
    }

    init_tracing(&config.logging);

    info!("Starting Capacitor Rate Limiting Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        grpc_addr = %config.server.grpc_addr,
        buckets = config.buckets.len(),
        "Configuration loaded"
    );

    let events = BroadcastSink::new(config.server.event_buffer);
    let engine = BucketEngine::new()
        .with_sink(Arc::new(TracingSink))
        .with_sink(Arc::new(events.clone()));
    let limiter = Arc::new(RateLimiter::new(engine));
    limiter.seed(&config.buckets)?;
    info!("Rate limiter initialized");

    let grpc_server = GrpcServer::new(config.server.grpc_addr, limiter).with_events(events);

    // Run the server with graceful shutdown on Ctrl+C
    grpc_server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Capacitor Rate Limiting Service stopped");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` takes precedence over configuration.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
