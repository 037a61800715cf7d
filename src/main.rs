use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mongowatch::AppConfig;
use mongowatch_adapters::mongo::MongoConnector;
use mongowatch_adapters::signalfx::SignalFxSink;
use mongowatch_monitor::Scheduler;

#[derive(Parser, Debug)]
#[command(name = "mongowatch")]
#[command(version, about = "Replica-set lag and liveness monitor for MongoDB, reporting to SignalFx")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "./config.yaml")]
    config: PathBuf,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    info!("mongowatch {}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    let sink = SignalFxSink::builder()
        .ingest_url(config.signalfx.ingest_url.as_str())
        .auth_token(config.signalfx.auth_token.as_str())
        .build()?;

    let scheduler = Scheduler::builder(MongoConnector::new().with_app_name("mongowatch"))
        .sink(Arc::new(sink))
        .clusters(config.cluster_groups())
        .interval(config.interval())
        .timeouts(config.timeouts())
        .build()?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    let reason = scheduler.start(cancel).await;
    if reason.is_cancelled() {
        info!("Shutdown complete");
        Ok(())
    } else {
        Err(reason.into())
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Cancel `token` on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, stopping"),
        _ = terminate => info!("Received SIGTERM, stopping"),
    }
    token.cancel();
}
