use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use service_bootstrap::lifecycle::{self, signals, ShutdownError};
use service_bootstrap::observability::metrics;
use service_bootstrap::Service;

#[derive(Parser)]
#[command(name = "service-bootstrap")]
#[command(about = "Web service bootstrap with graceful shutdown", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Nothing is running yet if this fails, so there is nothing to drain.
    let mut server = match lifecycle::start(Service::new(cli.config)).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let config = server.config();
    tracing::info!(
        name = %config.name,
        version = %config.version,
        mode = ?config.mode,
        address = %server.local_addr(),
        "Service started"
    );

    if config.metrics.enabled {
        if let Ok(addr) = config.metrics.address.parse() {
            if let Err(e) = metrics::init_metrics(addr) {
                tracing::error!(error = %e, "Failed to start metrics exporter");
            }
        } else {
            tracing::error!(
                metrics_address = %config.metrics.address,
                "Failed to parse metrics address"
            );
        }
    }

    let mut fault = false;
    if let Err(e) = signals::spawn_forwarder(server.trigger()) {
        tracing::error!(error = %e, "Failed to install signal handlers");
        fault = true;
    } else if let Err(e) = server.wait_for_termination().await {
        tracing::error!(error = %e, "Server fault, shutting down");
        fault = true;
    }

    let max_wait = server.drain_timeout();
    let drained = server.shutdown(max_wait).await;
    match &drained {
        // Logged by `shutdown`; an incomplete drain is still a normal exit.
        Ok(()) | Err(ShutdownError::Timeout(_)) => {}
        Err(e) => eprintln!("shutdown failed: {e}"),
    }

    if lifecycle::exit_success(fault, &drained) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
