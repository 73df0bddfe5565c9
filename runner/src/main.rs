//! Data plane runner binary.
//!
//! Loads the service configuration, initializes tracing and runs a single transfer described
//! by a JSON request file.

use clap::Parser;
use std::path::PathBuf;
use telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::config::{RunnerConfig, load_runner_config};
use crate::core::start_runner_with_config;

mod config;
mod core;

/// Runs a part-stream transfer between BigQuery tables.
#[derive(Debug, Parser)]
#[command(name = "dataplane-runner", version)]
struct Args {
    /// Path to the JSON transfer request.
    #[arg(long, short)]
    request: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let runner_config = load_runner_config()?;
    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    // The BigQuery client and the impersonation calls share the process-wide TLS provider.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(runner_config, args.request))
}

async fn async_main(runner_config: RunnerConfig, request: PathBuf) -> anyhow::Result<()> {
    match start_runner_with_config(runner_config, &request).await {
        Ok(stats) => {
            info!(parts = stats.parts, rows_written = stats.rows_written, "runner finished");
            Ok(())
        }
        Err(err) => {
            error!("{err:#}");
            Err(err)
        }
    }
}
