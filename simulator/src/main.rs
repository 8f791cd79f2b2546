//! Firewall simulator entry point: CLI parsing, logging setup and mode
//! selection (API server or console).

mod api;
mod console;
mod history;
mod probe;
mod store;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use api::AppState;
use history::TestHistory;
use store::RuleStore;

#[derive(Parser, Debug)]
#[command(name = "fw-simulator")]
#[command(about = "Stateless packet firewall simulator with a JSON HTTP API")]
struct Args {
    /// Path to the JSON rules file (sole source of truth for policy)
    #[arg(short, long, default_value = "rules.json")]
    rules: PathBuf,

    /// Bind address for the API server
    #[arg(short, long, default_value = "0.0.0.0:5000")]
    bind: String,

    /// Reachability probe timeout in milliseconds
    #[arg(long, default_value = "1000")]
    probe_timeout_ms: u64,

    /// Directory for log files (also writes to stdout in server mode)
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Run the scripted console tests and interactive loop instead of the server
    #[arg(long)]
    console: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    fs::create_dir_all(&args.log_dir)
        .with_context(|| format!("Failed to create log dir: {:?}", args.log_dir))?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let log_filename = format!("simulator_{}.log", timestamp);

    let file_appender = tracing_appender::rolling::never(&args.log_dir, &log_filename);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Console mode keeps stdout for its own output; logs still go to file.
    let stdout_layer = (!args.console).then(|| fmt::layer().with_ansi(true).with_target(false));

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(non_blocking),
        )
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .init();

    info!("Packet Firewall Simulator");
    info!("  Rules file: {:?}", args.rules);
    info!("  Probe timeout: {}ms", args.probe_timeout_ms);
    info!("  Log file: {:?}", args.log_dir.join(&log_filename));

    let state = Arc::new(AppState {
        store: RuleStore::new(args.rules),
        history: TestHistory::new(),
        probe_timeout: Duration::from_millis(args.probe_timeout_ms),
    });

    if args.console {
        console::run(&state).await
    } else {
        api::run_server(state, &args.bind).await
    }
}
