mod bridge;
mod cli;
mod logging;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tabhost_common::TabhostError;
use tabhost_config::TabhostConfig;
use tabhost_orchestrator::settings::{headless_settings, initial_windows};
use tabhost_orchestrator::Orchestrator;
use tabhost_surface::HeadlessHost;
use tokio::io::BufReader;

/// Quiet period after the last command before shutting down.
const SETTLE_MARGIN: Duration = Duration::from_millis(50);

fn load_config(args: &cli::Args) -> Result<TabhostConfig, TabhostError> {
    let config = match &args.config {
        Some(path) => tabhost_config::load_config_from(path)?,
        None => tabhost_config::load_config().unwrap_or_else(|e| {
            tracing::warn!("config load failed, using defaults: {e}");
            TabhostConfig::default()
        }),
    };
    Ok(config)
}

async fn serve(config: TabhostConfig) -> Result<(), TabhostError> {
    let host = HeadlessHost::with_windows(headless_settings(&config), initial_windows(&config));
    tracing::info!(windows = ?host.windows(), "headless host ready");

    let orch = Orchestrator::new(Arc::new(host), &config);
    let settle = Duration::from_millis(config.headless.load_latency_ms) + SETTLE_MARGIN;
    let input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    bridge::run(&orch, input, &mut output, settle).await?;
    Ok(())
}

fn main() -> ExitCode {
    let args = cli::parse();

    let bootstrap = logging::bootstrap(args.log_level.as_deref(), std::io::stderr);
    let loaded = tracing::subscriber::with_default(bootstrap, || load_config(&args));
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tabhost: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.print_config {
        println!("{}", tabhost_config::config_to_json(&config));
        return ExitCode::SUCCESS;
    }

    logging::init(args.log_level.as_deref(), &config.logging);
    tracing::info!("tabhost v{} starting", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(config)) {
        Ok(()) => {
            tracing::info!("shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("tabhost failed: {e}");
            ExitCode::FAILURE
        }
    }
}
