use std::path::PathBuf;

use clap::Parser;

/// tabhost: a headless tab/surface orchestrator speaking JSON lines on stdio.
#[derive(Parser, Debug)]
#[command(name = "tabhost", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log filter override (e.g. debug, tabhost=trace). RUST_LOG wins.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print the effective config as JSON and exit.
    #[arg(long)]
    pub print_config: bool,
}

pub fn parse() -> Args {
    Args::parse()
}
