//! # pingsvc
//!
//! Demo service for coverage runs. Start it with `--coverage-out` to attach
//! the coverage agent; the artifact is written when SIGTERM arrives.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use covrig_common::constants;
use covrig_service::server::{self, ServiceConfig};

/// Demo HTTP service with a flush-on-exit coverage agent.
#[derive(Parser, Debug)]
#[command(name = "pingsvc", version, about, long_about = None)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "PINGSVC_BIND", default_value = constants::DEFAULT_SERVICE_BIND)]
    bind: SocketAddr,

    /// Attach the coverage agent and write the artifact here on exit.
    #[arg(long = "coverage-out", env = constants::ENV_COVERAGE_OUT)]
    coverage_out: Option<PathBuf>,

    /// Delay the coverage flush by this many milliseconds.
    #[arg(long, default_value_t = 0)]
    flush_delay_ms: u64,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    let config = ServiceConfig {
        bind: args.bind,
        coverage_out: args.coverage_out,
        flush_delay: Duration::from_millis(args.flush_delay_ms),
    };
    let _ = server::serve(config).await?;
    Ok(())
}
