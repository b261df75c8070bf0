//! vox-agent binary entry point.

use tracing_subscriber::EnvFilter;
use vox_agent::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let filter = cli::default_log_filter(cli.global.verbose);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
