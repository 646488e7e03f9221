//! Picks Screener - batch fundamentals screening service.
//!
//! Two invocation modes:
//! - `picks-screener` starts the HTTP trigger surface (and the cron
//!   scheduler when enabled)
//! - `picks-screener --event <file>` runs a single recorded payload and
//!   prints the run summary, serverless-style

use anyhow::{Context, Result};
use picks_common::config::Config;
use picks_common::logging::init_logging;
use picks_screener::routes::ScreenRequest;
use picks_screener::ScreenerService;

#[tokio::main]
async fn main() -> Result<()> {
    // Start timing immediately for cold-start measurement
    let startup_start = std::time::Instant::now();

    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Picks Screener v{}", env!("CARGO_PKG_VERSION"));

    let service = ScreenerService::new(config);

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("--event") => {
            let path = args
                .next()
                .context("--event requires a payload file path")?;
            let payload = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read event payload from {}", path))?;
            let request: ScreenRequest = serde_json::from_str(&payload)
                .with_context(|| format!("Failed to parse event payload from {}", path))?;

            let summary = service.run_once(request.symbols).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Some(other) => anyhow::bail!("Unknown argument: {}", other),
        None => service.start().await,
    }
}
