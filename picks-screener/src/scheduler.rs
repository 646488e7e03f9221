//! Cron-driven scheduled screening runs.
//!
//! Sleeps until the next cron occurrence, loads the configured symbol
//! universe, and triggers a run. Failures are logged and the schedule
//! continues; overlap is rejected by the state's running guard.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cron::Schedule;
use tracing::{info, warn};

use crate::data::SymbolRequest;
use crate::ScreenerState;

/// Scheduler for automated screening runs.
pub struct RunScheduler {
    state: Arc<ScreenerState>,
}

impl RunScheduler {
    /// Create a new scheduler.
    pub fn new(state: Arc<ScreenerState>) -> Self {
        Self { state }
    }

    /// Run the schedule loop until the process exits.
    pub async fn start(&self) -> Result<()> {
        let schedule_config = &self.state.config.schedule;
        let schedule = Schedule::from_str(&schedule_config.cron)
            .with_context(|| format!("Invalid cron expression: {}", schedule_config.cron))?;

        info!(cron = %schedule_config.cron, "Run scheduler started");

        loop {
            let now = chrono::Utc::now();
            let Some(next) = schedule.after(&now).next() else {
                info!("Cron schedule has no further occurrences, scheduler stopping");
                return Ok(());
            };

            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next = %next, "Next scheduled screening run");
            tokio::time::sleep(wait).await;

            match self.load_universe() {
                Ok(requests) if !requests.is_empty() => {
                    info!(symbols = requests.len(), "Starting scheduled screening run");
                    match self.state.execute(requests).await {
                        Ok(summary) => info!(
                            run_id = %summary.run_id,
                            picks = summary.picks,
                            emailed = summary.emailed,
                            "Scheduled screening run finished"
                        ),
                        Err(e) => warn!(error = %e, "Scheduled screening run failed"),
                    }
                }
                Ok(_) => warn!("Universe file is empty, skipping scheduled run"),
                Err(e) => warn!(error = %e, "Failed to load universe file"),
            }
        }
    }

    /// Load the scheduled symbol universe from its CSV file.
    fn load_universe(&self) -> Result<Vec<SymbolRequest>> {
        let path = self
            .state
            .config
            .schedule
            .universe_file
            .as_ref()
            .context("No universe file configured")?;

        load_universe_file(Path::new(path))
    }
}

/// Read a `Symbol,Sector` CSV into symbol requests.
pub fn load_universe_file(path: &Path) -> Result<Vec<SymbolRequest>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open universe file {}", path.display()))?;

    let mut requests = Vec::new();
    for row in reader.deserialize() {
        let request: SymbolRequest = row.context("Malformed universe row")?;
        requests.push(request);
    }
    Ok(requests)
}

// ============================================================================
// Tests
// ============================================================================
