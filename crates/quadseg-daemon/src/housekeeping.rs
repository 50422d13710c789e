//! Daily counter rollover and log files.

use anyhow::{Context, Result};
use chrono::{DateTime, Days, Local, TimeZone};
use quadseg_hw::Bus;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::presenter::Presenter;
use crate::tally::DailyLog;

/// Wait used when the next midnight does not exist in the local zone.
const FALLBACK_WAIT: Duration = Duration::from_secs(60 * 60);

/// Returns the time left until the next local midnight after `now`.
pub fn until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    let midnight = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|naive| now.timezone().from_local_datetime(&naive).earliest());

    match midnight {
        Some(midnight) => (midnight - now.clone())
            .to_std()
            .unwrap_or(Duration::ZERO),
        None => FALLBACK_WAIT,
    }
}

/// Writes `log-YYYY-MM-DD.json` for the closed day into `dir`.
pub fn write_log(dir: &Path, log: &DailyLog) -> Result<PathBuf> {
    let path = dir.join(format!("log-{}.json", log.day.format("%Y-%m-%d")));
    let content = serde_json::to_string_pretty(log).context("Failed to serialize daily log")?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write daily log: {}", path.display()))?;
    Ok(path)
}

/// Closes the day at every local midnight, forever.
pub async fn run_daily_rollover<B: Bus + 'static>(presenter: Presenter<B>, dir: PathBuf) {
    let mut day = Local::now().date_naive();

    loop {
        let wait = until_next_midnight(&Local::now());
        debug!("Next rollover in {:?}", wait);
        tokio::time::sleep(wait).await;

        let now = Local::now();
        if now.date_naive() == day {
            // Woke a little early.
            continue;
        }

        let log = presenter.rollover(day, now);
        match write_log(&dir, &log) {
            Ok(path) => info!("Daily log saved to {}", path.display()),
            Err(e) => warn!("{:#}", e),
        }
        day = now.date_naive();
    }
}
