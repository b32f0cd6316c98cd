use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use esp_idf_svc::sntp::{EspSntp, SyncStatus};
use log::{info, warn};

// Anything earlier means the RTC was never set.
const MIN_VALID_UNIX: i64 = 1_700_000_000;

/// Start SNTP and wait up to `timeout` for the first sync. A late sync is
/// logged, not fatal: the collector rejects implausible timestamps itself.
pub fn sync(timeout: Duration) -> Result<EspSntp<'static>> {
    let sntp = EspSntp::new_default()?;
    let deadline = Instant::now() + timeout;
    while sntp.get_sync_status() != SyncStatus::Completed {
        if Instant::now() >= deadline {
            warn!("SNTP not synced after {}s", timeout.as_secs());
            return Ok(sntp);
        }
        thread::sleep(Duration::from_millis(200));
    }

    let now = greenhouse_node::cycle::unix_now();
    if now < MIN_VALID_UNIX {
        warn!("SNTP reported sync but clock reads {now}");
    } else {
        info!("Time synchronized: {now}");
    }
    Ok(sntp)
}
