//! Optional Prometheus exposition (ambient component A5). Only installed
//! when `--metrics` is passed; the dispatch consumer and sync loop emit a
//! handful of gauges/counters through the global `metrics` facade regardless
//! of whether a recorder is installed (calls are no-ops without one).

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::{InfraError, Result};

/// Install the global Prometheus recorder and return a handle whose
/// `render()` produces the text-format exposition for the `/metrics` route.
///
/// # Errors
/// Returns an [`InfraError`] if a recorder is already installed (double
/// initialization), which would indicate a bug in startup wiring rather
/// than a recoverable runtime condition.
pub fn install() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| InfraError::Rpc(Box::new(e)).into())
}

/// Record that a block was applied at `number`.
pub fn record_block_applied(number: u64) {
    counter!("poller_blocks_applied_total").increment(1);
    gauge!("poller_current_height").set(number as f64);
}

/// Record that a block was reverted (re-org).
pub fn record_block_reverted() {
    counter!("poller_blocks_reverted_total").increment(1);
}

/// Record the current sync percentage.
pub fn record_sync_percent(pct: u8) {
    gauge!("poller_sync_percent").set(f64::from(pct));
}
