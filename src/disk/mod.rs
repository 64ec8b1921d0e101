//! Disk-usage probe (ambient component A3): a periodic background task that
//! snapshots filesystem usage of a monitored path, published behind a read
//! lock for the HTTP surface.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use sysinfo::Disks;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use walkdir::WalkDir;

use crate::types::DiskUsage;

const BYTES_PER_KIB: u64 = 1024;

impl DiskUsage {
    /// Recompute usage of the volume backing `path`, plus `path`'s own
    /// recursive size. Never panics: any unreadable path segment degrades
    /// the affected field to zero rather than aborting the probe task.
    #[must_use]
    pub fn update(path: &Path) -> Self {
        let disks = Disks::new_with_refreshed_list();
        let mount = disks
            .list()
            .iter()
            .filter(|d| path.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len());

        let (size, free) = mount.map_or((0, 0), |d| (d.total_space(), d.available_space()));
        let used = size.saturating_sub(free);
        let usage = if size == 0 {
            "0%".to_string()
        } else {
            format!("{}%", (used.saturating_mul(100)) / size)
        };

        let dir = dir_size(path);

        Self {
            free: free / BYTES_PER_KIB,
            available: free / BYTES_PER_KIB,
            size: size / BYTES_PER_KIB,
            used: used / BYTES_PER_KIB,
            usage,
            dir: dir / BYTES_PER_KIB,
        }
    }
}

/// Recursive byte size of every regular file under `path`. Unreadable
/// entries (permission errors, broken symlinks, races with concurrent
/// deletes) are skipped rather than aborting the walk.
fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => entry.metadata().ok().map(|m| m.len()),
            Err(e) => {
                warn!(error = %e, "disk probe: skipping unreadable path entry");
                None
            }
        })
        .sum()
}

/// Run the probe forever, refreshing every `refresh` seconds and publishing
/// into `state`, until `shutdown` is cancelled.
pub async fn run_probe(path: PathBuf, refresh: Duration, state: Arc<RwLock<DiskUsage>>, shutdown: CancellationToken) {
    loop {
        let probe_path = path.clone();
        let usage = tokio::task::spawn_blocking(move || DiskUsage::update(&probe_path))
            .await
            .unwrap_or_default();
        *state.write() = usage;

        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(refresh) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_on_nonexistent_path_degrades_to_zero_dir_size() {
        let usage = DiskUsage::update(Path::new("/this/path/does/not/exist/at/all"));
        assert_eq!(usage.dir, 0);
    }

    #[test]
    fn update_on_real_path_computes_a_nonzero_volume_size() {
        let usage = DiskUsage::update(Path::new("/"));
        assert!(usage.size > 0);
    }
}
