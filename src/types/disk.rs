//! `DiskUsage`: a periodic filesystem usage snapshot of a monitored path.

use serde::Serialize;

/// Filesystem usage of the monitored path's backing volume, plus the
/// recursive size of the path itself. All byte quantities are in KiB.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiskUsage {
    /// Free space on the backing volume, in KiB.
    pub free: u64,
    /// Space available to an unprivileged user, in KiB.
    pub available: u64,
    /// Total size of the backing volume, in KiB.
    pub size: u64,
    /// Used space on the backing volume, in KiB.
    pub used: u64,
    /// `used / size`, rendered as `"X%"`.
    pub usage: String,
    /// Recursive size of the monitored path itself, in KiB.
    pub dir: u64,
}
