//! `Stats`: the arbitrary-precision counter used for every tracked quantity
//! (blocks, transactions, forks, tracked events, tracked miners).

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// A monotonically-adjustable counter plus the timing metadata of the block
/// that last touched it.
///
/// Invariant: `count` is always the decimal rendering of `current`; callers
/// never construct a `Stats` with a `count` that disagrees with `current`
/// (enforced by going through `increment`/`update`/`decrement` rather than
/// touching the fields directly).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    /// The counter itself.
    #[serde(skip)]
    pub current: U256,
    /// Decimal mirror of `current`, the field actually persisted to JSON.
    pub count: String,
    /// Seconds since the previous non-zero-timestamp update.
    pub interval: u64,
    /// Timestamp of the block that last updated this counter.
    pub timestamp: u64,
    /// Height of the block that last updated this counter, as a decimal string.
    #[serde(rename = "block")]
    pub block_number: String,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    /// A fresh zeroed counter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: U256::ZERO,
            count: "0".to_string(),
            interval: 0,
            timestamp: 0,
            block_number: String::new(),
        }
    }

    /// `current += 1`, then refresh timing metadata for `(timestamp, number)`.
    pub fn increment(&mut self, timestamp: u64, number: U256) {
        self.update(U256::from(1u64), timestamp, number.to_string());
    }

    /// `current -= 1`. Timing metadata is deliberately left untouched: reverts
    /// do not rewind the clock (see `SPEC_FULL.md` §4.5).
    pub fn decrement(&mut self) {
        self.subtract(U256::from(1u64));
    }

    /// `current += incr`, then refresh timing metadata.
    pub fn add(&mut self, incr: U256) {
        self.current += incr;
        self.count = self.current.to_string();
    }

    /// `current -= incr`, saturating at zero (a revert can never legitimately
    /// go negative, but we don't want an `Apply`/`Revert` mismatch to panic).
    pub fn subtract(&mut self, incr: U256) {
        self.current = self.current.saturating_sub(incr);
        self.count = self.current.to_string();
    }

    /// `current += incr`; also updates `interval` (only when `timestamp`
    /// strictly exceeds the previous non-zero timestamp), `timestamp` and
    /// `block_number`.
    pub fn update(&mut self, incr: U256, timestamp: u64, number: String) {
        self.add(incr);
        if self.timestamp != 0 && timestamp > self.timestamp {
            self.interval = timestamp - self.timestamp;
        }
        self.timestamp = timestamp;
        self.block_number = number;
    }

    /// Restore `current`/`count` and `block_number` from a backed-up
    /// [`Stats`], leaving `timestamp`/`interval` untouched (timestamps are
    /// not part of the restore contract — see `SPEC_FULL.md` §8). The block
    /// height must round-trip: it's how the engine resolves `start = -1`
    /// (`cacheBackupHeight + 1`) on a `--restore` run.
    pub fn restore_from(&mut self, restored: &Self) {
        self.current = restored.count.parse().unwrap_or(U256::ZERO);
        self.count = self.current.to_string();
        self.block_number.clone_from(&restored.block_number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_keeps_count_in_sync_with_current() {
        let mut s = Stats::new();
        s.increment(100, U256::from(1u64));
        assert_eq!(s.current, U256::from(1u64));
        assert_eq!(s.count, "1");
    }

    #[test]
    fn interval_only_updates_on_strictly_increasing_timestamp() {
        let mut s = Stats::new();
        s.increment(100, U256::from(1u64));
        assert_eq!(s.interval, 0);
        s.increment(115, U256::from(2u64));
        assert_eq!(s.interval, 15);
        // A non-increasing timestamp must not touch interval.
        s.increment(115, U256::from(3u64));
        assert_eq!(s.interval, 15);
    }

    #[test]
    fn apply_then_revert_round_trips_current() {
        let mut s = Stats::new();
        s.increment(100, U256::from(1u64));
        s.decrement();
        assert_eq!(s.current, U256::ZERO);
        assert_eq!(s.count, "0");
    }

    #[test]
    fn restore_from_parses_decimal_string_and_copies_block_number() {
        let mut s = Stats::new();
        let mut backed_up = Stats::new();
        backed_up.count = "42".to_string();
        backed_up.block_number = "7".to_string();
        s.restore_from(&backed_up);
        assert_eq!(s.current, U256::from(42u64));
        assert_eq!(s.count, "42");
        assert_eq!(s.block_number, "7");
    }

    #[test]
    fn decrement_below_zero_saturates_rather_than_panics() {
        let mut s = Stats::new();
        s.decrement();
        assert_eq!(s.current, U256::ZERO);
    }
}
