//! `Cache` (Connector): applies/reverts `BlockEvent`s, maintains counters,
//! rule-matched event stats, miner stats and balances, and persists/restores
//! periodic JSON backups.
//!
//! Single-writer discipline (`SPEC_FULL.md` §5/§9): only the dispatch
//! consumer task ever holds `&mut Cache`. The HTTP surface reads through an
//! [`Arc<RwLock<CacheSnapshot>>`] published by the dispatch consumer after
//! every `apply`/`revert`, so readers never take the writer's lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::error::{AppError, DomainError, InfraError, Result};
use crate::ports::BalanceSource;
use crate::types::{BlockEvent, Stats, Tracking};

const STAT_BLOCK: &str = "block";
const STAT_TRANSACTION: &str = "transaction";
const STAT_FORK: &str = "fork";

/// On-disk backup shape: `{stats: {...}, tracking: {...}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BackupFile {
    stats: HashMap<String, Stats>,
    tracking: Tracking,
}

/// A read-only, serializable view of the cache's current state, published
/// for the HTTP surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheSnapshot {
    /// Named system counters (`block`, `transaction`, `fork`).
    pub stats: HashMap<String, Stats>,
    /// User-configured tracking state.
    pub tracking: Tracking,
}

/// Where and how often the cache writes its backup file.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Destination path for the JSON snapshot.
    pub path: PathBuf,
    /// Write a snapshot every `frequency` accepted blocks. `0` disables
    /// periodic writes (a final write still happens at shutdown).
    pub frequency: u64,
}

/// The cache/tracking layer.
pub struct Cache {
    stats: HashMap<String, Stats>,
    tracking: Tracking,
    ready: AtomicBool,
    backup: Option<BackupConfig>,
    balance_source: Option<Arc<dyn BalanceSource>>,
}

impl Cache {
    /// A fresh cache seeded with `tracking`'s configured events/miners/
    /// balances, all counters zeroed.
    #[must_use]
    pub fn new(
        tracking: Tracking,
        backup: Option<BackupConfig>,
        balance_source: Option<Arc<dyn BalanceSource>>,
    ) -> Self {
        let mut stats = HashMap::new();
        stats.insert(STAT_BLOCK.to_string(), Stats::new());
        stats.insert(STAT_TRANSACTION.to_string(), Stats::new());
        stats.insert(STAT_FORK.to_string(), Stats::new());
        Self {
            stats,
            tracking,
            ready: AtomicBool::new(false),
            backup,
            balance_source,
        }
    }

    /// Flip the latch that enables balance refresh, avoiding N RPC calls per
    /// block during historical replay.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// A cloned, serializable snapshot of current state.
    #[must_use]
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            stats: self.stats.clone(),
            tracking: self.tracking.clone(),
        }
    }

    /// Commit `block`'s effects: counters, rule matches, miner tracking,
    /// balance refresh (if ready) and periodic backup.
    #[instrument(skip(self, block), fields(number = %block.number, fork = block.fork))]
    pub async fn apply(&mut self, block: &BlockEvent) -> Result<()> {
        if let Some(stat) = self.stats.get_mut(STAT_BLOCK) {
            stat.increment(block.timestamp, block.number);
        }

        if !block.transactions.is_empty() {
            if let Some(stat) = self.stats.get_mut(STAT_TRANSACTION) {
                stat.update(
                    U256::from(block.transactions.len() as u64),
                    block.timestamp,
                    block.number.to_string(),
                );
            }
        }

        for tx in &block.transactions {
            if let Some(eth_tx) = tx.as_eth() {
                for event in &mut self.tracking.events {
                    if event.matches(eth_tx) {
                        event.stats.increment(block.timestamp, block.number);
                    }
                }
            }
        }

        if block.fork {
            if let Some(stat) = self.stats.get_mut(STAT_FORK) {
                stat.increment(block.timestamp, block.number);
            }
        }

        for miner in &mut self.tracking.miners {
            if block.miner.as_deref() == Some(miner.id.as_str()) {
                miner.stats.increment(block.timestamp, block.number);
            }
            miner.current_block = block.number.to_string();
        }

        if self.ready.load(Ordering::SeqCst) {
            self.refresh_balances().await;
        }

        if let Some(backup) = &self.backup {
            if backup.frequency > 0 && block.number % U256::from(backup.frequency) == U256::ZERO {
                if let Err(e) = self.write_backup(&backup.path).await {
                    warn!(error = ?e, "periodic backup write failed");
                }
            }
        }

        Ok(())
    }

    /// Undo `block`'s effects: decrement counters only. Timing metadata is
    /// deliberately left untouched (see `Stats::decrement`).
    pub fn revert(&mut self, block: &BlockEvent) {
        if let Some(stat) = self.stats.get_mut(STAT_BLOCK) {
            stat.decrement();
        }
        if !block.transactions.is_empty() {
            if let Some(stat) = self.stats.get_mut(STAT_TRANSACTION) {
                stat.subtract(U256::from(block.transactions.len() as u64));
            }
        }
        for tx in &block.transactions {
            if let Some(eth_tx) = tx.as_eth() {
                for event in &mut self.tracking.events {
                    if event.matches(eth_tx) {
                        event.stats.decrement();
                    }
                }
            }
        }
        if block.fork {
            if let Some(stat) = self.stats.get_mut(STAT_FORK) {
                stat.decrement();
            }
        }
        for miner in &mut self.tracking.miners {
            if block.miner.as_deref() == Some(miner.id.as_str()) {
                miner.stats.decrement();
            }
        }
    }

    async fn refresh_balances(&mut self) {
        let Some(source) = self.balance_source.clone() else {
            return;
        };
        for balance in &mut self.tracking.balances {
            match source.balance_of(&balance.id).await {
                Ok(value) => balance.balance = value,
                Err(e) => warn!(address = %balance.id, error = ?e, "balance refresh failed"),
            }
        }
    }

    /// Write `{stats, tracking}` as indented JSON to `path`.
    ///
    /// # Errors
    /// Returns [`InfraError::Io`] or [`InfraError::Serialization`] if the
    /// write or encode fails.
    pub async fn write_backup(&self, path: &Path) -> Result<()> {
        let file = BackupFile {
            stats: self.stats.clone(),
            tracking: self.tracking.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(InfraError::Serialization)?;
        tokio::fs::write(path, bytes).await.map_err(InfraError::Io)?;
        Ok(())
    }

    /// Hydrate counters from the backup file at `path`. Fails if `path`
    /// doesn't exist (callers only invoke this when `--restore` was passed).
    ///
    /// # Errors
    /// Returns [`DomainError::RestoreFileMissing`] if `path` doesn't exist,
    /// or an [`InfraError`] if it exists but can't be read/parsed.
    pub async fn restore(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(AppError::Domain(DomainError::RestoreFileMissing(path.to_path_buf())));
        }
        let bytes = tokio::fs::read(path).await.map_err(InfraError::Io)?;
        let backup: BackupFile = serde_json::from_slice(&bytes).map_err(InfraError::Serialization)?;

        for (key, restored) in &backup.stats {
            self.stats
                .entry(key.clone())
                .or_insert_with(Stats::new)
                .restore_from(restored);
        }

        for event in &mut self.tracking.events {
            if let Some(restored) = backup.tracking.events.iter().find(|e| e.label == event.label) {
                event.stats.restore_from(&restored.stats);
            }
        }
        for miner in &mut self.tracking.miners {
            if let Some(restored) = backup.tracking.miners.iter().find(|m| m.label == miner.label) {
                miner.stats.restore_from(&restored.stats);
                miner.current_block.clone_from(&restored.current_block);
            }
        }
        for balance in &mut self.tracking.balances {
            if let Some(restored) = backup.tracking.balances.iter().find(|b| b.label == balance.label) {
                balance.balance.clone_from(&restored.balance);
            }
        }

        Ok(())
    }

    /// Write a backup unconditionally (ignoring `frequency`), if a backup
    /// path is configured at all. Used by the dispatch consumer's shutdown
    /// path so the most recent state survives a restart regardless of where
    /// the last periodic write landed.
    ///
    /// # Errors
    /// Returns an [`InfraError`] if the write fails. A `None` backup
    /// configuration is not an error — it's simply a no-op.
    pub async fn final_backup(&self) -> Result<()> {
        let Some(backup) = &self.backup else {
            return Ok(());
        };
        self.write_backup(&backup.path).await
    }

    /// The height the backup file was last written at, as recorded in
    /// `Stats["block"].block_number`, or `None` if never applied/restored.
    #[must_use]
    pub fn backup_height(&self) -> Option<U256> {
        self.stats
            .get(STAT_BLOCK)
            .filter(|s| !s.block_number.is_empty())
            .and_then(|s| s.block_number.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlockEvent;
    use crate::types::tracking::{Event, Miner, Rule};
    use crate::types::{RuleField, RuleOperator};

    use alloy::primitives::Address;
    use std::str::FromStr;

    fn eth_block(number: u64, miner: Option<&str>, sender: &str, value: u64) -> BlockEvent {
        let mut b = BlockEvent::new(U256::from(number), "p", "h");
        b.timestamp = 1000 + number;
        b.miner = miner.map(str::to_string);
        b.transactions = vec![crate::types::TxEvent::Eth(crate::types::block::EthTxEvent {
            sender: Address::from_str(sender).unwrap(),
            receiver: None,
            value: U256::from(value),
            function_id: None,
            events: Vec::new(),
            deploy: None,
        })];
        b
    }

    const ADDR_A: &str = "0x000000000000000000000000000000000000aa";
    const ADDR_MINER: &str = "0x00000000000000000000000000000000000001";

    #[tokio::test]
    async fn apply_increments_block_and_transaction_counts() {
        let mut cache = Cache::new(Tracking::default(), None, None);
        cache.apply(&eth_block(1, None, ADDR_A, 1)).await.unwrap();
        let snap = cache.snapshot();
        assert_eq!(snap.stats[STAT_BLOCK].count, "1");
        assert_eq!(snap.stats[STAT_TRANSACTION].count, "1");
    }

    #[tokio::test]
    async fn apply_then_revert_restores_all_counters_except_timing() {
        let mut cache = Cache::new(Tracking::default(), None, None);
        let block = eth_block(1, None, ADDR_A, 1);
        cache.apply(&block).await.unwrap();
        cache.revert(&block);
        let snap = cache.snapshot();
        assert_eq!(snap.stats[STAT_BLOCK].count, "0");
        assert_eq!(snap.stats[STAT_TRANSACTION].count, "0");
    }

    #[tokio::test]
    async fn matching_event_rule_increments_event_stats() {
        let mut tracking = Tracking::default();
        tracking.events.push(Event::new(
            "transfer",
            vec![Rule {
                field: RuleField::From,
                operator: RuleOperator::Eq,
                value: ADDR_A.to_string(),
            }],
        ));
        let mut cache = Cache::new(tracking, None, None);
        cache.apply(&eth_block(1, None, ADDR_A, 1)).await.unwrap();
        let snap = cache.snapshot();
        assert_eq!(snap.tracking.events[0].stats.count, "1");
    }

    #[tokio::test]
    async fn miner_stats_increment_only_on_matching_address_but_current_block_always_updates() {
        let mut tracking = Tracking::default();
        tracking.miners.push(Miner::new("primary", ADDR_MINER));
        let mut cache = Cache::new(tracking, None, None);
        cache.apply(&eth_block(1, Some("someone-else"), ADDR_A, 1)).await.unwrap();
        let snap = cache.snapshot();
        assert_eq!(snap.tracking.miners[0].stats.count, "0");
        assert_eq!(snap.tracking.miners[0].current_block, "1");

        cache.apply(&eth_block(2, Some(ADDR_MINER), ADDR_A, 1)).await.unwrap();
        let snap = cache.snapshot();
        assert_eq!(snap.tracking.miners[0].stats.count, "1");
        assert_eq!(snap.tracking.miners[0].current_block, "2");
    }

    #[tokio::test]
    async fn backup_then_restore_round_trips_counts_not_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");

        let mut cache = Cache::new(Tracking::default(), None, None);
        cache.apply(&eth_block(1, None, ADDR_A, 1)).await.unwrap();
        cache.apply(&eth_block(2, None, ADDR_A, 1)).await.unwrap();
        cache.write_backup(&path).await.unwrap();

        let mut restored = Cache::new(Tracking::default(), None, None);
        restored.restore(&path).await.unwrap();
        let snap = restored.snapshot();
        assert_eq!(snap.stats[STAT_BLOCK].count, "2");
        assert_eq!(snap.stats[STAT_BLOCK].timestamp, 0);
        assert_eq!(restored.backup_height(), Some(U256::from(2u64)));
    }

    #[tokio::test]
    async fn restore_without_backup_file_fails() {
        let mut cache = Cache::new(Tracking::default(), None, None);
        let err = cache.restore(Path::new("/nonexistent/backup.json")).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn empty_transactions_leaves_transaction_stat_untouched() {
        let mut cache = Cache::new(Tracking::default(), None, None);
        let block = BlockEvent::new(U256::from(1u64), "p", "h");
        cache.apply(&block).await.unwrap();
        let snap = cache.snapshot();
        assert_eq!(snap.stats[STAT_BLOCK].count, "1");
        assert_eq!(snap.stats[STAT_TRANSACTION].count, "0");
    }
}
