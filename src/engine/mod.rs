//! `Engine`: orchestrates sync (sequential or pooled), listen, the dispatch
//! queue and progress status, generic over a [`ChainAdapter`].

mod dispatch;
mod sync;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy::primitives::U256;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::cache::{Cache, CacheSnapshot};
use crate::error::Result;
use crate::fork::ForkWatcher;
use crate::ports::ChainAdapter;
use crate::types::EngineStatus;

pub use dispatch::DispatchMessage;

/// How the initial historical catch-up is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Sequential, strictly ascending processing.
    #[default]
    Normal,
    /// Pooled fan-out: `sync_thread_pool` workers each process
    /// `sync_thread_size` consecutive heights per round.
    Fast,
}

/// Engine tuning knobs. Defaults mirror `SPEC_FULL.md` §4.4: `start=0,
/// end=-1 (auto), pool=4, size=25, maxForkSize=10`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// First height to process during sync.
    pub start: U256,
    /// Last height to process during sync. `None` means "resolve to the
    /// current chain head at `init()`" (the CLI's `-1` sentinel).
    pub end: Option<U256>,
    /// Sequential vs. pooled sync.
    pub sync_mode: SyncMode,
    /// Fast-mode worker count.
    pub sync_thread_pool: usize,
    /// Fast-mode blocks per worker per round.
    pub sync_thread_size: usize,
    /// `ForkWatcher` tail capacity.
    pub max_fork_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start: U256::ZERO,
            end: None,
            sync_mode: SyncMode::Normal,
            sync_thread_pool: 4,
            sync_thread_size: 25,
            max_fork_size: 10,
        }
    }
}

/// The chain-agnostic ingestion engine.
pub struct Engine<A: ChainAdapter + 'static> {
    adapter: Arc<A>,
    start: U256,
    end: Arc<Mutex<U256>>,
    end_resolved: Arc<AtomicBool>,
    sync_mode: SyncMode,
    sync_thread_pool: usize,
    sync_thread_size: usize,
    max_fork_size: usize,
    status: Arc<Mutex<EngineStatus>>,
    dispatch_tx: mpsc::Sender<DispatchMessage>,
    shutdown: CancellationToken,
    consumer_handle: Option<JoinHandle<()>>,
}

impl<A: ChainAdapter + 'static> Engine<A> {
    /// Construct a new engine, taking ownership of `cache` and spawning its
    /// dispatch consumer task. The consumer is started exactly once, here,
    /// rather than lazily in `init()`, since the engine is never constructed
    /// more than once per process.
    pub fn new(
        adapter: Arc<A>,
        cache: Cache,
        snapshot: Arc<RwLock<CacheSnapshot>>,
        config: EngineConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let (dispatch_tx, dispatch_rx) = mpsc::channel(256);
        let status = Arc::new(Mutex::new(EngineStatus::default()));
        let consumer_handle = dispatch::spawn_consumer(
            dispatch_rx,
            cache,
            Arc::clone(&status),
            snapshot,
            shutdown.clone(),
        );

        Self {
            adapter,
            start: config.start,
            end: Arc::new(Mutex::new(config.end.unwrap_or(U256::ZERO))),
            end_resolved: Arc::new(AtomicBool::new(config.end.is_some())),
            sync_mode: config.sync_mode,
            sync_thread_pool: config.sync_thread_pool,
            sync_thread_size: config.sync_thread_size,
            max_fork_size: config.max_fork_size,
            status,
            dispatch_tx,
            shutdown,
            consumer_handle: Some(consumer_handle),
        }
    }

    /// A snapshot of the current engine status.
    #[must_use]
    pub fn status(&self) -> EngineStatus {
        self.status.lock().clone()
    }

    /// A shared handle to the live status, for the HTTP surface to read
    /// concurrently without holding any other part of the engine.
    #[must_use]
    pub fn status_handle(&self) -> Arc<Mutex<EngineStatus>> {
        Arc::clone(&self.status)
    }

    /// Flip the cache's readiness latch (via the dispatch consumer, the
    /// cache's sole owner) so balance refresh starts happening on
    /// subsequent `Apply`s. Callers invoke this once historical sync has
    /// completed, per `SPEC_FULL.md` §4.5.
    ///
    /// # Errors
    /// Returns [`AppError::ShutdownRequested`] if the dispatch consumer has
    /// already exited.
    pub async fn set_ready(&self) -> Result<()> {
        self.dispatch_tx
            .send(DispatchMessage::SetReady)
            .await
            .map_err(dispatch::send_failed)
    }

    /// Fetch the chain head, resolve `end` if it was left unset, run the
    /// initial sync, then advance `end` past the synced range so `listen`
    /// picks up exactly where sync left off.
    #[instrument(skip(self))]
    pub async fn init(&mut self) -> Result<()> {
        self.adapter.connect().await?;
        self.status.lock().connected = true;

        let head = self.adapter.latest().await?;
        if !self.end_resolved.swap(true, Ordering::SeqCst) {
            *self.end.lock() = head;
        }

        self.sync().await?;

        *self.end.lock() = head + U256::from(1u64);
        info!(head = %head, "initial sync complete, entering listen phase boundary");
        Ok(())
    }

    async fn sync(&mut self) -> Result<()> {
        let end = *self.end.lock();
        if end == U256::ZERO {
            self.set_synced_pct(100);
            return Ok(());
        }
        if self.start > end {
            self.set_synced_pct(100);
            return Ok(());
        }

        match self.sync_mode {
            SyncMode::Normal => {
                sync::sync_normal(
                    &self.adapter,
                    &self.dispatch_tx,
                    self.start,
                    end,
                    &self.status,
                    &self.shutdown,
                )
                .await
            }
            SyncMode::Fast => {
                sync::sync_fast(
                    &self.adapter,
                    &self.dispatch_tx,
                    self.start,
                    end,
                    self.sync_thread_pool,
                    self.sync_thread_size,
                    &self.status,
                    &self.shutdown,
                )
                .await
            }
        }
    }

    fn set_synced_pct(&self, pct: u8) {
        crate::metrics::record_sync_percent(pct);
        self.status.lock().sync = format!("{pct}%");
    }

    /// Subscribe to new chain heads and, for each, fill the gap between the
    /// current `end` and the new header, invoking the fork watcher along the
    /// way. Runs until `shutdown` is cancelled or the subscription is
    /// permanently lost.
    #[instrument(skip(self))]
    pub async fn listen(&mut self) -> Result<()> {
        let mut fork = ForkWatcher::new(self.max_fork_size);
        let (header_tx, mut header_rx) = mpsc::channel(16);

        let adapter = Arc::clone(&self.adapter);
        let shutdown = self.shutdown.clone();
        let listen_task = tokio::spawn(async move { adapter.listen(header_tx, shutdown).await });

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                maybe_header = header_rx.recv() => {
                    match maybe_header {
                        Some(header) => self.listen_process(&mut fork, header).await?,
                        None => break,
                    }
                }
            }
        }

        listen_task.abort();
        Ok(())
    }

    /// Fill every height from the current `end` to `new_header` inclusive,
    /// invoking `ForkWatcher` along the way, then advance `end` past it.
    async fn listen_process(&mut self, fork: &mut ForkWatcher, new_header: U256) -> Result<()> {
        let mut height = *self.end.lock();
        while height <= new_header {
            if let Some(mut block) = self.adapter.process(height, true).await? {
                let reverts = fork.check_fork(&mut block);
                for reverted in reverts {
                    self.dispatch_tx
                        .send(DispatchMessage::Revert(reverted))
                        .await
                        .map_err(dispatch::send_failed)?;
                }
                self.dispatch_tx
                    .send(DispatchMessage::Apply(block.clone()))
                    .await
                    .map_err(dispatch::send_failed)?;
                fork.apply(block);
            }
            height += U256::from(1u64);
        }
        *self.end.lock() = new_header + U256::from(1u64);
        Ok(())
    }

    /// Cancel the shared shutdown token and wait for the dispatch consumer
    /// to drain and write its final backup.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.consumer_handle.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheSnapshot;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;

    struct MockAdapter {
        head: U256,
        seen: StdMutex<HashSet<u64>>,
    }

    #[async_trait]
    impl ChainAdapter for MockAdapter {
        async fn connect(&self) -> Result<()> {
            Ok(())
        }

        async fn latest(&self) -> Result<U256> {
            Ok(self.head)
        }

        async fn process(&self, number: U256, _listening: bool) -> Result<Option<crate::types::BlockEvent>> {
            let n = u256_to_u64_for_test(number);
            self.seen.lock().expect("mock mutex poisoned").insert(n);
            let parent = if n == 0 {
                "genesis".to_string()
            } else {
                format!("h{}", n - 1)
            };
            Ok(Some(crate::types::BlockEvent::new(number, parent, format!("h{n}"))))
        }

        async fn listen(&self, _heights: mpsc::Sender<U256>, _shutdown: CancellationToken) -> Result<()> {
            Ok(())
        }
    }

    fn u256_to_u64_for_test(x: U256) -> u64 {
        u64::try_from(x).unwrap_or(u64::MAX)
    }

    fn new_engine(head: u64, config: EngineConfig) -> (Engine<MockAdapter>, Arc<RwLock<CacheSnapshot>>) {
        let adapter = Arc::new(MockAdapter {
            head: U256::from(head),
            seen: StdMutex::new(HashSet::new()),
        });
        let snapshot = Arc::new(RwLock::new(CacheSnapshot::default()));
        let cache = Cache::new(crate::types::Tracking::default(), None, None);
        let engine = Engine::new(adapter, cache, Arc::clone(&snapshot), config, CancellationToken::new());
        (engine, snapshot)
    }

    #[tokio::test]
    async fn init_with_end_zero_reports_full_sync_without_applying() {
        let (mut engine, snapshot) = new_engine(
            0,
            EngineConfig {
                start: U256::from(5u64),
                end: Some(U256::ZERO),
                ..EngineConfig::default()
            },
        );
        engine.init().await.unwrap();
        assert_eq!(engine.status().sync, "100%");
        // give the dispatch consumer a moment to process (no messages expected).
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(snapshot.read().stats.get("block").map(|s| s.count.as_str()), Some("0"));
    }

    #[tokio::test]
    async fn normal_sync_applies_every_height_in_range() {
        let (mut engine, snapshot) = new_engine(
            9,
            EngineConfig {
                start: U256::ZERO,
                end: Some(U256::from(9u64)),
                sync_mode: SyncMode::Normal,
                ..EngineConfig::default()
            },
        );
        engine.init().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(snapshot.read().stats["block"].count, "10");
    }

    #[tokio::test]
    async fn fast_sync_applies_every_height_exactly_once() {
        let (mut engine, snapshot) = new_engine(
            199,
            EngineConfig {
                start: U256::ZERO,
                end: Some(U256::from(199u64)),
                sync_mode: SyncMode::Fast,
                sync_thread_pool: 4,
                sync_thread_size: 25,
                ..EngineConfig::default()
            },
        );
        engine.init().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(snapshot.read().stats["block"].count, "200");
    }

    #[tokio::test]
    async fn start_greater_than_end_is_a_sync_no_op() {
        let (mut engine, snapshot) = new_engine(
            3,
            EngineConfig {
                start: U256::from(5u64),
                end: Some(U256::from(3u64)),
                ..EngineConfig::default()
            },
        );
        engine.init().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(snapshot.read().stats.get("block").map(|s| s.count.as_str()), Some("0"));
        assert_eq!(engine.status().sync, "100%");
    }
}
