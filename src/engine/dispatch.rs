//! The dispatch queue and its single consumer task: the sole writer of
//! `Cache` state, per `SPEC_FULL.md` §5's single-writer discipline.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::cache::{Cache, CacheSnapshot};
use crate::error::AppError;
use crate::metrics as poller_metrics;
use crate::types::{BlockEvent, EngineStatus};

/// A unit of work pushed onto the dispatch channel by sync workers, the
/// listener path, or the engine's post-sync readiness signal.
#[derive(Debug, Clone)]
pub enum DispatchMessage {
    /// Commit a newly accepted block.
    Apply(BlockEvent),
    /// Undo a block evicted by a re-org.
    Revert(BlockEvent),
    /// Flip the cache's readiness latch, enabling balance refresh.
    SetReady,
}

/// Map a channel-send failure (the receiver/consumer is gone) to an
/// application error.
pub fn send_failed<T>(_: mpsc::error::SendError<T>) -> AppError {
    AppError::ShutdownRequested
}

/// Spawn the single dispatch consumer task. It owns `cache` for the
/// lifetime of the task, applies/reverts in strict receive order, updates
/// `status.current` on every `Apply`, and republishes `snapshot` after each
/// message. On cancellation it drains whatever is already queued and writes
/// a final unconditional backup before returning.
pub fn spawn_consumer(
    mut rx: mpsc::Receiver<DispatchMessage>,
    mut cache: Cache,
    status: Arc<Mutex<EngineStatus>>,
    snapshot: Arc<RwLock<CacheSnapshot>>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                maybe_msg = rx.recv() => {
                    match maybe_msg {
                        Some(msg) => {
                            handle_message(&mut cache, &status, msg).await;
                            *snapshot.write() = cache.snapshot();
                        }
                        None => break,
                    }
                }
                () = shutdown.cancelled() => {
                    while let Ok(msg) = rx.try_recv() {
                        handle_message(&mut cache, &status, msg).await;
                    }
                    *snapshot.write() = cache.snapshot();
                    if let Err(e) = cache.final_backup().await {
                        warn!(error = ?e, "final backup write failed on shutdown");
                    }
                    break;
                }
            }
        }
    })
}

async fn handle_message(cache: &mut Cache, status: &Arc<Mutex<EngineStatus>>, msg: DispatchMessage) {
    match msg {
        DispatchMessage::Apply(block) => {
            let number = block.number;
            if let Err(e) = cache.apply(&block).await {
                error!(error = ?e, number = %number, "cache apply failed");
            }
            status.lock().current = number.to_string();
            poller_metrics::record_block_applied(u64::try_from(number).unwrap_or(u64::MAX));
        }
        DispatchMessage::Revert(block) => {
            cache.revert(&block);
            poller_metrics::record_block_reverted();
        }
        DispatchMessage::SetReady => {
            cache.set_ready();
        }
    }
}
