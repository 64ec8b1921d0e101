//! The `ChainAdapter` port: chain-specific connect/fetch/subscribe, fed to the
//! chain-agnostic [`crate::engine::Engine`] by composition.

use alloy::primitives::U256;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::BlockEvent;

/// Chain-specific connect/latest/process/listen capability set.
///
/// `Process(number, listening)` from the source contract is split here into
/// [`ChainAdapter::process`] (fetch + build the `BlockEvent`) — fork-watcher
/// invocation moved to the engine's single dispatch consumer per the §9
/// "single-writer Cache" redesign, so this port never touches the fork tail.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Establish a connection, retrying every 5 s until one succeeds. Must be
    /// idempotent: a second call on an already-connected adapter is a no-op.
    async fn connect(&self) -> Result<()>;

    /// Current chain head height.
    async fn latest(&self) -> Result<U256>;

    /// Fetch and translate the block at `number`. `listening` is forwarded to
    /// the processor (it may affect logging verbosity) but never changes
    /// which fields are populated. Returns `Ok(None)` only when the adapter
    /// chooses to tolerate a missing height; transport failures are `Err`.
    async fn process(&self, number: U256, listening: bool) -> Result<Option<BlockEvent>>;

    /// Subscribe to new chain heads, sending each newly observed height on
    /// `heights` until `shutdown` is cancelled. On subscription loss, the
    /// adapter re-enters its connecting state and retries at the same 5 s
    /// cadence as `connect` rather than returning an error (§9 Open
    /// Questions: "Subscription error handling").
    async fn listen(&self, heights: mpsc::Sender<U256>, shutdown: CancellationToken) -> Result<()>;
}
