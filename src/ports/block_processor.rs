//! The `BlockProcessor` port: translates a chain-specific raw block into a
//! [`BlockEvent`].

use alloy::primitives::U256;
use async_trait::async_trait;

use crate::error::Result;
use crate::types::BlockEvent;

/// Stateless-aside-from-connect-time-cache translation from a raw block (of
/// associated type `Raw`, chain-specific) to a chain-agnostic `BlockEvent`.
///
/// Per-transaction fetch failures (receipts, signer data) are the
/// implementer's responsibility to catch and log at `warn`; they must never
/// surface as `Err` from [`BlockProcessor::process`] (see `SPEC_FULL.md`
/// §4.2 — partial `BlockEvent`s are the documented behavior).
#[async_trait]
pub trait BlockProcessor: Send + Sync {
    /// The chain-specific raw block type this processor consumes.
    type Raw: Send + Sync;

    /// Construct an empty `BlockEvent` with only identity fields set.
    fn new_block_event(&self, number: U256, parent_hash: &str, hash: &str) -> BlockEvent {
        BlockEvent::new(number, parent_hash, hash)
    }

    /// Populate `event` from `raw` (timestamp, gas/size, miner, transactions,
    /// per-tx derived fields).
    async fn process(&self, raw: &Self::Raw, event: &mut BlockEvent, listening: bool) -> Result<()>;
}
