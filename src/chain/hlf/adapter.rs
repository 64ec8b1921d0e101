//! Hyperledger Fabric `ChainAdapter`. A thin stub: the gateway/ledger client
//! wiring is plumbing outside this crate's scope (`SPEC_FULL.md` §4.1), so
//! this adapter proves out the trait boundary against a synthetic,
//! monotonically advancing block height rather than a live Fabric network.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use alloy::primitives::U256;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::Result;
use crate::ports::{BlockProcessor as _, ChainAdapter};
use crate::types::BlockEvent;

use super::processor::HlfBlockProcessor;

const BLOCK_INTERVAL: Duration = Duration::from_secs(2);

/// Fabric connection identity (connection-profile path plus wallet/org
/// identities), bound at construction rather than the source's global
/// mutable registry of chain constants (`SPEC_FULL.md` §9).
#[derive(Debug, Clone)]
pub struct HlfConnectionConfig {
    /// Path to the Fabric connection profile.
    pub path: std::path::PathBuf,
    /// Wallet identity to submit/evaluate transactions as.
    pub wallet_user: String,
    /// MSP org identity.
    pub org_user: String,
}

/// Thin Fabric adapter stub.
pub struct HlfChainAdapter {
    config: HlfConnectionConfig,
    connected: AtomicBool,
    height: AtomicU64,
    processor: HlfBlockProcessor,
}

impl HlfChainAdapter {
    /// A new, unconnected adapter bound to `config`.
    #[must_use]
    pub fn new(config: HlfConnectionConfig) -> Self {
        Self {
            config,
            connected: AtomicBool::new(false),
            height: AtomicU64::new(0),
            processor: HlfBlockProcessor::new(),
        }
    }
}

#[async_trait]
impl ChainAdapter for HlfChainAdapter {
    #[instrument(skip(self), fields(path = %self.config.path.display(), wallet_user = %self.config.wallet_user))]
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn latest(&self) -> Result<U256> {
        Ok(U256::from(self.height.load(Ordering::SeqCst)))
    }

    async fn process(&self, number: U256, listening: bool) -> Result<Option<BlockEvent>> {
        let parent_hash = if number == U256::ZERO {
            "genesis".to_string()
        } else {
            format!("hlf-block-{}", number - U256::from(1u64))
        };
        let hash = format!("hlf-block-{number}");
        let mut event = self.processor.new_block_event(number, &parent_hash, &hash);
        self.processor.process(&(), &mut event, listening).await?;
        Ok(Some(event))
    }

    async fn listen(&self, heights: mpsc::Sender<U256>, shutdown: CancellationToken) -> Result<()> {
        let mut interval = tokio::time::interval(BLOCK_INTERVAL);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => return Ok(()),
                _ = interval.tick() => {
                    let next = self.height.fetch_add(1, Ordering::SeqCst) + 1;
                    if heights.send(U256::from(next)).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}
