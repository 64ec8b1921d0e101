//! Ethereum `BlockProcessor`: derives per-block and per-transaction fields
//! from a full `eth_getBlockByNumber` response.

use std::sync::Arc;

use alloy::consensus::Transaction as _;
use alloy::network::{Ethereum, ReceiptResponse};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{Block, Transaction};
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::warn;

use crate::error::{InfraError, Result};
use crate::ports::BlockProcessor;
use crate::types::BlockEvent;
use crate::types::TxEvent;
use crate::types::block::EthTxEvent;

/// Translates a full block response into a `BlockEvent`.
///
/// Caches the connected provider handle (used for per-transaction receipt
/// fetches) the first time the adapter connects — the processor's only piece
/// of state, per `SPEC_FULL.md` §4.2's "stateless aside from what's cached at
/// connect."
#[derive(Default)]
pub struct EthBlockProcessor {
    provider: OnceCell<Arc<RootProvider<Ethereum>>>,
}

impl EthBlockProcessor {
    /// A fresh, unconnected processor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache the connected provider handle. Called once by
    /// [`super::adapter::EthChainAdapter::connect`].
    pub fn bind(&self, provider: Arc<RootProvider<Ethereum>>) {
        let _ = self.provider.set(provider);
    }

    fn unbound_error() -> InfraError {
        InfraError::Rpc(Box::<dyn std::error::Error + Send + Sync>::from(
            "ethereum processor used before connect()",
        ))
    }

    async fn build_tx_event(&self, provider: &RootProvider<Ethereum>, tx: &Transaction) -> EthTxEvent {
        let input = tx.input();
        let function_id = (input.len() >= 4).then(|| format!("0x{}", hex::encode(&input[..4])));

        let mut deploy = None;
        let mut topics = Vec::new();
        match provider.get_transaction_receipt(*tx.tx_hash()).await {
            Ok(Some(receipt)) => {
                deploy = receipt.contract_address();
                for log in receipt.logs() {
                    topics.extend(log.topics().iter().map(std::string::ToString::to_string));
                }
            }
            Ok(None) => {}
            Err(e) => warn!(
                tx_hash = %tx.tx_hash(),
                error = %e,
                "receipt fetch failed, leaving deploy/events empty for this transaction"
            ),
        }

        // `from` is already EIP-155-recovered by the node/RPC layer; no
        // client-side signature recovery is needed on top of that.
        EthTxEvent {
            sender: tx.from,
            receiver: tx.to(),
            value: tx.value(),
            function_id,
            events: topics,
            deploy,
        }
    }
}

#[async_trait]
impl BlockProcessor for EthBlockProcessor {
    type Raw = Block;

    async fn process(&self, raw: &Self::Raw, event: &mut BlockEvent, _listening: bool) -> Result<()> {
        let provider = self.provider.get().ok_or_else(Self::unbound_error)?;

        event.timestamp = raw.header.timestamp;
        event.miner = Some(raw.header.beneficiary.to_string());
        event.size = raw.size.map(|s| u128::try_from(s).unwrap_or(u128::MAX) as f64).unwrap_or(0.0);
        event.gas = raw.header.gas_used as f64;
        event.gas_limit = raw.header.gas_limit as f64;
        event.usage = if raw.header.gas_limit > 0 {
            (event.gas * 100.0 / event.gas_limit).abs()
        } else {
            0.0
        };

        let Some(txs) = raw.transactions.as_transactions() else {
            return Ok(());
        };

        let mut built = Vec::with_capacity(txs.len());
        for tx in txs {
            built.push(self.build_tx_event(provider, tx).await);
        }
        event.transactions = built.into_iter().map(TxEvent::Eth).collect();

        Ok(())
    }
}
