//! `BlockEvent` and `TxEvent`: the chain-agnostic record produced by a
//! [`crate::ports::BlockProcessor`] and consumed by the fork watcher and cache.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// A single committed block, normalized from whichever chain produced it.
///
/// `number`, `hash` and `parent_hash` identify the block; everything else is
/// chain-specific derived data. `fork` and `interval` are filled in after the
/// fact (by the fork watcher and the cache respectively), never by the
/// processor that first builds the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockEvent {
    /// Chain height. Arbitrary precision, never negative.
    pub number: U256,
    /// This block's own hash.
    pub hash: String,
    /// The hash of the block this one extends.
    pub parent_hash: String,
    /// Seconds since epoch. For Fabric this is the timestamp of the first
    /// transaction rather than a block-level field.
    pub timestamp: u64,
    /// Block proposer/miner address. `None` for Fabric.
    pub miner: Option<String>,
    /// Block size in bytes, as a float to mirror the source's `float64` metrics.
    pub size: f64,
    /// Gas used by the block (Ethereum only; 0 for Fabric).
    pub gas: f64,
    /// Gas limit of the block (Ethereum only; 0 for Fabric).
    pub gas_limit: f64,
    /// `|gas * 100 / gas_limit|`, precomputed by the processor.
    pub usage: f64,
    /// Transactions in block order.
    pub transactions: Vec<TxEvent>,
    /// Set by the fork watcher: true when this block's parent did not match
    /// the previous tail at the time it was checked.
    pub fork: bool,
    /// Seconds since the previous block's timestamp. Computed by the cache,
    /// not rewound on revert.
    pub interval: u64,
}

impl BlockEvent {
    /// Construct an empty event with only the identity fields set, mirroring
    /// `Processor::NewBlockEvent` in the source design.
    #[must_use]
    pub fn new(number: U256, parent_hash: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            number,
            hash: hash.into(),
            parent_hash: parent_hash.into(),
            timestamp: 0,
            miner: None,
            size: 0.0,
            gas: 0.0,
            gas_limit: 0.0,
            usage: 0.0,
            transactions: Vec::new(),
            fork: false,
            interval: 0,
        }
    }
}

/// Per-transaction payload. Represented as a tagged union rather than two
/// unrelated structs so the chain-agnostic core (fork watcher, cache) can stay
/// generic over `BlockEvent` without runtime downcasts (see `SPEC_FULL.md` §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "chain", rename_all = "lowercase")]
pub enum TxEvent {
    /// An EVM-compatible transaction.
    Eth(EthTxEvent),
    /// A Hyperledger Fabric transaction.
    Hlf(HlfTxEvent),
}

impl TxEvent {
    /// The Ethereum payload, if this is an `Eth` variant.
    #[must_use]
    pub const fn as_eth(&self) -> Option<&EthTxEvent> {
        match self {
            Self::Eth(tx) => Some(tx),
            Self::Hlf(_) => None,
        }
    }
}

/// Ethereum transaction fields relevant to rule matching and stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthTxEvent {
    /// Recovered sender address (EIP-155).
    pub sender: Address,
    /// Call target; `None` for contract-creation transactions.
    pub receiver: Option<Address>,
    /// Wei transferred.
    pub value: U256,
    /// First 4 bytes of non-empty call data, hex-encoded (`0x`-prefixed).
    pub function_id: Option<String>,
    /// Every topic of every log in the transaction's receipt.
    pub events: Vec<String>,
    /// Contract address created by this transaction, if any.
    pub deploy: Option<Address>,
}

/// Hyperledger Fabric transaction fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HlfTxEvent {
    /// Transaction id.
    pub id: String,
    /// Submitting identity.
    pub creator: String,
    /// Transaction timestamp (seconds since epoch).
    pub timestamp: u64,
    /// Invoked chaincode name.
    pub chaincode: String,
    /// Invoked method (first argument of the chaincode invocation).
    pub method: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_block_event_has_zeroed_derived_fields() {
        let b = BlockEvent::new(U256::from(5u64), "0xparent", "0xhash");
        assert_eq!(b.number, U256::from(5u64));
        assert!(!b.fork);
        assert_eq!(b.interval, 0);
        assert!(b.transactions.is_empty());
    }

    #[test]
    fn tx_event_as_eth_filters_variant() {
        let hlf = TxEvent::Hlf(HlfTxEvent {
            id: "tx1".into(),
            creator: "admin".into(),
            timestamp: 0,
            chaincode: "cc".into(),
            method: "invoke".into(),
        });
        assert!(hlf.as_eth().is_none());
    }
}
