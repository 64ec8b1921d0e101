//! `ledger-poller`: a chain-agnostic blockchain event poller.
//!
//! Follows the head of a distributed ledger (primarily Ethereum-compatible;
//! a Hyperledger Fabric variant also exists), replays historical blocks on
//! startup, ingests new blocks as they are produced, derives per-block
//! statistics and matches configured tracking rules, detects and reconciles
//! chain re-organizations, and exposes the resulting state over a read-only
//! HTTP JSON API.
//!
//! # Modules
//!
//! - [`types`] - the chain-agnostic data model (`BlockEvent`, `Stats`, `Tracking`, ...)
//! - [`ports`] - the narrow capability sets the core depends on (`ChainAdapter`, `BlockProcessor`, `BalanceSource`)
//! - [`chain`] - per-chain adapters (Ethereum via `alloy`, a Hyperledger Fabric stub)
//! - [`fork`] - the bounded in-memory chain tail and re-org reconciliation
//! - [`engine`] - the sync/listen orchestrator and its dispatch queue
//! - [`cache`] - the stats/tracking layer and its backup/restore
//! - [`config`] - layered ambient settings and the tracking rules YAML loader
//! - [`disk`] - the periodic disk-usage probe
//! - [`http`] - the read-only status/stats/tracking/disk/metrics surface
//! - [`metrics`] - optional Prometheus exposition
//! - [`error`] - the layered error taxonomy
//! - [`cli`] - command-line argument parsing

pub mod cache;
pub mod chain;
pub mod cli;
pub mod config;
pub mod disk;
pub mod engine;
pub mod error;
pub mod fork;
pub mod http;
pub mod metrics;
pub mod ports;
pub mod types;

/// The crate's version, as declared in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
