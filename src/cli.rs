//! Command-line argument parsing (ambient component A1): `eth`/`hlf`
//! subcommands, every flag bindable via its documented environment variable
//! (`SPEC_FULL.md` §6).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Blockchain event poller: historical sync, live follow, fork
/// reconciliation and rule-based tracking.
#[derive(Parser, Debug)]
#[command(name = "ledger-poller", author, version, about, long_about = None)]
pub struct Cli {
    /// Which chain to follow.
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// The flags shared by every subcommand, regardless of which chain was selected.
    #[must_use]
    pub fn common(&self) -> &CommonArgs {
        match &self.command {
            Command::Eth(args) => &args.common,
            Command::Hlf(args) => &args.common,
        }
    }
}

/// The chain to follow.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Follow an Ethereum-compatible chain over JSON-RPC/WebSocket.
    Eth(EthArgs),
    /// Follow a Hyperledger Fabric channel via its gateway client.
    Hlf(HlfArgs),
}

/// Flags specific to the `eth` subcommand.
#[derive(Args, Debug)]
pub struct EthArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Ethereum JSON-RPC/WebSocket endpoint. The WS half is used for the
    /// new-head subscription; an HTTP endpoint on the same host serves
    /// historical fetches.
    #[arg(long, env = "ETH_URL", default_value = "ws://localhost:8546")]
    pub url: String,
}

/// Flags specific to the `hlf` subcommand.
#[derive(Args, Debug)]
pub struct HlfArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Path to the Fabric connection profile.
    #[arg(long, env = "POLLER_PATH", default_value = "connection-profile.json")]
    pub path: PathBuf,

    /// Fabric wallet identity to evaluate/submit transactions as.
    #[arg(long = "walletUser", env = "POLLER_WALLET_USER", default_value = "admin")]
    pub wallet_user: String,

    /// Fabric MSP org identity.
    #[arg(long = "orgUser", env = "POLLER_ORG_USER", default_value = "Admin")]
    pub org_user: String,
}

/// Flags shared by both `eth` and `hlf`.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// HTTP status port.
    #[arg(long, env = "POLLER_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Tracking rules YAML.
    #[arg(long, env = "POLLER_CONFIG", default_value = "config.yml")]
    pub config: PathBuf,

    /// Backup file.
    #[arg(long = "backupPath", env = "POLLER_BACKUP_PATH", default_value = "backup.json")]
    pub backup_path: PathBuf,

    /// Backup every N accepted blocks (`0` = never, aside from the
    /// unconditional write on graceful shutdown).
    #[arg(long, env = "POLLER_BACKUP", default_value_t = 0)]
    pub backup: u64,

    /// Rehydrate from the backup file; fails startup if it's absent.
    #[arg(long, env = "POLLER_RESTORE", default_value_t = false)]
    pub restore: bool,

    /// `normal` (sequential) or `fast` (pooled) historical sync.
    #[arg(long = "syncMode", env = "POLLER_SYNC_MODE", default_value = "normal")]
    pub sync_mode: String,

    /// Fast-mode worker count.
    #[arg(long = "syncThreadPool", env = "POLLER_SYNC_THREAD_POOL", default_value_t = 4)]
    pub sync_thread_pool: usize,

    /// Fast-mode blocks per worker per round.
    #[arg(long = "syncThreadSize", env = "POLLER_SYNC_THREAD_SIZE", default_value_t = 25)]
    pub sync_thread_size: usize,

    /// Start height. `-1` means "auto": `cacheBackupHeight + 1` when
    /// `--restore` is set, otherwise the current chain head (live-only).
    #[arg(long, env = "POLLER_START", allow_hyphen_values = true, default_value_t = 0)]
    pub start: i64,

    /// End height. `<= 0` means "the current chain head at startup".
    #[arg(long, env = "POLLER_END", allow_hyphen_values = true, default_value_t = -1)]
    pub end: i64,

    /// `ForkWatcher` tail capacity (re-org depth the system can correct).
    #[arg(long = "maxForkSize", env = "POLLER_MAX_FORK_SIZE", default_value_t = 10)]
    pub max_fork_size: usize,

    /// Filesystem path monitored for disk usage.
    #[arg(long = "ledgerPath", env = "POLLER_LEDGER_PATH", default_value = "/chain")]
    pub ledger_path: PathBuf,

    /// JSON-RPC HTTP endpoint used by the metrics exporter.
    #[arg(long, env = "POLLER_API", default_value = "http://localhost:8545")]
    pub api: String,

    /// Enable the Prometheus `/metrics` exposition endpoint.
    #[arg(long, env = "POLLER_METRICS", default_value_t = false)]
    pub metrics: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eth_subcommand_parses_with_defaults() {
        let cli = Cli::parse_from(["ledger-poller", "eth"]);
        assert_eq!(cli.common().port, 8000);
        assert_eq!(cli.common().start, 0);
        assert_eq!(cli.common().end, -1);
        match cli.command {
            Command::Eth(args) => assert_eq!(args.url, "ws://localhost:8546"),
            Command::Hlf(_) => panic!("expected eth subcommand"),
        }
    }

    #[test]
    fn hlf_subcommand_parses_identity_flags() {
        let cli = Cli::parse_from(["ledger-poller", "hlf", "--walletUser", "alice", "--orgUser", "Org2"]);
        match cli.command {
            Command::Hlf(args) => {
                assert_eq!(args.wallet_user, "alice");
                assert_eq!(args.org_user, "Org2");
            }
            Command::Eth(_) => panic!("expected hlf subcommand"),
        }
    }

    #[test]
    fn negative_start_sentinel_parses() {
        let cli = Cli::parse_from(["ledger-poller", "eth", "--start", "-1"]);
        assert_eq!(cli.common().start, -1);
    }
}
