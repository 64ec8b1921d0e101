//! Binary entry point: parse the CLI, load ambient settings and tracking
//! rules, wire up the chain-specific adapter, and drive the engine's sync,
//! listen, HTTP and disk-probe tasks to completion.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use ledger_poller::cache::{BackupConfig, Cache, CacheSnapshot};
use ledger_poller::chain::eth::EthChainAdapter;
use ledger_poller::chain::hlf::{HlfChainAdapter, HlfConnectionConfig};
use ledger_poller::cli::{Cli, Command, CommonArgs};
use ledger_poller::config::{Settings, load_tracking_config};
use ledger_poller::disk;
use ledger_poller::engine::{Engine, EngineConfig, SyncMode};
use ledger_poller::error::{AppError, DomainError, Result};
use ledger_poller::http::{self, AppState};
use ledger_poller::metrics;
use ledger_poller::ports::{BalanceSource, ChainAdapter};
use ledger_poller::types::DiskUsage;

use clap::Parser;

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if settings.logging.format == "json" {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };

    if let Err(e) = result {
        eprintln!("failed to initialize logging: {e}");
    }
}

async fn signal_shutdown(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => warn!("received ctrl-c, initiating graceful shutdown"),
        () = terminate => warn!("received sigterm, initiating graceful shutdown"),
    }

    token.cancel();
}

fn parse_sync_mode(raw: &str) -> Result<SyncMode> {
    match raw {
        "normal" => Ok(SyncMode::Normal),
        "fast" => Ok(SyncMode::Fast),
        other => Err(AppError::Domain(DomainError::InvalidSyncMode(other.to_string()))),
    }
}

/// Resolve the effective `(start, restore-from-backup)` pair per the
/// `-1` "auto" sentinel documented on [`CommonArgs::start`]: restore mode
/// continues from `cacheBackupHeight + 1`, otherwise live-only mode starts
/// at the chain head observed at connect time.
async fn resolve_start<A: ChainAdapter>(
    common: &CommonArgs,
    adapter: &A,
    restored_height: Option<U256>,
) -> Result<U256> {
    if common.start >= 0 {
        return Ok(U256::from(common.start as u64));
    }
    if let Some(height) = restored_height {
        return Ok(height + U256::from(1u64));
    }
    adapter.latest().await
}

/// Drive the whole task graph for a connected adapter: cache/backup
/// bring-up, engine sync + listen, the disk probe, optional metrics, and the
/// HTTP status surface, all torn down by the same shared shutdown token.
async fn run_with_adapter<A: ChainAdapter + 'static>(
    adapter: Arc<A>,
    balance_source: Option<Arc<dyn BalanceSource>>,
    common: &CommonArgs,
    settings: &Settings,
) -> Result<()> {
    let tracking = load_tracking_config(&common.config)?;

    let backup = Some(BackupConfig {
        path: common.backup_path.clone(),
        frequency: common.backup,
    });

    let mut cache = Cache::new(tracking, backup, balance_source);

    let mut restored_height = None;
    if common.restore {
        cache.restore(&common.backup_path).await?;
        restored_height = cache.backup_height();
    }

    adapter.connect().await?;
    let start = resolve_start(common, adapter.as_ref(), restored_height).await?;

    let sync_mode = parse_sync_mode(&common.sync_mode)?;
    let end = if common.end > 0 { Some(U256::from(common.end as u64)) } else { None };

    let engine_config = EngineConfig {
        start,
        end,
        sync_mode,
        sync_thread_pool: common.sync_thread_pool,
        sync_thread_size: common.sync_thread_size,
        max_fork_size: common.max_fork_size,
    };

    let shutdown = CancellationToken::new();
    let snapshot = Arc::new(RwLock::new(CacheSnapshot::default()));
    let mut engine = Engine::new(
        Arc::clone(&adapter),
        cache,
        Arc::clone(&snapshot),
        engine_config,
        shutdown.clone(),
    );

    engine.init().await?;
    engine.set_ready().await?;

    let disk_state = Arc::new(RwLock::new(DiskUsage::default()));
    let probe_handle = tokio::spawn(disk::run_probe(
        common.ledger_path.clone(),
        Duration::from_secs(settings.probe.refresh_secs),
        Arc::clone(&disk_state),
        shutdown.clone(),
    ));

    let metrics_handle = if common.metrics {
        Some(metrics::install()?)
    } else {
        None
    };

    let state = AppState {
        status: engine.status_handle(),
        snapshot,
        disk: disk_state,
        metrics: metrics_handle,
    };
    let router = http::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", common.port))
        .await
        .map_err(ledger_poller::error::InfraError::Io)?;
    info!(port = common.port, "http status surface listening");

    let server_shutdown = shutdown.clone();
    let server_handle = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            error!(error = %e, "http server exited with an error");
        }
    });

    let signal_handle = tokio::spawn(signal_shutdown(shutdown.clone()));

    let listen_result = engine.listen().await;

    shutdown.cancel();
    engine.shutdown().await;
    let _ = probe_handle.await;
    let _ = server_handle.await;
    signal_handle.abort();

    listen_result
}

async fn run(cli: Cli, settings: &Settings) -> Result<()> {
    match cli.command {
        Command::Eth(args) => {
            let http_url = args.url.replacen("ws://", "http://", 1).replacen("wss://", "https://", 1);
            let adapter = Arc::new(EthChainAdapter::new(http_url, args.url.clone()));
            let balance_source: Arc<dyn BalanceSource> = Arc::clone(&adapter);
            run_with_adapter(adapter, Some(balance_source), &args.common, settings).await
        }
        Command::Hlf(args) => {
            let adapter = Arc::new(HlfChainAdapter::new(HlfConnectionConfig {
                path: args.path.clone(),
                wallet_user: args.wallet_user.clone(),
                org_user: args.org_user.clone(),
            }));
            run_with_adapter(adapter, None, &args.common, settings).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("failed to load settings: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings);

    info!(version = ledger_poller::VERSION, "starting ledger poller");

    match run(cli, &settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::ShutdownRequested) => {
            info!("ledger poller stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "ledger poller exited with an error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[test]
    fn parse_sync_mode_accepts_normal_and_fast() {
        assert_eq!(parse_sync_mode("normal").unwrap(), SyncMode::Normal);
        assert_eq!(parse_sync_mode("fast").unwrap(), SyncMode::Fast);
    }

    #[test]
    fn parse_sync_mode_rejects_anything_else() {
        let err = parse_sync_mode("turbo").unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::InvalidSyncMode(_))));
    }

    struct StubAdapter {
        head: U256,
    }

    #[async_trait]
    impl ChainAdapter for StubAdapter {
        async fn connect(&self) -> Result<()> {
            Ok(())
        }

        async fn latest(&self) -> Result<U256> {
            Ok(self.head)
        }

        async fn process(&self, _number: U256, _listening: bool) -> Result<Option<ledger_poller::types::BlockEvent>> {
            Ok(None)
        }

        async fn listen(
            &self,
            _heights: tokio::sync::mpsc::Sender<U256>,
            _shutdown: CancellationToken,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn common_args(start: i64) -> CommonArgs {
        CommonArgs {
            port: 8000,
            config: "config.yml".into(),
            backup_path: "backup.json".into(),
            backup: 0,
            restore: false,
            sync_mode: "normal".into(),
            sync_thread_pool: 4,
            sync_thread_size: 25,
            start,
            end: -1,
            max_fork_size: 10,
            ledger_path: "/chain".into(),
            api: "http://localhost:8545".into(),
            metrics: false,
        }
    }

    #[tokio::test]
    async fn resolve_start_honors_explicit_nonnegative_start() {
        let adapter = StubAdapter { head: U256::from(42u64) };
        let start = resolve_start(&common_args(7), &adapter, None).await.unwrap();
        assert_eq!(start, U256::from(7u64));
    }

    #[tokio::test]
    async fn resolve_start_continues_from_restored_height_plus_one() {
        let adapter = StubAdapter { head: U256::from(42u64) };
        let start = resolve_start(&common_args(-1), &adapter, Some(U256::from(99u64))).await.unwrap();
        assert_eq!(start, U256::from(100u64));
    }

    #[tokio::test]
    async fn resolve_start_falls_back_to_chain_head_when_live_only() {
        let adapter = StubAdapter { head: U256::from(42u64) };
        let start = resolve_start(&common_args(-1), &adapter, None).await.unwrap();
        assert_eq!(start, U256::from(42u64));
    }
}
