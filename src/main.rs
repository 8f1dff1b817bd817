//! Copy-trade monitor entry point
//!
//! 1. Loads `.env`, logging and `config.yaml`
//! 2. Connects the ledger (degrades to non-persisting mode if unreachable)
//! 3. Bootstraps: syncs recent history as already delivered
//! 4. Polls every account until Ctrl+C

use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use copytrade_monitor::adapters::{DataApiClient, DataApiConfig};
use copytrade_monitor::config::{self, constants, LedgerConfig};
use copytrade_monitor::core::{
    init_logging, snapshot_supervisor_task, AccountRegistry, ChannelBundle, FreshTrade,
    MonitorNotice, MonitorSettings, PollScheduler, SchedulerChannels, ShortAddress, SystemClock,
};
use copytrade_monitor::ledger::{InMemoryLedger, LedgerStore, SupabaseLedger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    info!("Copy-trade monitor starting...");
    constants::log_configuration();

    let config_path = std::env::var("CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yaml"));
    info!(path = %config_path.display(), "Loading configuration");

    let config = match config::load_config(&config_path) {
        Ok(cfg) => {
            info!(
                accounts = cfg.accounts.len(),
                interval_secs = cfg.monitor.fetch_interval_secs,
                stale_window_hours = cfg.monitor.stale_window_hours,
                "[CONFIG] Loaded"
            );
            cfg
        }
        Err(e) => {
            error!("[ERROR] Configuration failed: {}", e);
            std::process::exit(1);
        }
    };

    let ledger: Arc<dyn LedgerStore> = match LedgerConfig::from_env() {
        Ok(LedgerConfig::Supabase(supabase)) => Arc::new(
            SupabaseLedger::connect_with_retry(&supabase, constants::ledger_connect_attempts()).await?,
        ),
        Ok(LedgerConfig::Memory) => Arc::new(InMemoryLedger::new()),
        Err(e) => {
            error!("[ERROR] Ledger configuration failed: {}", e);
            std::process::exit(1);
        }
    };

    let feed = Arc::new(DataApiClient::new(DataApiConfig {
        base_url: config.api.data_api_base.clone(),
        request_timeout_ms: config.api.request_timeout_ms,
    })?);

    let bundle = ChannelBundle::with_capacities(
        constants::notice_channel_capacity(),
        constants::fresh_trade_channel_capacity(),
        constants::snapshot_fault_channel_capacity(),
    );
    let ChannelBundle {
        notice_tx,
        notice_rx,
        fresh_tx,
        fresh_rx,
        fault_tx,
        fault_rx,
        shutdown,
    } = bundle;

    let scheduler = Arc::new(PollScheduler::new(
        AccountRegistry::from_config(&config.accounts),
        feed,
        ledger,
        Arc::new(SystemClock),
        MonitorSettings::from_config(&config),
        SchedulerChannels {
            notice_tx,
            fresh_tx,
            fault_tx,
        },
    ));

    scheduler.log_ledger_overview().await;

    let report = scheduler.bootstrap().await;
    info!(
        synced = report.synced,
        repaired = report.repaired,
        purged = report.purged,
        failed = report.failed_accounts.len(),
        "[BOOTSTRAP] Done"
    );

    let supervisor = tokio::spawn(snapshot_supervisor_task(fault_rx, shutdown.clone()));
    let observer = tokio::spawn(observe_outputs(notice_rx, fresh_rx, shutdown.clone()));
    let poller = {
        let scheduler = scheduler.clone();
        let cancel = shutdown.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };

    match signal::ctrl_c().await {
        Ok(()) => info!("[SHUTDOWN] Graceful shutdown initiated"),
        Err(err) => error!("Failed to listen for Ctrl+C signal: {}", err),
    }
    shutdown.cancel();

    let grace = constants::shutdown_grace_period();
    if tokio::time::timeout(grace, poller).await.is_err() {
        warn!(grace_secs = grace.as_secs(), "[SHUTDOWN] Poll cycle still running, abandoning it");
    }
    if tokio::time::timeout(grace, scheduler.drain_snapshots()).await.is_err() {
        warn!("[SHUTDOWN] Position refreshes still running, abandoning them");
    }
    let _ = supervisor.await;
    let _ = observer.await;

    info!("[SHUTDOWN] Clean exit");
    Ok(())
}

/// Log detected notices and fresh fast-cycle trades until shutdown.
/// An execution consumer subscribes to these same channels in-process; pending
/// ledger entries are the only output visible outside the process.
async fn observe_outputs(
    mut notice_rx: mpsc::Receiver<MonitorNotice>,
    mut fresh_rx: mpsc::Receiver<FreshTrade>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Some(notice) = notice_rx.recv() => match notice {
                MonitorNotice::Detected { account, transaction_hash, persisted } => {
                    if !persisted {
                        warn!(
                            account = %ShortAddress(&account),
                            tx = %transaction_hash,
                            "Trade detected but not persisted"
                        );
                    }
                }
            },
            Some(fresh) = fresh_rx.recv() => {
                info!(
                    account = %ShortAddress(&fresh.account),
                    tx = %fresh.event.transaction_hash,
                    side = %fresh.event.side,
                    price = fresh.event.price,
                    age_secs = fresh.age_secs,
                    "[FAST] Fresh trade ready for execution"
                );
            }
            else => break,
        }
    }
}
