//! Poll scheduler
//!
//! Every `fetch_interval`, each registered account is fetched and its events
//! run through the classifier, in concurrent batches of `batch_size`. Inside a
//! batch every account is awaited to completion (all-settled): one failure is
//! logged and never cancels its siblings.
//!
//! # Shutdown
//! The cancellation token is checked before each cycle and raced against the
//! inter-tick sleep. An in-flight cycle is never interrupted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::{ActivityFeed, TradeEvent};
use crate::config::{constants, AppConfig};
use crate::core::bootstrap::{run_bootstrap, BootstrapContext, BootstrapReport, BootstrapState, SyncGate};
use crate::core::channels::{FreshTrade, MonitorNotice, SnapshotFault};
use crate::core::classifier::{window_start, Classifier, FilterFlags, Verdict};
use crate::core::clock::SharedClock;
use crate::core::logging::ShortAddress;
use crate::core::registry::{AccountRecord, AccountRegistry};
use crate::core::snapshot::{summarize_positions, SnapshotUpdater};
use crate::error::Result;
use crate::ledger::{LedgerEntry, LedgerError, LedgerStore};

/// Scheduler tunables, usually derived from `AppConfig`
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub fetch_interval: Duration,
    pub stale_window_hours: u64,
    pub batch_size: usize,
    pub bootstrap_lookback_minutes: u64,
    pub filters: FilterFlags,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            fetch_interval: Duration::from_secs(1),
            stale_window_hours: 24,
            batch_size: 10,
            bootstrap_lookback_minutes: 1440,
            filters: FilterFlags::default(),
        }
    }
}

impl MonitorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            fetch_interval: Duration::from_secs(config.monitor.fetch_interval_secs),
            stale_window_hours: config.monitor.stale_window_hours,
            batch_size: config.monitor.batch_size,
            bootstrap_lookback_minutes: config.monitor.bootstrap_lookback_minutes,
            filters: FilterFlags::from(&config.filters),
        }
    }
}

/// Outbound channels the scheduler writes to
#[derive(Debug, Clone)]
pub struct SchedulerChannels {
    pub notice_tx: mpsc::Sender<MonitorNotice>,
    pub fresh_tx: mpsc::Sender<FreshTrade>,
    pub fault_tx: mpsc::Sender<SnapshotFault>,
}

/// What happened to one account's events during a cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountReport {
    pub account: String,
    pub fetched: usize,
    pub too_old: usize,
    pub filtered: usize,
    pub fast_fresh: usize,
    /// Fresh trades the consumer had no room for
    pub fresh_dropped: usize,
    pub fast_stale: usize,
    pub duplicates: usize,
    pub inserted: usize,
    /// Detected but not written (ledger unavailable or write failed)
    pub unpersisted: usize,
}

impl AccountReport {
    fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountFailure {
    pub account: String,
    pub error: String,
}

/// Result of one full pass over every account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub accounts: Vec<AccountReport>,
    pub failures: Vec<AccountFailure>,
}

impl CycleReport {
    pub fn inserted(&self) -> usize {
        self.accounts.iter().map(|a| a.inserted).sum()
    }

    pub fn fast_fresh(&self) -> usize {
        self.accounts.iter().map(|a| a.fast_fresh).sum()
    }

    pub fn fresh_dropped(&self) -> usize {
        self.accounts.iter().map(|a| a.fresh_dropped).sum()
    }

    pub fn unpersisted(&self) -> usize {
        self.accounts.iter().map(|a| a.unpersisted).sum()
    }

    pub fn account(&self, address: &str) -> Option<&AccountReport> {
        self.accounts.iter().find(|a| a.account == address)
    }

    pub fn failed(&self, address: &str) -> bool {
        self.failures.iter().any(|f| f.account == address)
    }
}

pub struct PollScheduler {
    registry: AccountRegistry,
    feed: Arc<dyn ActivityFeed>,
    ledger: Arc<dyn LedgerStore>,
    clock: SharedClock,
    classifier: Classifier,
    settings: MonitorSettings,
    gate: SyncGate,
    snapshots: SnapshotUpdater,
    notice_tx: mpsc::Sender<MonitorNotice>,
    fresh_tx: mpsc::Sender<FreshTrade>,
}

impl PollScheduler {
    pub fn new(
        registry: AccountRegistry,
        feed: Arc<dyn ActivityFeed>,
        ledger: Arc<dyn LedgerStore>,
        clock: SharedClock,
        settings: MonitorSettings,
        channels: SchedulerChannels,
    ) -> Self {
        let classifier = Classifier::new(settings.filters, settings.stale_window_hours);
        let snapshots = SnapshotUpdater::new(feed.clone(), ledger.clone(), channels.fault_tx);

        Self {
            registry,
            feed,
            ledger,
            clock,
            classifier,
            settings,
            gate: SyncGate::new(),
            snapshots,
            notice_tx: channels.notice_tx,
            fresh_tx: channels.fresh_tx,
        }
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    pub fn bootstrap_state(&self) -> BootstrapState {
        self.gate.state()
    }

    /// Receiver the execution consumer awaits before claiming entries
    pub fn sync_state(&self) -> watch::Receiver<BootstrapState> {
        self.gate.subscribe()
    }

    /// Bootstrap never looks back less than the live stale window: anything
    /// polling would accept must already be in the ledger as historical.
    pub fn bootstrap_lookback_minutes(&self) -> u64 {
        self.settings
            .bootstrap_lookback_minutes
            .max(self.settings.stale_window_hours.saturating_mul(60))
    }

    pub async fn bootstrap(&self) -> BootstrapReport {
        run_bootstrap(
            &self.gate,
            BootstrapContext {
                registry: &self.registry,
                feed: self.feed.as_ref(),
                ledger: self.ledger.as_ref(),
                clock: self.clock.as_ref(),
                lookback_minutes: self.bootstrap_lookback_minutes(),
            },
        )
        .await
    }

    /// Wait for in-flight position refreshes
    pub async fn drain_snapshots(&self) {
        self.snapshots.drain().await;
    }

    /// Poll until `cancel` fires. Bootstraps first if that has not happened yet.
    /// Returns the number of completed cycles.
    pub async fn run(&self, cancel: CancellationToken) -> u64 {
        if !self.gate.is_ready() {
            self.bootstrap().await;
            tokio::select! {
                _ = cancel.cancelled() => return 0,
                _ = self.gate.wait_ready() => {}
            }
        }

        info!(
            accounts = self.registry.len(),
            interval_secs = self.settings.fetch_interval.as_secs_f64(),
            batch_size = self.settings.batch_size,
            "Poll scheduler started"
        );

        let mut cycles = 0u64;
        loop {
            if cancel.is_cancelled() {
                break;
            }

            if !self.ledger.is_available() && self.ledger.ping().await {
                info!("[LEDGER] Reconnected, resuming persistence");
            }

            let started = Instant::now();
            let report = self.run_cycle().await;
            cycles += 1;
            debug!(
                cycle = cycles,
                inserted = report.inserted(),
                fresh = report.fast_fresh(),
                fresh_dropped = report.fresh_dropped(),
                unpersisted = report.unpersisted(),
                failures = report.failures.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Cycle complete"
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.fetch_interval) => {}
            }
        }

        info!(cycles, "Poll scheduler stopped");
        cycles
    }

    /// One pass over every account, in concurrent batches
    pub async fn run_cycle(&self) -> CycleReport {
        let now = self.clock.now_secs();
        let mut report = CycleReport::default();

        for batch in self.registry.all().chunks(self.settings.batch_size.max(1)) {
            let results = join_all(batch.iter().map(|account| self.process_account(account, now))).await;

            for (account, result) in batch.iter().zip(results) {
                match result {
                    Ok(account_report) => report.accounts.push(account_report),
                    Err(e) => {
                        warn!(
                            account = %ShortAddress(&account.address),
                            error = %e,
                            "Error fetching data"
                        );
                        report.failures.push(AccountFailure {
                            account: account.address.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        report
    }

    /// Fetch, classify and persist one account's events, then refresh its positions
    pub async fn process_account(&self, account: &AccountRecord, now: i64) -> Result<AccountReport> {
        let since = window_start(now, self.settings.stale_window_hours);
        let events = self.feed.fetch_trades(&account.address, since).await?;

        let mut report = AccountReport::new(&account.address);
        report.fetched = events.len();

        for event in events {
            match self.classifier.classify(account, &event, now) {
                Verdict::TooOld => report.too_old += 1,
                Verdict::Filtered(_) => report.filtered += 1,
                Verdict::FastCycleStale { .. } => report.fast_stale += 1,
                Verdict::FastCycleFresh { age_secs } => {
                    report.fast_fresh += 1;
                    info!(
                        account = %ShortAddress(&account.address),
                        tx = %event.transaction_hash,
                        age_secs,
                        "[FAST] Fresh fast-cycle trade"
                    );
                    let fresh = FreshTrade {
                        account: account.address.clone(),
                        event,
                        age_secs,
                    };
                    // Never wait on the consumer: a full channel would stall every account
                    match self.fresh_tx.try_send(fresh) {
                        Ok(()) => {}
                        Err(TrySendError::Full(fresh)) => {
                            report.fresh_dropped += 1;
                            warn!(
                                account = %ShortAddress(&account.address),
                                tx = %fresh.event.transaction_hash,
                                "[FAST] Fresh trade channel full, trade dropped"
                            );
                        }
                        Err(TrySendError::Closed(_)) => {
                            report.fresh_dropped += 1;
                            warn!("[FAST] Fresh trade consumer gone, trade dropped");
                        }
                    }
                }
                Verdict::Candidate => self.persist(account, event, now, &mut report).await,
            }
        }

        self.snapshots.spawn_refresh(account);
        Ok(report)
    }

    /// Ledger steps for a standard-account candidate. Never fails the account:
    /// ledger trouble degrades to an unpersisted notice.
    async fn persist(
        &self,
        account: &AccountRecord,
        event: TradeEvent,
        now: i64,
        report: &mut AccountReport,
    ) {
        let hash = event.transaction_hash.clone();

        if !self.ledger.is_available() {
            report.unpersisted += 1;
            self.notify(&account.address, &hash, false);
            return;
        }

        let partition = account.events_partition();
        let outcome = match self.ledger.find_one_by_hash(&partition, &hash).await {
            Ok(Some(_)) => Err(LedgerError::Duplicate(hash.clone())),
            Ok(None) => {
                let latency = event.age_secs(now);
                let entry = LedgerEntry::pending(&account.address, event);
                self.ledger.insert_one(&partition, &entry).await.map(|()| latency)
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(latency_secs) => {
                report.inserted += 1;
                info!(
                    account = %ShortAddress(&account.address),
                    name = %account.label(),
                    tx = %hash,
                    latency_secs,
                    "New trade detected"
                );
                self.notify(&account.address, &hash, true);
            }
            Err(LedgerError::Duplicate(_)) => report.duplicates += 1,
            Err(e) => {
                warn!(
                    account = %ShortAddress(&account.address),
                    tx = %hash,
                    error = %e,
                    "[LEDGER] Write failed, trade not persisted"
                );
                report.unpersisted += 1;
                self.notify(&account.address, &hash, false);
            }
        }
    }

    fn notify(&self, account: &str, hash: &str, persisted: bool) {
        let notice = MonitorNotice::Detected {
            account: account.to_string(),
            transaction_hash: hash.to_string(),
            persisted,
        };
        if let Err(e) = self.notice_tx.try_send(notice) {
            debug!(error = %e, "Notice dropped");
        }
    }

    /// Startup report: ledger entry counts and position summaries per account
    pub async fn log_ledger_overview(&self) {
        if !self.ledger.is_available() {
            warn!("[LEDGER] Unavailable, skipping startup overview");
            return;
        }

        info!(
            backend = self.ledger.backend_name(),
            feed = self.feed.feed_name(),
            accounts = self.registry.len(),
            "=== Monitored accounts ==="
        );
        let top_n = constants::overview_top_positions();

        for account in self.registry.all() {
            let entries = match self.ledger.count_entries(&account.events_partition()).await {
                Ok(n) => n,
                Err(e) => {
                    warn!(account = %ShortAddress(&account.address), error = %e, "Failed to count ledger entries");
                    continue;
                }
            };
            let positions = self
                .ledger
                .list_positions(&account.positions_partition())
                .await
                .unwrap_or_default();
            let summary = summarize_positions(&positions, top_n);
            let category = if account.category.is_fast_cycle() {
                "fast_cycle"
            } else {
                "standard"
            };

            info!(
                account = %ShortAddress(&account.address),
                name = %account.label(),
                category,
                entries,
                positions = summary.count,
                total_value = %format!("{:.2}", summary.total_value),
                overall_pnl_pct = %format!("{:.1}", summary.overall_pnl_pct),
                "Account overview"
            );
            for position in &summary.top {
                info!(
                    account = %ShortAddress(&account.address),
                    title = %position.title,
                    outcome = %position.outcome,
                    pnl_pct = %format!("{:.1}", position.percent_pnl),
                    "  top position"
                );
            }
        }
    }
}
