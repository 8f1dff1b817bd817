//! Position snapshot refresh
//!
//! After each account's events are processed, its open positions are
//! re-fetched and upserted in a detached task. Refreshes are best effort:
//! failures go to a supervisor over a channel and never reach the poll loop.

use std::cmp::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::adapters::{ActivityFeed, PositionSnapshot};
use crate::core::channels::SnapshotFault;
use crate::core::logging::ShortAddress;
use crate::core::registry::AccountRecord;
use crate::ledger::LedgerStore;

pub struct SnapshotUpdater {
    feed: Arc<dyn ActivityFeed>,
    ledger: Arc<dyn LedgerStore>,
    tracker: TaskTracker,
    fault_tx: mpsc::Sender<SnapshotFault>,
}

impl SnapshotUpdater {
    pub fn new(
        feed: Arc<dyn ActivityFeed>,
        ledger: Arc<dyn LedgerStore>,
        fault_tx: mpsc::Sender<SnapshotFault>,
    ) -> Self {
        Self {
            feed,
            ledger,
            tracker: TaskTracker::new(),
            fault_tx,
        }
    }

    /// Fire-and-forget refresh of one account's positions
    pub fn spawn_refresh(&self, account: &AccountRecord) {
        let feed = self.feed.clone();
        let ledger = self.ledger.clone();
        let fault_tx = self.fault_tx.clone();
        let account = account.clone();

        self.tracker.spawn(async move {
            match refresh_positions(feed.as_ref(), ledger.as_ref(), &account).await {
                Ok(written) => debug!(
                    account = %ShortAddress(&account.address),
                    written,
                    "[POSITIONS] Snapshot refreshed"
                ),
                Err(reason) => {
                    let fault = SnapshotFault {
                        account: account.address.clone(),
                        reason,
                    };
                    // Supervisor gone means we are shutting down
                    let _ = fault_tx.send(fault).await;
                }
            }
        });
    }

    /// Refreshes currently running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every refresh spawned so far. New refreshes may be spawned afterwards.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

/// Fetch and upsert one account's positions. Returns the number written.
pub async fn refresh_positions(
    feed: &dyn ActivityFeed,
    ledger: &dyn LedgerStore,
    account: &AccountRecord,
) -> Result<usize, String> {
    let positions = feed
        .fetch_positions(&account.address)
        .await
        .map_err(|e| format!("fetch failed: {}", e))?;

    if !ledger.is_available() {
        debug!(account = %ShortAddress(&account.address), "[POSITIONS] Ledger unavailable, skipping write");
        return Ok(0);
    }

    let partition = account.positions_partition();
    let mut written = 0;
    let mut first_error = None;
    for position in &positions {
        match ledger.upsert_position(&partition, position).await {
            Ok(()) => written += 1,
            Err(e) => {
                first_error.get_or_insert_with(|| format!("upsert failed for asset {}: {}", position.asset, e));
            }
        }
    }

    match first_error {
        Some(reason) => Err(reason),
        None => Ok(written),
    }
}

/// Log snapshot faults until cancelled. Returns how many faults were seen.
pub async fn snapshot_supervisor_task(
    mut fault_rx: mpsc::Receiver<SnapshotFault>,
    cancel: CancellationToken,
) -> usize {
    info!("Snapshot supervisor started");
    let mut faults = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(faults, "Snapshot supervisor stopped");
                break;
            }
            fault = fault_rx.recv() => {
                match fault {
                    Some(fault) => {
                        faults += 1;
                        warn!(
                            account = %ShortAddress(&fault.account),
                            reason = %fault.reason,
                            "[POSITIONS] Position update failed"
                        );
                    }
                    None => {
                        info!(faults, "Snapshot supervisor channel closed");
                        break;
                    }
                }
            }
        }
    }

    faults
}

// ============================================================================
// Summaries
// ============================================================================

/// Aggregate view of an account's open positions
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSummary {
    pub count: usize,
    pub total_value: f64,
    pub initial_value: f64,
    /// Value-weighted average of `percent_pnl`
    pub overall_pnl_pct: f64,
    /// Best positions by `percent_pnl`, descending
    pub top: Vec<PositionSnapshot>,
}

pub fn summarize_positions(positions: &[PositionSnapshot], top_n: usize) -> PositionSummary {
    let total_value: f64 = positions.iter().map(|p| p.current_value).sum();
    let initial_value: f64 = positions.iter().map(|p| p.initial_value).sum();
    let weighted: f64 = positions.iter().map(|p| p.current_value * p.percent_pnl).sum();
    let overall_pnl_pct = if total_value > 0.0 {
        weighted / total_value
    } else {
        0.0
    };

    let mut top = positions.to_vec();
    top.sort_by(|a, b| {
        b.percent_pnl
            .partial_cmp(&a.percent_pnl)
            .unwrap_or(Ordering::Equal)
    });
    top.truncate(top_n);

    PositionSummary {
        count: positions.len(),
        total_value,
        initial_value,
        overall_pnl_pct,
        top,
    }
}
