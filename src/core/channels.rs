//! Inter-task channels
//!
//! - Notices: scheduler -> observers, one per detected trade
//! - Fresh trades: scheduler -> execution consumer (fast-cycle accounts only)
//! - Snapshot faults: detached refresh tasks -> supervisor
//! - Shutdown: `CancellationToken` shared by every long-running task

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::adapters::TradeEvent;

/// Default channel capacity for bounded channels
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Observability events emitted by the scheduler
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorNotice {
    /// A new trade passed classification. `persisted` is false when the
    /// ledger was unavailable and the write was skipped.
    Detected {
        account: String,
        transaction_hash: String,
        persisted: bool,
    },
}

/// A fresh trade from a fast-cycle account, handed straight to the consumer
#[derive(Debug, Clone, PartialEq)]
pub struct FreshTrade {
    pub account: String,
    pub event: TradeEvent,
    /// Seconds between the trade and its detection
    pub age_secs: i64,
}

/// A failed position refresh
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotFault {
    pub account: String,
    pub reason: String,
}

/// Bundle of all inter-task communication channels
#[derive(Debug)]
pub struct ChannelBundle {
    pub notice_tx: mpsc::Sender<MonitorNotice>,
    pub notice_rx: mpsc::Receiver<MonitorNotice>,

    pub fresh_tx: mpsc::Sender<FreshTrade>,
    pub fresh_rx: mpsc::Receiver<FreshTrade>,

    pub fault_tx: mpsc::Sender<SnapshotFault>,
    pub fault_rx: mpsc::Receiver<SnapshotFault>,

    /// Cancelled once by main on SIGINT
    pub shutdown: CancellationToken,
}

impl ChannelBundle {
    pub fn new(capacity: usize) -> Self {
        Self::with_capacities(capacity, capacity, capacity)
    }

    pub fn with_capacities(notice: usize, fresh: usize, fault: usize) -> Self {
        let (notice_tx, notice_rx) = mpsc::channel(notice.max(1));
        let (fresh_tx, fresh_rx) = mpsc::channel(fresh.max(1));
        let (fault_tx, fault_rx) = mpsc::channel(fault.max(1));

        Self {
            notice_tx,
            notice_rx,
            fresh_tx,
            fresh_rx,
            fault_tx,
            fault_rx,
            shutdown: CancellationToken::new(),
        }
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
