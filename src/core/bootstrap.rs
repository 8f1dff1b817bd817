//! Startup reconciliation
//!
//! Before live monitoring may hand anything to the execution consumer, the
//! ledger is brought to a state where nothing historical looks new:
//!
//! 1. Recent history of every standard account is recorded as already delivered.
//! 2. Entries left undelivered by a previous run are marked delivered (crash repair).
//! 3. Undelivered entries of fast-cycle accounts are purged.
//!
//! Progress is published through `SyncGate` (`Uninitialized -> Syncing -> Ready`).
//! Transitions only move forward and bootstrap runs at most once per process.

use std::collections::HashSet;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::adapters::{ActivityFeed, TradeEvent};
use crate::core::clock::Clock;
use crate::core::logging::ShortAddress;
use crate::core::registry::{AccountRecord, AccountRegistry};
use crate::error::Result;
use crate::ledger::{DeliveryPatch, EntryFilter, LedgerEntry, LedgerStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootstrapState {
    Uninitialized,
    Syncing,
    Ready,
}

/// Publishes the bootstrap state. Consumers subscribe and wait for `Ready`.
#[derive(Debug)]
pub struct SyncGate {
    tx: watch::Sender<BootstrapState>,
}

impl Default for SyncGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncGate {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(BootstrapState::Uninitialized);
        Self { tx }
    }

    pub fn state(&self) -> BootstrapState {
        *self.tx.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == BootstrapState::Ready
    }

    pub fn subscribe(&self) -> watch::Receiver<BootstrapState> {
        self.tx.subscribe()
    }

    /// Move forward to `next`. Returns false if the gate is already there or past it.
    fn advance(&self, next: BootstrapState) -> bool {
        self.tx.send_if_modified(|state| {
            if next > *state {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    /// Claim the single `Uninitialized -> Syncing` transition
    fn try_begin(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == BootstrapState::Uninitialized {
                *state = BootstrapState::Syncing;
                true
            } else {
                false
            }
        })
    }

    /// Resolve once the gate reaches `Ready`
    pub async fn wait_ready(&self) {
        let mut rx = self.subscribe();
        // The sender lives as long as self, so this cannot fail while awaited
        let _ = rx.wait_for(|s| *s == BootstrapState::Ready).await;
    }
}

/// Counts from one bootstrap run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Historical entries inserted as already delivered
    pub synced: usize,
    /// Previously undelivered entries marked delivered
    pub repaired: u64,
    /// Undelivered fast-cycle entries deleted
    pub purged: u64,
    /// Accounts with at least one failed step
    pub failed_accounts: Vec<String>,
    /// Ledger was unreachable; nothing was reconciled
    pub skipped: bool,
}

impl BootstrapReport {
    fn record_failure(&mut self, account: &str) {
        if !self.failed_accounts.iter().any(|a| a == account) {
            self.failed_accounts.push(account.to_string());
        }
    }
}

/// Collaborators bootstrap needs
pub struct BootstrapContext<'a> {
    pub registry: &'a AccountRegistry,
    pub feed: &'a dyn ActivityFeed,
    pub ledger: &'a dyn LedgerStore,
    pub clock: &'a dyn Clock,
    pub lookback_minutes: u64,
}

/// Run bootstrap once. Later calls return an empty report without side effects.
pub async fn run_bootstrap(gate: &SyncGate, ctx: BootstrapContext<'_>) -> BootstrapReport {
    if !gate.try_begin() {
        return BootstrapReport::default();
    }

    let mut report = BootstrapReport::default();
    info!(
        accounts = ctx.registry.len(),
        lookback_minutes = ctx.lookback_minutes,
        "[SYNC] Bootstrap started"
    );

    let available = ctx.ledger.is_available() || ctx.ledger.ping().await;
    if !available {
        warn!("[SYNC] Ledger unavailable, skipping bootstrap reconciliation");
        report.skipped = true;
        gate.advance(BootstrapState::Ready);
        return report;
    }

    let lookback_secs = i64::try_from(ctx.lookback_minutes)
        .unwrap_or(i64::MAX)
        .saturating_mul(60);
    let since = ctx.clock.now_secs().saturating_sub(lookback_secs);

    for account in ctx.registry.standard() {
        match sync_history(&ctx, account, since).await {
            Ok(inserted) => report.synced += inserted,
            Err(e) => {
                warn!(account = %ShortAddress(&account.address), error = %e, "[SYNC] History sync failed");
                report.record_failure(&account.address);
            }
        }
    }

    for account in ctx.registry.standard() {
        let result = ctx
            .ledger
            .update_many_where(
                &account.events_partition(),
                EntryFilter::undelivered(),
                DeliveryPatch::historical(),
            )
            .await;
        match result {
            Ok(n) => report.repaired += n,
            Err(e) => {
                warn!(account = %ShortAddress(&account.address), error = %e, "[SYNC] Delivery repair failed");
                report.record_failure(&account.address);
            }
        }
    }

    for account in ctx.registry.fast_cycle() {
        let result = ctx
            .ledger
            .delete_many_where(&account.events_partition(), EntryFilter::undelivered())
            .await;
        match result {
            Ok(n) => report.purged += n,
            Err(e) => {
                warn!(account = %ShortAddress(&account.address), error = %e, "[SYNC] Fast-cycle purge failed");
                report.record_failure(&account.address);
            }
        }
    }

    gate.advance(BootstrapState::Ready);
    info!(
        synced = report.synced,
        repaired = report.repaired,
        purged = report.purged,
        failed = report.failed_accounts.len(),
        "[SYNC] Bootstrap complete"
    );
    report
}

/// Record every recent event not yet in the ledger as already delivered
async fn sync_history(
    ctx: &BootstrapContext<'_>,
    account: &AccountRecord,
    since: i64,
) -> Result<usize> {
    let events = ctx.feed.fetch_trades(&account.address, since).await?;

    let mut seen = HashSet::new();
    let recent: Vec<TradeEvent> = events
        .into_iter()
        .filter(|e| e.has_hash() && e.timestamp >= since)
        .filter(|e| seen.insert(e.transaction_hash.clone()))
        .collect();
    if recent.is_empty() {
        return Ok(0);
    }

    let partition = account.events_partition();
    let hashes: Vec<String> = recent.iter().map(|e| e.transaction_hash.clone()).collect();
    let existing: HashSet<String> = ctx
        .ledger
        .find_many_by_hash(&partition, &hashes)
        .await?
        .into_iter()
        .map(|entry| entry.event.transaction_hash)
        .collect();

    let missing: Vec<LedgerEntry> = recent
        .into_iter()
        .filter(|e| !existing.contains(&e.transaction_hash))
        .map(|e| LedgerEntry::historical(&account.address, e))
        .collect();
    if missing.is_empty() {
        return Ok(0);
    }

    let inserted = ctx.ledger.insert_many(&partition, &missing).await?;
    info!(
        account = %ShortAddress(&account.address),
        name = %account.label(),
        inserted,
        "[SYNC] Recorded historical trades"
    );
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::traits::tests::MockFeed;
    use crate::core::clock::FixedClock;
    use crate::ledger::{DeliveryTier, InMemoryLedger, Partition};

    const NOW: i64 = 1_760_000_000;
    const STD: &str = "0x6a72f61820b26b1fe4d956e17b6dc2a1ea3033ee";
    const FAST: &str = "0x7c3db723f1d4d8cb9c550095203b686cb11e5c6b";

    fn event(hash: &str, timestamp: i64) -> TradeEvent {
        TradeEvent {
            transaction_hash: hash.to_string(),
            timestamp,
            kind: "TRADE".to_string(),
            ..Default::default()
        }
    }

    fn registry() -> AccountRegistry {
        AccountRegistry::new(vec![
            AccountRecord::standard(STD),
            AccountRecord::fast_cycle(FAST, 900),
        ])
    }

    #[test]
    fn test_gate_only_moves_forward() {
        let gate = SyncGate::new();
        assert_eq!(gate.state(), BootstrapState::Uninitialized);
        assert!(gate.try_begin());
        assert!(!gate.try_begin());
        assert!(gate.advance(BootstrapState::Ready));
        assert!(!gate.advance(BootstrapState::Syncing));
        assert!(gate.is_ready());
    }

    #[tokio::test]
    async fn test_bootstrap_reconciles_ledger() {
        let feed = MockFeed::new();
        feed.set_trades(
            STD,
            vec![
                event("0xold", NOW - 2 * 86_400),
                event("0xa", NOW - 600),
                event("0xb", NOW - 60),
                event("0xb", NOW - 60),
                event("", NOW - 30),
            ],
        );
        let ledger = InMemoryLedger::new();
        let std_part = Partition::events(STD);
        let fast_part = Partition::events(FAST);
        // Already known, and left undelivered by a previous run
        ledger
            .insert_one(&std_part, &LedgerEntry::pending(STD, event("0xa", NOW - 600)))
            .await
            .unwrap();
        ledger
            .insert_one(&fast_part, &LedgerEntry::pending(FAST, event("0xf", NOW - 10)))
            .await
            .unwrap();

        let gate = SyncGate::new();
        let clock = FixedClock::new(NOW);
        let registry = registry();
        let report = run_bootstrap(
            &gate,
            BootstrapContext {
                registry: &registry,
                feed: &feed,
                ledger: &ledger,
                clock: &clock,
                lookback_minutes: 1440,
            },
        )
        .await;

        assert_eq!(report.synced, 1);
        assert_eq!(report.repaired, 1);
        assert_eq!(report.purged, 1);
        assert!(report.failed_accounts.is_empty());
        assert!(gate.is_ready());

        let entries = ledger.entries(STD).await;
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.delivered));
        assert!(entries
            .iter()
            .all(|e| e.delivered_at_tier == DeliveryTier::Historical));
        assert!(ledger.entries(FAST).await.is_empty());
        assert_eq!(feed.last_since(), Some(NOW - 1440 * 60));
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let feed = MockFeed::new();
        feed.set_trades(STD, vec![event("0xa", NOW - 60)]);
        let ledger = InMemoryLedger::new();
        let gate = SyncGate::new();
        let clock = FixedClock::new(NOW);
        let registry = registry();
        let ctx = || BootstrapContext {
            registry: &registry,
            feed: &feed,
            ledger: &ledger,
            clock: &clock,
            lookback_minutes: 60,
        };

        let first = run_bootstrap(&gate, ctx()).await;
        assert_eq!(first.synced, 1);
        let calls = feed.trade_calls();

        let second = run_bootstrap(&gate, ctx()).await;
        assert_eq!(second, BootstrapReport::default());
        assert_eq!(feed.trade_calls(), calls);
    }

    #[tokio::test]
    async fn test_unavailable_ledger_skips_to_ready() {
        let feed = MockFeed::new();
        feed.set_trades(STD, vec![event("0xa", NOW - 60)]);
        let ledger = InMemoryLedger::new();
        ledger.set_available(false);
        let gate = SyncGate::new();
        let clock = FixedClock::new(NOW);
        let registry = registry();

        let report = run_bootstrap(
            &gate,
            BootstrapContext {
                registry: &registry,
                feed: &feed,
                ledger: &ledger,
                clock: &clock,
                lookback_minutes: 60,
            },
        )
        .await;

        assert!(report.skipped);
        assert!(gate.is_ready());
        assert_eq!(feed.trade_calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_does_not_abort_other_steps() {
        let feed = MockFeed::new();
        feed.fail_account(STD);
        let ledger = InMemoryLedger::new();
        ledger
            .insert_one(
                &Partition::events(STD),
                &LedgerEntry::pending(STD, event("0xa", NOW - 60)),
            )
            .await
            .unwrap();
        let gate = SyncGate::new();
        let clock = FixedClock::new(NOW);
        let registry = registry();

        let report = run_bootstrap(
            &gate,
            BootstrapContext {
                registry: &registry,
                feed: &feed,
                ledger: &ledger,
                clock: &clock,
                lookback_minutes: 60,
            },
        )
        .await;

        assert_eq!(report.failed_accounts, vec![STD.to_string()]);
        assert_eq!(report.repaired, 1);
        assert!(gate.is_ready());
    }

    #[tokio::test]
    async fn test_wait_ready_resolves_after_bootstrap() {
        let gate = std::sync::Arc::new(SyncGate::new());
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_ready().await })
        };

        gate.try_begin();
        gate.advance(BootstrapState::Ready);
        waiter.await.unwrap();
    }
}
