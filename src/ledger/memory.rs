//! In-memory ledger
//!
//! Used by the test suite and by dry runs (`LEDGER_BACKEND=memory`).
//! Availability can be toggled to exercise the degraded paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::adapters::PositionSnapshot;
use crate::ledger::errors::{expect_kind, LedgerError, LedgerResult};
use crate::ledger::traits::LedgerStore;
use crate::ledger::types::{DeliveryPatch, EntryFilter, LedgerEntry, Partition, PartitionKind};

/// Entries of one account, in insertion order
type EventPartition = Vec<LedgerEntry>;
/// Positions of one account keyed by (asset, condition_id)
type PositionPartition = HashMap<(String, String), PositionSnapshot>;

pub struct InMemoryLedger {
    events: RwLock<HashMap<String, EventPartition>>,
    positions: RwLock<HashMap<String, PositionPartition>>,
    available: AtomicBool,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
            positions: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate losing or regaining the backend
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Snapshot of every entry in an account's events partition
    pub async fn entries(&self, account: &str) -> Vec<LedgerEntry> {
        self.events
            .read()
            .await
            .get(&account.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Total entries across every partition
    pub async fn total_entries(&self) -> usize {
        self.events.read().await.values().map(Vec::len).sum()
    }

    fn ensure_available(&self) -> LedgerResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(LedgerError::Unavailable)
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn ping(&self) -> bool {
        self.is_available()
    }

    async fn find_one_by_hash(
        &self,
        partition: &Partition,
        hash: &str,
    ) -> LedgerResult<Option<LedgerEntry>> {
        expect_kind(partition.kind, PartitionKind::Events)?;
        self.ensure_available()?;

        Ok(self.events.read().await.get(&partition.account).and_then(|entries| {
            entries
                .iter()
                .find(|e| e.transaction_hash() == hash)
                .cloned()
        }))
    }

    async fn find_many_by_hash(
        &self,
        partition: &Partition,
        hashes: &[String],
    ) -> LedgerResult<Vec<LedgerEntry>> {
        expect_kind(partition.kind, PartitionKind::Events)?;
        self.ensure_available()?;

        let guard = self.events.read().await;
        let Some(entries) = guard.get(&partition.account) else {
            return Ok(Vec::new());
        };
        Ok(entries
            .iter()
            .filter(|e| hashes.iter().any(|h| h == e.transaction_hash()))
            .cloned()
            .collect())
    }

    async fn insert_one(&self, partition: &Partition, entry: &LedgerEntry) -> LedgerResult<()> {
        expect_kind(partition.kind, PartitionKind::Events)?;
        self.ensure_available()?;

        let mut guard = self.events.write().await;
        let entries = guard.entry(partition.account.clone()).or_default();
        if entries
            .iter()
            .any(|e| e.transaction_hash() == entry.transaction_hash())
        {
            return Err(LedgerError::Duplicate(entry.transaction_hash().to_string()));
        }
        entries.push(entry.clone());
        Ok(())
    }

    async fn insert_many(&self, partition: &Partition, entries: &[LedgerEntry]) -> LedgerResult<usize> {
        expect_kind(partition.kind, PartitionKind::Events)?;
        self.ensure_available()?;

        let mut guard = self.events.write().await;
        let existing = guard.entry(partition.account.clone()).or_default();
        let mut inserted = 0;
        for entry in entries {
            if existing
                .iter()
                .any(|e| e.transaction_hash() == entry.transaction_hash())
            {
                continue;
            }
            existing.push(entry.clone());
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn update_many_where(
        &self,
        partition: &Partition,
        filter: EntryFilter,
        patch: DeliveryPatch,
    ) -> LedgerResult<u64> {
        expect_kind(partition.kind, PartitionKind::Events)?;
        self.ensure_available()?;

        let mut guard = self.events.write().await;
        let Some(entries) = guard.get_mut(&partition.account) else {
            return Ok(0);
        };
        let mut updated = 0;
        for entry in entries.iter_mut().filter(|e| filter.matches(e)) {
            patch.apply(entry);
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_many_where(&self, partition: &Partition, filter: EntryFilter) -> LedgerResult<u64> {
        expect_kind(partition.kind, PartitionKind::Events)?;
        self.ensure_available()?;

        let mut guard = self.events.write().await;
        let Some(entries) = guard.get_mut(&partition.account) else {
            return Ok(0);
        };
        let before = entries.len();
        entries.retain(|e| !filter.matches(e));
        Ok((before - entries.len()) as u64)
    }

    async fn upsert_position(&self, partition: &Partition, snapshot: &PositionSnapshot) -> LedgerResult<()> {
        expect_kind(partition.kind, PartitionKind::Positions)?;
        self.ensure_available()?;

        self.positions
            .write()
            .await
            .entry(partition.account.clone())
            .or_default()
            .insert(snapshot.key(), snapshot.clone());
        Ok(())
    }

    async fn count_entries(&self, partition: &Partition) -> LedgerResult<u64> {
        expect_kind(partition.kind, PartitionKind::Events)?;
        self.ensure_available()?;

        Ok(self
            .events
            .read()
            .await
            .get(&partition.account)
            .map_or(0, |e| e.len() as u64))
    }

    async fn list_positions(&self, partition: &Partition) -> LedgerResult<Vec<PositionSnapshot>> {
        expect_kind(partition.kind, PartitionKind::Positions)?;
        self.ensure_available()?;

        Ok(self
            .positions
            .read()
            .await
            .get(&partition.account)
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::TradeEvent;

    const ACCOUNT: &str = "0xa";

    fn entry(hash: &str) -> LedgerEntry {
        LedgerEntry::pending(
            ACCOUNT,
            TradeEvent {
                transaction_hash: hash.to_string(),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_insert_one_rejects_duplicate() {
        let ledger = InMemoryLedger::new();
        let part = Partition::events(ACCOUNT);

        ledger.insert_one(&part, &entry("0x1")).await.unwrap();
        let err = ledger.insert_one(&part, &entry("0x1")).await.unwrap_err();
        assert!(matches!(err, LedgerError::Duplicate(h) if h == "0x1"));
        assert_eq!(ledger.count_entries(&part).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_many_skips_existing() {
        let ledger = InMemoryLedger::new();
        let part = Partition::events(ACCOUNT);
        ledger.insert_one(&part, &entry("0x1")).await.unwrap();

        let inserted = ledger
            .insert_many(&part, &[entry("0x1"), entry("0x2"), entry("0x3")])
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let found = ledger
            .find_many_by_hash(&part, &["0x2".to_string(), "0x9".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].transaction_hash(), "0x2");
    }

    #[tokio::test]
    async fn test_update_and_delete_by_filter() {
        let ledger = InMemoryLedger::new();
        let part = Partition::events(ACCOUNT);
        ledger.insert_one(&part, &entry("0x1")).await.unwrap();
        ledger.insert_one(&part, &entry("0x2")).await.unwrap();

        let updated = ledger
            .update_many_where(&part, EntryFilter::undelivered(), DeliveryPatch::historical())
            .await
            .unwrap();
        assert_eq!(updated, 2);
        assert!(ledger.entries(ACCOUNT).await.iter().all(|e| e.delivered));

        ledger.insert_one(&part, &entry("0x3")).await.unwrap();
        let deleted = ledger
            .delete_many_where(&part, EntryFilter::undelivered())
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(ledger.total_entries().await, 2);
    }

    #[tokio::test]
    async fn test_position_upsert_overwrites() {
        let ledger = InMemoryLedger::new();
        let part = Partition::positions(ACCOUNT);
        let mut pos = PositionSnapshot {
            asset: "1".into(),
            condition_id: "0xc".into(),
            size: 5.0,
            ..Default::default()
        };
        ledger.upsert_position(&part, &pos).await.unwrap();
        pos.size = 7.0;
        ledger.upsert_position(&part, &pos).await.unwrap();

        let positions = ledger.list_positions(&part).await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].size, 7.0);
    }

    #[tokio::test]
    async fn test_default_ledger_is_available() {
        let ledger = InMemoryLedger::default();
        assert!(ledger.is_available());
        ledger
            .insert_one(&Partition::events(ACCOUNT), &entry("0x1"))
            .await
            .unwrap();
        assert_eq!(ledger.total_entries().await, 1);
    }

    #[tokio::test]
    async fn test_unavailable_rejects_operations() {
        let ledger = InMemoryLedger::new();
        ledger.set_available(false);
        assert!(!ledger.ping().await);

        let err = ledger
            .insert_one(&Partition::events(ACCOUNT), &entry("0x1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unavailable));
    }

    #[tokio::test]
    async fn test_wrong_partition_kind() {
        let ledger = InMemoryLedger::new();
        let err = ledger
            .insert_one(&Partition::positions(ACCOUNT), &entry("0x1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::WrongPartition { .. }));
    }
}
