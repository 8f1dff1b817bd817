//! Ledger store trait definition
//!
//! Key/document semantics over per-account partitions. Every write is either
//! a keyed upsert or a conditional insert, so concurrent writers on disjoint
//! partitions never need extra locking.

use async_trait::async_trait;

use crate::adapters::PositionSnapshot;
use crate::ledger::errors::LedgerResult;
use crate::ledger::types::{DeliveryPatch, EntryFilter, LedgerEntry, Partition};

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Last known reachability. Cheap; never performs I/O.
    fn is_available(&self) -> bool;

    /// Probe the backend and refresh the availability flag
    async fn ping(&self) -> bool;

    async fn find_one_by_hash(
        &self,
        partition: &Partition,
        hash: &str,
    ) -> LedgerResult<Option<LedgerEntry>>;

    /// Batched existence check: returns the entries whose hash is in `hashes`
    async fn find_many_by_hash(
        &self,
        partition: &Partition,
        hashes: &[String],
    ) -> LedgerResult<Vec<LedgerEntry>>;

    /// Insert a single entry. Fails with `LedgerError::Duplicate` if the hash exists.
    async fn insert_one(&self, partition: &Partition, entry: &LedgerEntry) -> LedgerResult<()>;

    /// Unordered bulk insert; duplicates are skipped. Returns the number inserted.
    async fn insert_many(&self, partition: &Partition, entries: &[LedgerEntry]) -> LedgerResult<usize>;

    /// Apply `patch` to every entry matching `filter`. Returns the number updated.
    async fn update_many_where(
        &self,
        partition: &Partition,
        filter: EntryFilter,
        patch: DeliveryPatch,
    ) -> LedgerResult<u64>;

    /// Delete every entry matching `filter`. Returns the number deleted.
    async fn delete_many_where(&self, partition: &Partition, filter: EntryFilter) -> LedgerResult<u64>;

    /// Upsert one position keyed by (asset, condition_id)
    async fn upsert_position(&self, partition: &Partition, snapshot: &PositionSnapshot) -> LedgerResult<()>;

    async fn count_entries(&self, partition: &Partition) -> LedgerResult<u64>;

    async fn list_positions(&self, partition: &Partition) -> LedgerResult<Vec<PositionSnapshot>>;

    fn backend_name(&self) -> &'static str;
}
