//! Ledger record types
//!
//! A `LedgerEntry` is the persisted form of a `TradeEvent` plus the two
//! delivery control fields. Entries are partitioned by account; within a
//! partition the transaction hash is unique.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::TradeEvent;

// ============================================================================
// Partitions
// ============================================================================

/// The two logical collections every account owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionKind {
    Events,
    Positions,
}

/// One account's slice of a ledger collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    pub kind: PartitionKind,
    pub account: String,
}

impl Partition {
    pub fn events(account: &str) -> Self {
        Self {
            kind: PartitionKind::Events,
            account: account.to_lowercase(),
        }
    }

    pub fn positions(account: &str) -> Self {
        Self {
            kind: PartitionKind::Positions,
            account: account.to_lowercase(),
        }
    }

    /// Collection-style name, e.g. `user_activities_0xabc...`
    pub fn name(&self) -> String {
        match self.kind {
            PartitionKind::Events => format!("user_activities_{}", self.account),
            PartitionKind::Positions => format!("user_positions_{}", self.account),
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Entries
// ============================================================================

/// When (if ever) an entry was marked delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryTier {
    /// Not yet claimed by the execution consumer
    #[default]
    Pending,
    /// Marked during bootstrap: must never be acted upon
    Historical,
    /// Claimed by the execution consumer during live monitoring
    Live,
}

/// Persisted trade event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    /// Partition key (lowercase account address)
    pub account: String,
    #[serde(flatten)]
    pub event: TradeEvent,
    /// Has this event been handed to (or withheld from) the execution consumer
    pub delivered: bool,
    pub delivered_at_tier: DeliveryTier,
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Entry produced by live monitoring: the execution consumer should act on it
    pub fn pending(account: &str, event: TradeEvent) -> Self {
        Self::build(account, event, false, DeliveryTier::Pending)
    }

    /// Entry produced by bootstrap: already considered delivered
    pub fn historical(account: &str, event: TradeEvent) -> Self {
        Self::build(account, event, true, DeliveryTier::Historical)
    }

    fn build(account: &str, event: TradeEvent, delivered: bool, tier: DeliveryTier) -> Self {
        Self {
            id: Uuid::new_v4(),
            account: account.to_lowercase(),
            event,
            delivered,
            delivered_at_tier: tier,
            recorded_at: Utc::now(),
        }
    }

    pub fn transaction_hash(&self) -> &str {
        &self.event.transaction_hash
    }
}

// ============================================================================
// Predicates and patches
// ============================================================================

/// Predicate for bulk update/delete within one events partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryFilter {
    /// Match on the `delivered` flag; `None` matches every entry
    pub delivered: Option<bool>,
}

impl EntryFilter {
    pub fn undelivered() -> Self {
        Self {
            delivered: Some(false),
        }
    }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.delivered.map_or(true, |d| entry.delivered == d)
    }
}

/// Patch applied by `update_many_where`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPatch {
    pub delivered: bool,
    pub delivered_at_tier: DeliveryTier,
}

impl DeliveryPatch {
    /// Mark as delivered during bootstrap
    pub fn historical() -> Self {
        Self {
            delivered: true,
            delivered_at_tier: DeliveryTier::Historical,
        }
    }

    pub fn apply(&self, entry: &mut LedgerEntry) {
        entry.delivered = self.delivered;
        entry.delivered_at_tier = self.delivered_at_tier;
    }
}
