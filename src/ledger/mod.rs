//! Durable trade ledger
//!
//! Per-account partitions of trade events and position snapshots behind the
//! `LedgerStore` trait, with a Supabase (PostgREST) backend for production
//! and an in-memory backend for tests and dry runs.

pub mod errors;
pub mod memory;
pub mod supabase;
pub mod traits;
pub mod types;

pub use errors::{LedgerError, LedgerResult};
pub use memory::InMemoryLedger;
pub use supabase::SupabaseLedger;
pub use traits::LedgerStore;
pub use types::{DeliveryPatch, DeliveryTier, EntryFilter, LedgerEntry, Partition, PartitionKind};
