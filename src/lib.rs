//! Copy-trade monitor
//!
//! Polls the public activity feed of a set of accounts and records each new
//! trade exactly once in a per-account ledger:
//! - Activity feed adapter (data API)
//! - Ledger backends (Supabase PostgREST, in-memory)
//! - Classification, bootstrap reconciliation and the poll scheduler

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;
pub mod ledger;

pub use error::AppError;
