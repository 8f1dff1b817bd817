//! Upstream activity feed
//!
//! This module provides the read-only interface to the public data API:
//! trade activity and position snapshots per monitored account.

pub mod data_api;
pub mod errors;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use data_api::{DataApiClient, DataApiConfig, DEFAULT_DATA_API_BASE};
pub use errors::{FeedError, FeedResult};
pub use traits::ActivityFeed;
pub use types::{PositionSnapshot, TradeEvent, TRADE_KIND};
