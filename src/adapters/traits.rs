//! Activity feed trait definition
//!
//! The ActivityFeed trait is the seam between the monitor and the
//! upstream data API. The scheduler, bootstrap and snapshot updater only
//! ever talk to `dyn ActivityFeed`, which lets tests substitute scripted
//! feeds.

use async_trait::async_trait;

use crate::adapters::errors::FeedResult;
use crate::adapters::types::{PositionSnapshot, TradeEvent};

/// Read-only access to an account's published activity
#[async_trait]
pub trait ActivityFeed: Send + Sync {
    /// Fetch trade events for `account` published at or after `since` (unix seconds)
    ///
    /// An empty or non-array response yields an empty vector, not an error.
    async fn fetch_trades(&self, account: &str, since: i64) -> FeedResult<Vec<TradeEvent>>;

    /// Fetch the account's current open positions
    async fn fetch_positions(&self, account: &str) -> FeedResult<Vec<PositionSnapshot>>;

    /// Short name used in log lines
    fn feed_name(&self) -> &'static str;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::errors::FeedError;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted feed for unit tests
    #[derive(Default)]
    pub struct MockFeed {
        trades: Mutex<HashMap<String, Vec<TradeEvent>>>,
        positions: Mutex<HashMap<String, Vec<PositionSnapshot>>>,
        failing: Mutex<HashSet<String>>,
        trade_calls: AtomicUsize,
        last_since: Mutex<Option<i64>>,
    }

    impl MockFeed {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_trades(&self, account: &str, trades: Vec<TradeEvent>) {
            self.trades.lock().unwrap().insert(account.to_string(), trades);
        }

        pub fn set_positions(&self, account: &str, positions: Vec<PositionSnapshot>) {
            self.positions.lock().unwrap().insert(account.to_string(), positions);
        }

        pub fn fail_account(&self, account: &str) {
            self.failing.lock().unwrap().insert(account.to_string());
        }

        pub fn trade_calls(&self) -> usize {
            self.trade_calls.load(Ordering::SeqCst)
        }

        pub fn last_since(&self) -> Option<i64> {
            *self.last_since.lock().unwrap()
        }
    }

    #[async_trait]
    impl ActivityFeed for MockFeed {
        async fn fetch_trades(&self, account: &str, since: i64) -> FeedResult<Vec<TradeEvent>> {
            self.trade_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_since.lock().unwrap() = Some(since);
            if self.failing.lock().unwrap().contains(account) {
                return Err(FeedError::InvalidResponse(format!("scripted failure for {}", account)));
            }
            Ok(self.trades.lock().unwrap().get(account).cloned().unwrap_or_default())
        }

        async fn fetch_positions(&self, account: &str) -> FeedResult<Vec<PositionSnapshot>> {
            if self.failing.lock().unwrap().contains(account) {
                return Err(FeedError::InvalidResponse(format!("scripted failure for {}", account)));
            }
            Ok(self.positions.lock().unwrap().get(account).cloned().unwrap_or_default())
        }

        fn feed_name(&self) -> &'static str {
            "mock"
        }
    }

    #[tokio::test]
    async fn test_mock_feed_scripting() {
        let feed = MockFeed::new();
        feed.set_trades("0xa", vec![TradeEvent::default()]);
        feed.fail_account("0xb");

        assert_eq!(feed.fetch_trades("0xa", 10).await.unwrap().len(), 1);
        assert!(feed.fetch_trades("0xb", 10).await.is_err());
        assert!(feed.fetch_trades("0xc", 10).await.unwrap().is_empty());
        assert_eq!(feed.trade_calls(), 3);
        assert_eq!(feed.last_since(), Some(10));
    }
}
