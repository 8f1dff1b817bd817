//! Data API payload types
//!
//! `TradeEvent` and `PositionSnapshot` mirror the JSON returned by the
//! activity and positions endpoints. Every field is defaulted so that a
//! partially populated element still parses; the classifier decides what
//! to do with incomplete events.

use serde::{Deserialize, Deserializer, Serialize};

/// Activity type used for trade events
pub const TRADE_KIND: &str = "TRADE";

// =============================================================================
// Trade events
// =============================================================================

/// One observed upstream trade. Never mutated after being fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TradeEvent {
    /// Account that published the trade
    #[serde(default)]
    pub proxy_wallet: String,
    /// Unix seconds; malformed values deserialize to 0
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: i64,
    #[serde(default)]
    pub condition_id: String,
    /// Activity type (always `TRADE` for the events we request)
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Signed token size
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub usdc_size: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub asset: String,
    /// Natural dedup key
    #[serde(default)]
    pub transaction_hash: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub outcome_index: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub event_slug: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pseudonym: String,
}

impl TradeEvent {
    /// Seconds elapsed between the trade and `now` (negative if the upstream clock is ahead)
    pub fn age_secs(&self, now: i64) -> i64 {
        now - self.timestamp
    }

    pub fn has_hash(&self) -> bool {
        !self.transaction_hash.trim().is_empty()
    }
}

/// Accepts integers, floats and numeric strings. Anything else becomes 0,
/// which every staleness rule rejects.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let ts = match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    };
    Ok(ts.max(0))
}

// =============================================================================
// Position snapshots
// =============================================================================

/// Current state of an open position for an account, keyed by (asset, condition_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PositionSnapshot {
    #[serde(default)]
    pub proxy_wallet: String,
    #[serde(default)]
    pub asset: String,
    #[serde(default)]
    pub condition_id: String,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub avg_price: f64,
    #[serde(default)]
    pub initial_value: f64,
    #[serde(default)]
    pub current_value: f64,
    #[serde(default)]
    pub cash_pnl: f64,
    #[serde(default)]
    pub percent_pnl: f64,
    #[serde(default)]
    pub total_bought: f64,
    #[serde(default)]
    pub realized_pnl: f64,
    #[serde(default)]
    pub percent_realized_pnl: f64,
    #[serde(default)]
    pub cur_price: f64,
    #[serde(default)]
    pub redeemable: bool,
    #[serde(default)]
    pub mergeable: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub event_slug: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub outcome_index: i64,
    #[serde(default)]
    pub opposite_outcome: String,
    #[serde(default)]
    pub opposite_asset: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub negative_risk: bool,
}

impl PositionSnapshot {
    /// Upsert key within an account's position partition
    pub fn key(&self) -> (String, String) {
        (self.asset.clone(), self.condition_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_event_parses_data_api_shape() {
        let json = r#"{
            "proxyWallet": "0x6a72f61820b26b1fe4d956e17b6dc2a1ea3033ee",
            "timestamp": 1760700000,
            "conditionId": "0xcond",
            "type": "TRADE",
            "size": 12.5,
            "usdcSize": 6.25,
            "transactionHash": "0xhash",
            "price": 0.5,
            "asset": "1234",
            "side": "BUY",
            "outcomeIndex": 1,
            "title": "Will it rain?",
            "slug": "will-it-rain",
            "eventSlug": "weather",
            "outcome": "Yes"
        }"#;

        let event: TradeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.timestamp, 1760700000);
        assert_eq!(event.kind, TRADE_KIND);
        assert_eq!(event.transaction_hash, "0xhash");
        assert_eq!(event.outcome_index, 1);
        assert_eq!(event.usdc_size, 6.25);
        assert!(event.icon.is_empty());
    }

    #[test]
    fn test_timestamp_as_string_is_accepted() {
        let event: TradeEvent =
            serde_json::from_str(r#"{"timestamp": "1760700000", "transactionHash": "0x1"}"#).unwrap();
        assert_eq!(event.timestamp, 1760700000);
    }

    #[test]
    fn test_malformed_timestamp_becomes_zero() {
        let event: TradeEvent =
            serde_json::from_str(r#"{"timestamp": "yesterday", "transactionHash": "0x1"}"#).unwrap();
        assert_eq!(event.timestamp, 0);

        let event: TradeEvent =
            serde_json::from_str(r#"{"timestamp": null, "transactionHash": "0x1"}"#).unwrap();
        assert_eq!(event.timestamp, 0);

        let event: TradeEvent = serde_json::from_str(r#"{"transactionHash": "0x1"}"#).unwrap();
        assert_eq!(event.timestamp, 0);
    }

    #[test]
    fn test_has_hash() {
        let mut event = TradeEvent::default();
        assert!(!event.has_hash());
        event.transaction_hash = "   ".to_string();
        assert!(!event.has_hash());
        event.transaction_hash = "0xabc".to_string();
        assert!(event.has_hash());
    }

    #[test]
    fn test_position_snapshot_key() {
        let json = r#"{"asset": "42", "conditionId": "0xc", "size": 3.0, "percentPnl": -12.5, "redeemable": true}"#;
        let pos: PositionSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(pos.key(), ("42".to_string(), "0xc".to_string()));
        assert_eq!(pos.percent_pnl, -12.5);
        assert!(pos.redeemable);
        assert!(!pos.mergeable);
    }
}
