//! HTTP client for the public data API (activity + positions)
//!
//! No authentication is required. Responses are parsed leniently: a body
//! that is valid JSON but not an array is treated as "no data", and array
//! elements that fail to deserialize are skipped individually.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::adapters::errors::{FeedError, FeedResult};
use crate::adapters::traits::ActivityFeed;
use crate::adapters::types::{PositionSnapshot, TradeEvent, TRADE_KIND};

/// Public data API base URL
pub const DEFAULT_DATA_API_BASE: &str = "https://data-api.polymarket.com";

pub const ACTIVITY_ENDPOINT: &str = "/activity";
pub const POSITIONS_ENDPOINT: &str = "/positions";

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Configuration for [`DataApiClient`]
#[derive(Debug, Clone)]
pub struct DataApiConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for DataApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_DATA_API_BASE.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

/// reqwest-backed [`ActivityFeed`]
pub struct DataApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl DataApiClient {
    pub fn new(config: DataApiConfig) -> FeedResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_array<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> FeedResult<Vec<T>> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self.http.get(&url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "<no body>".to_string());
            return Err(FeedError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| FeedError::InvalidResponse(format!("{}: {}", endpoint, e)))?;

        Ok(parse_array(value, endpoint))
    }
}

/// Deserialize each element of a JSON array, skipping the ones that do not fit `T`
fn parse_array<T: DeserializeOwned>(value: serde_json::Value, endpoint: &str) -> Vec<T> {
    let serde_json::Value::Array(items) = value else {
        debug!(endpoint, "Non-array response treated as empty");
        return Vec::new();
    };

    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();

    if parsed.len() < total {
        debug!(
            endpoint,
            skipped = total - parsed.len(),
            "Skipped malformed elements in response"
        );
    }
    parsed
}

#[async_trait]
impl ActivityFeed for DataApiClient {
    async fn fetch_trades(&self, account: &str, since: i64) -> FeedResult<Vec<TradeEvent>> {
        self.get_array(
            ACTIVITY_ENDPOINT,
            &[
                ("user", account.to_string()),
                ("type", TRADE_KIND.to_string()),
                ("start", since.to_string()),
            ],
        )
        .await
    }

    async fn fetch_positions(&self, account: &str) -> FeedResult<Vec<PositionSnapshot>> {
        self.get_array(POSITIONS_ENDPOINT, &[("user", account.to_string())]).await
    }

    fn feed_name(&self) -> &'static str {
        "data-api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const ACCOUNT: &str = "0x6a72f61820b26b1fe4d956e17b6dc2a1ea3033ee";

    fn client_for(server: &mockito::ServerGuard) -> DataApiClient {
        DataApiClient::new(DataApiConfig {
            base_url: server.url(),
            request_timeout_ms: 2_000,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_trades_sends_cursor_and_parses() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/activity")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("user".into(), ACCOUNT.into()),
                Matcher::UrlEncoded("type".into(), "TRADE".into()),
                Matcher::UrlEncoded("start".into(), "1760000000".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"transactionHash": "0x1", "timestamp": 1760000100, "type": "TRADE"},
                    {"transactionHash": "0x2", "timestamp": 1760000200, "type": "TRADE"}
                ]"#,
            )
            .create_async()
            .await;

        let trades = client_for(&server).fetch_trades(ACCOUNT, 1760000000).await.unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].transaction_hash, "0x1");
        assert_eq!(trades[1].timestamp, 1760000200);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_array_response_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/activity")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"error": "user not found"}"#)
            .create_async()
            .await;

        let trades = client_for(&server).fetch_trades(ACCOUNT, 0).await.unwrap();
        assert!(trades.is_empty());
    }

    #[tokio::test]
    async fn test_empty_body_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/positions")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let positions = client_for(&server).fetch_positions(ACCOUNT).await.unwrap();
        assert!(positions.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_elements_are_skipped() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/positions")
            .match_query(Matcher::UrlEncoded("user".into(), ACCOUNT.into()))
            .with_status(200)
            .with_body(r#"[{"asset": "1", "conditionId": "0xc", "size": 2.0}, "garbage", {"asset": "2", "size": "lots"}]"#)
            .create_async()
            .await;

        let positions = client_for(&server).fetch_positions(ACCOUNT).await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].asset, "1");
    }

    #[tokio::test]
    async fn test_server_error_maps_to_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/activity")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("upstream down")
            .create_async()
            .await;

        let err = client_for(&server).fetch_trades(ACCOUNT, 0).await.unwrap_err();
        match err {
            FeedError::Status { status, body, .. } => {
                assert_eq!(status, 503);
                assert_eq!(body, "upstream down");
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/activity")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let err = client_for(&server).fetch_trades(ACCOUNT, 0).await.unwrap_err();
        assert!(matches!(err, FeedError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let client = DataApiClient::new(DataApiConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            request_timeout_ms: 1_000,
        })
        .unwrap();

        let err = client.fetch_trades(ACCOUNT, 0).await.unwrap_err();
        assert!(err.is_transport());
    }
}
