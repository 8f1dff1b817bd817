//! Supabase (PostgREST) ledger
//!
//! Two tables hold every partition, keyed by an `account` column:
//!
//! - `trade_events`: unique `(account, transactionHash)`
//! - `position_snapshots`: unique `(account, asset, conditionId)`
//!
//! Transport failures flip the availability flag; `ping` flips it back.
//! While unavailable every operation short-circuits with
//! `LedgerError::Unavailable`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::adapters::PositionSnapshot;
use crate::config::SupabaseConfig;
use crate::ledger::errors::{expect_kind, LedgerError, LedgerResult};
use crate::ledger::traits::LedgerStore;
use crate::ledger::types::{DeliveryPatch, EntryFilter, LedgerEntry, Partition, PartitionKind};

pub const EVENTS_TABLE: &str = "trade_events";
pub const POSITIONS_TABLE: &str = "position_snapshots";

const EVENTS_CONFLICT_KEY: &str = "account,transactionHash";
const POSITIONS_CONFLICT_KEY: &str = "account,asset,conditionId";

/// Row shape for `position_snapshots`
#[derive(Serialize)]
struct PositionRow<'a> {
    account: &'a str,
    #[serde(flatten)]
    snapshot: &'a PositionSnapshot,
}

pub struct SupabaseLedger {
    /// `{project_url}/rest/v1`
    rest_url: String,
    client: reqwest::Client,
    available: AtomicBool,
}

impl SupabaseLedger {
    /// Build the client with auth headers. Starts out marked available;
    /// use `connect_with_retry` to probe first.
    pub fn new(config: &SupabaseConfig) -> LedgerResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&config.anon_key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", config.anon_key))?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            rest_url: format!("{}/rest/v1", config.url.trim_end_matches('/')),
            client,
            available: AtomicBool::new(true),
        })
    }

    /// Probe up to `attempts` times with exponential backoff (2s, 4s, ...).
    ///
    /// Never fails on an unreachable backend: the ledger is returned marked
    /// unavailable and the scheduler keeps probing before each cycle.
    pub async fn connect_with_retry(config: &SupabaseConfig, attempts: u32) -> LedgerResult<Self> {
        let ledger = Self::new(config)?;
        let attempts = attempts.max(1);

        for attempt in 1..=attempts {
            if ledger.ping().await {
                info!(attempt, url = %config.url, "[LEDGER] Connected to Supabase");
                return Ok(ledger);
            }
            if attempt < attempts {
                let backoff = Duration::from_secs(2u64.pow(attempt));
                warn!(
                    attempt,
                    max_attempts = attempts,
                    backoff_secs = backoff.as_secs(),
                    "[LEDGER] Connection failed, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
        }

        error!(
            attempts,
            "[LEDGER] Could not reach Supabase, continuing without persistence"
        );
        Ok(ledger)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn ensure_available(&self) -> LedgerResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(LedgerError::Unavailable)
        }
    }

    /// Send a request; transport errors mark the backend unavailable
    async fn send(&self, request: RequestBuilder) -> LedgerResult<Response> {
        match request.send().await {
            Ok(response) => Ok(response),
            Err(e) => {
                if self.available.swap(false, Ordering::SeqCst) {
                    warn!(error = %e, "[LEDGER] Supabase unreachable, marking unavailable");
                }
                Err(LedgerError::NetworkError(e))
            }
        }
    }

    /// Map non-success statuses to `DatabaseError`
    async fn check(response: Response, op: &str) -> LedgerResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            error!(op, "[LEDGER] Invalid Supabase credentials");
            return Err(LedgerError::DatabaseError(
                "Invalid Supabase credentials".to_string(),
            ));
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        error!(op, status = %status, response_body = %body, "[LEDGER] Supabase request failed");
        Err(LedgerError::DatabaseError(format!(
            "Supabase error {}: {}",
            status, body
        )))
    }

    async fn count_rows(response: Response) -> LedgerResult<usize> {
        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidData(e.to_string()))?;
        Ok(rows.len())
    }

    fn filter_query(partition: &Partition, filter: EntryFilter) -> Vec<(&'static str, String)> {
        let mut query = vec![("account", format!("eq.{}", partition.account))];
        if let Some(delivered) = filter.delivered {
            query.push(("delivered", format!("eq.{}", delivered)));
        }
        query
    }
}

fn header_value(value: &str) -> LedgerResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| LedgerError::InvalidData(format!("invalid header value: {}", e)))
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next().and_then(|total| total.parse().ok())
}

#[async_trait]
impl LedgerStore for SupabaseLedger {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn ping(&self) -> bool {
        let request = self
            .client
            .get(self.table_url(EVENTS_TABLE))
            .query(&[("select", "id"), ("limit", "1")]);

        let reachable = match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "[LEDGER] Ping failed");
                false
            }
        };

        let was = self.available.swap(reachable, Ordering::SeqCst);
        if reachable && !was {
            info!("[LEDGER] Supabase reachable again");
        }
        reachable
    }

    async fn find_one_by_hash(
        &self,
        partition: &Partition,
        hash: &str,
    ) -> LedgerResult<Option<LedgerEntry>> {
        expect_kind(partition.kind, PartitionKind::Events)?;
        self.ensure_available()?;

        let request = self.client.get(self.table_url(EVENTS_TABLE)).query(&[
            ("account", format!("eq.{}", partition.account)),
            ("transactionHash", format!("eq.{}", hash)),
            ("limit", "1".to_string()),
        ]);
        let response = Self::check(self.send(request).await?, "find_one_by_hash").await?;
        let mut rows: Vec<LedgerEntry> = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidData(e.to_string()))?;
        Ok(rows.pop())
    }

    async fn find_many_by_hash(
        &self,
        partition: &Partition,
        hashes: &[String],
    ) -> LedgerResult<Vec<LedgerEntry>> {
        expect_kind(partition.kind, PartitionKind::Events)?;
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_available()?;

        let request = self.client.get(self.table_url(EVENTS_TABLE)).query(&[
            ("account", format!("eq.{}", partition.account)),
            ("transactionHash", format!("in.({})", hashes.join(","))),
        ]);
        let response = Self::check(self.send(request).await?, "find_many_by_hash").await?;
        response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidData(e.to_string()))
    }

    async fn insert_one(&self, partition: &Partition, entry: &LedgerEntry) -> LedgerResult<()> {
        expect_kind(partition.kind, PartitionKind::Events)?;
        self.ensure_available()?;

        let request = self
            .client
            .post(self.table_url(EVENTS_TABLE))
            .header("Prefer", "return=minimal")
            .json(entry);
        let response = self.send(request).await?;

        if response.status() == StatusCode::CONFLICT {
            return Err(LedgerError::Duplicate(entry.transaction_hash().to_string()));
        }
        Self::check(response, "insert_one").await?;
        Ok(())
    }

    async fn insert_many(&self, partition: &Partition, entries: &[LedgerEntry]) -> LedgerResult<usize> {
        expect_kind(partition.kind, PartitionKind::Events)?;
        if entries.is_empty() {
            return Ok(0);
        }
        self.ensure_available()?;

        let request = self
            .client
            .post(self.table_url(EVENTS_TABLE))
            .query(&[("on_conflict", EVENTS_CONFLICT_KEY)])
            .header("Prefer", "resolution=ignore-duplicates,return=representation")
            .json(entries);
        let response = Self::check(self.send(request).await?, "insert_many").await?;
        Self::count_rows(response).await
    }

    async fn update_many_where(
        &self,
        partition: &Partition,
        filter: EntryFilter,
        patch: DeliveryPatch,
    ) -> LedgerResult<u64> {
        expect_kind(partition.kind, PartitionKind::Events)?;
        self.ensure_available()?;

        let request = self
            .client
            .patch(self.table_url(EVENTS_TABLE))
            .query(&Self::filter_query(partition, filter))
            .header("Prefer", "return=representation")
            .json(&patch);
        let response = Self::check(self.send(request).await?, "update_many_where").await?;
        Ok(Self::count_rows(response).await? as u64)
    }

    async fn delete_many_where(&self, partition: &Partition, filter: EntryFilter) -> LedgerResult<u64> {
        expect_kind(partition.kind, PartitionKind::Events)?;
        self.ensure_available()?;

        let request = self
            .client
            .delete(self.table_url(EVENTS_TABLE))
            .query(&Self::filter_query(partition, filter))
            .header("Prefer", "return=representation");
        let response = Self::check(self.send(request).await?, "delete_many_where").await?;
        Ok(Self::count_rows(response).await? as u64)
    }

    async fn upsert_position(&self, partition: &Partition, snapshot: &PositionSnapshot) -> LedgerResult<()> {
        expect_kind(partition.kind, PartitionKind::Positions)?;
        self.ensure_available()?;

        let row = PositionRow {
            account: &partition.account,
            snapshot,
        };
        let request = self
            .client
            .post(self.table_url(POSITIONS_TABLE))
            .query(&[("on_conflict", POSITIONS_CONFLICT_KEY)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row);
        Self::check(self.send(request).await?, "upsert_position").await?;
        Ok(())
    }

    async fn count_entries(&self, partition: &Partition) -> LedgerResult<u64> {
        expect_kind(partition.kind, PartitionKind::Events)?;
        self.ensure_available()?;

        let request = self
            .client
            .head(self.table_url(EVENTS_TABLE))
            .query(&[
                ("account", format!("eq.{}", partition.account)),
                ("select", "id".to_string()),
            ])
            .header("Prefer", "count=exact");
        let response = Self::check(self.send(request).await?, "count_entries").await?;

        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| LedgerError::InvalidData("missing Content-Range total".to_string()))
    }

    async fn list_positions(&self, partition: &Partition) -> LedgerResult<Vec<PositionSnapshot>> {
        expect_kind(partition.kind, PartitionKind::Positions)?;
        self.ensure_available()?;

        let request = self
            .client
            .get(self.table_url(POSITIONS_TABLE))
            .query(&[("account", format!("eq.{}", partition.account))]);
        let response = Self::check(self.send(request).await?, "list_positions").await?;
        response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidData(e.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "supabase"
    }
}
