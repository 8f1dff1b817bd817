//! Monitored account registry
//!
//! Built once from configuration; read-only afterwards.

use std::collections::HashMap;

use crate::config::{AccountConfig, CategoryKind, DEFAULT_STALENESS_THRESHOLD_SECS};
use crate::ledger::Partition;

/// Per-account handling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountCategory {
    Standard,
    /// Events older than the threshold are stale and dropped; fresh ones are
    /// streamed to the consumer and never persisted
    FastCycle { staleness_threshold_secs: u64 },
}

impl AccountCategory {
    pub fn is_fast_cycle(&self) -> bool {
        matches!(self, AccountCategory::FastCycle { .. })
    }
}

impl From<&AccountConfig> for AccountCategory {
    fn from(config: &AccountConfig) -> Self {
        match config.category {
            CategoryKind::Standard => AccountCategory::Standard,
            CategoryKind::FastCycle => AccountCategory::FastCycle {
                staleness_threshold_secs: config
                    .staleness_threshold_secs
                    .unwrap_or(DEFAULT_STALENESS_THRESHOLD_SECS),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    /// Lowercase `0x` address
    pub address: String,
    pub display_name: Option<String>,
    pub category: AccountCategory,
}

impl AccountRecord {
    pub fn new(address: &str, display_name: Option<String>, category: AccountCategory) -> Self {
        Self {
            address: address.to_lowercase(),
            display_name,
            category,
        }
    }

    pub fn standard(address: &str) -> Self {
        Self::new(address, None, AccountCategory::Standard)
    }

    pub fn fast_cycle(address: &str, staleness_threshold_secs: u64) -> Self {
        Self::new(
            address,
            None,
            AccountCategory::FastCycle {
                staleness_threshold_secs,
            },
        )
    }

    pub fn events_partition(&self) -> Partition {
        Partition::events(&self.address)
    }

    pub fn positions_partition(&self) -> Partition {
        Partition::positions(&self.address)
    }

    /// Display name if configured, else the address
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.address)
    }
}

impl From<&AccountConfig> for AccountRecord {
    fn from(config: &AccountConfig) -> Self {
        Self::new(&config.address, config.name.clone(), AccountCategory::from(config))
    }
}

/// Ordered, immutable set of monitored accounts
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    accounts: Vec<AccountRecord>,
    index: HashMap<String, usize>,
}

impl AccountRegistry {
    /// Later duplicates of an address are ignored
    pub fn new(records: Vec<AccountRecord>) -> Self {
        let mut accounts = Vec::with_capacity(records.len());
        let mut index = HashMap::new();
        for record in records {
            if index.contains_key(&record.address) {
                continue;
            }
            index.insert(record.address.clone(), accounts.len());
            accounts.push(record);
        }
        Self { accounts, index }
    }

    pub fn from_config(accounts: &[AccountConfig]) -> Self {
        Self::new(accounts.iter().map(AccountRecord::from).collect())
    }

    pub fn get(&self, address: &str) -> Option<&AccountRecord> {
        self.index
            .get(&address.to_lowercase())
            .map(|&i| &self.accounts[i])
    }

    pub fn all(&self) -> &[AccountRecord] {
        &self.accounts
    }

    pub fn standard(&self) -> impl Iterator<Item = &AccountRecord> {
        self.accounts.iter().filter(|a| !a.category.is_fast_cycle())
    }

    pub fn fast_cycle(&self) -> impl Iterator<Item = &AccountRecord> {
        self.accounts.iter().filter(|a| a.category.is_fast_cycle())
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
