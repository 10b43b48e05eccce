//! Wallet data acquisition
//!
//! Builds the input snapshot: for each wallet, fetch its transaction history
//! from the wallet-history API (with bounded retry), reduce it to the
//! earliest interaction with each tracked contract, and derive the day
//! differences the clustering engine orders by.

use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, info};

use crate::model::{Chain, Record};

pub mod client;
pub mod retry;
pub mod summary;

pub use client::{HistoryClient, MoralisClient, NativeTransfer, WalletTransaction};
pub use retry::{fetch_with_retries, RetryPolicy};
pub use summary::summarize;

lazy_static::lazy_static! {
    /// EVM address: 0x followed by 40 hex digits
    static ref WALLET_ADDRESS: Regex =
        Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("Invalid wallet address pattern");
}

/// Whether `address` looks like an EVM wallet worth querying
pub fn is_wallet_address(address: &str) -> bool {
    WALLET_ADDRESS.is_match(address)
}

/// Configuration for the acquisition stage
#[derive(Debug, Clone, Deserialize)]
pub struct AcquisitionConfig {
    /// Wallet-history API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key (prefer SYBIL__ACQUISITION__API_KEY)
    #[serde(default)]
    pub api_key: String,

    /// Chain whose history is queried
    #[serde(default = "default_chain")]
    pub chain: String,

    /// Total attempts per wallet, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Wallets fetched concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub contracts: ContractAddresses,
}

/// Contract each chain's earliest interaction is measured against
#[derive(Debug, Clone, Deserialize)]
pub struct ContractAddresses {
    #[serde(default = "default_zk_contract")]
    pub zk: String,
    #[serde(default = "default_scroll_contract")]
    pub scroll: String,
    #[serde(default = "default_arb_contract")]
    pub arb: String,
    #[serde(default = "default_zora_contract")]
    pub zora: String,
    #[serde(default = "default_cluster_contract")]
    pub cluster: String,
}

impl ContractAddresses {
    pub fn get(&self, chain: Chain) -> &str {
        match chain {
            Chain::Zk => &self.zk,
            Chain::Scroll => &self.scroll,
            Chain::Arb => &self.arb,
            Chain::Zora => &self.zora,
            Chain::Cluster => &self.cluster,
        }
    }
}

fn default_base_url() -> String {
    "https://deep-index.moralis.io/api/v2.2".to_string()
}

fn default_chain() -> String {
    "eth".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_concurrency() -> usize {
    30
}

fn default_zk_contract() -> String {
    "0xaBEA9132b05A70803a4E85094fD0e1800777fBEF".to_string()
}

fn default_scroll_contract() -> String {
    "0x6774Bcbd5ceCeF1336b5300fb5186a12DDD8b367".to_string()
}

fn default_arb_contract() -> String {
    "0x4Dbd4fc535Ac27206064B68FfCf827b0A60BAB3f".to_string()
}

fn default_zora_contract() -> String {
    "0x1a0ad011913A150f69f6A19DF447A0CfD9551054".to_string()
}

fn default_cluster_contract() -> String {
    "0x00000000000E1A99dDDd5610111884278BDBda1D".to_string()
}

impl Default for ContractAddresses {
    fn default() -> Self {
        Self {
            zk: default_zk_contract(),
            scroll: default_scroll_contract(),
            arb: default_arb_contract(),
            zora: default_zora_contract(),
            cluster: default_cluster_contract(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            chain: default_chain(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            concurrency: default_concurrency(),
            contracts: ContractAddresses::default(),
        }
    }
}

impl AcquisitionConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            anyhow::bail!("acquisition.max_attempts must be at least 1");
        }
        if self.concurrency == 0 {
            anyhow::bail!("acquisition.concurrency must be at least 1");
        }
        for chain in Chain::ALL {
            let contract = self.contracts.get(chain);
            if !is_wallet_address(contract) {
                anyhow::bail!("Invalid {} contract address: {}", chain, contract);
            }
        }
        Ok(())
    }
}

/// Build a snapshot row for every wallet, in input order
///
/// Lookups run `concurrency` at a time. Identifiers that are not EVM
/// addresses are not queried and produce an all-unknown row.
pub async fn enrich_wallets(
    client: &dyn HistoryClient,
    wallets: &[String],
    config: &AcquisitionConfig,
) -> Vec<Record> {
    let started = Instant::now();
    let policy = RetryPolicy::from(config);
    let policy = &policy;
    let chain = config.chain.as_str();
    let contracts = &config.contracts;

    let records: Vec<Record> = stream::iter(wallets.iter())
        .map(move |wallet| async move {
            let wallet = wallet.trim();
            if !is_wallet_address(wallet) {
                debug!(wallet, "Not an EVM address, skipping lookup");
                return Record::unknown(wallet);
            }

            let transactions = fetch_with_retries(client, wallet, chain, policy).await;
            debug!(wallet, transactions = transactions.len(), "History fetched");
            summarize(wallet, &transactions, contracts)
        })
        .buffered(config.concurrency.max(1))
        .collect()
        .await;

    info!(
        wallets = records.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Wallet enrichment complete"
    );
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::model::ChainPair;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Serves one outgoing transfer to the zk contract per wallet, dated by
    /// the wallet's last hex digit; slower for lower digits
    struct StubHistory;

    #[async_trait]
    impl HistoryClient for StubHistory {
        async fn wallet_history(&self, address: &str, _chain: &str) -> Result<Vec<WalletTransaction>> {
            let digit = u64::from_str_radix(&address[address.len() - 1..], 16).unwrap();
            tokio::time::sleep(Duration::from_millis(16 - digit)).await;
            Ok(vec![WalletTransaction {
                hash: format!("0xtx{digit}"),
                from_address: address.to_uppercase().replace("0X", "0x"),
                block_timestamp: format!("2024-01-{:02}T08:00:00.000Z", digit + 1),
                native_transfers: vec![NativeTransfer {
                    from_address: address.to_string(),
                    to_address: default_zk_contract().to_lowercase(),
                    value_formatted: Some("0.01".to_string()),
                }],
            }])
        }
    }

    #[test]
    fn test_wallet_address_pattern() {
        assert!(is_wallet_address("0x00000000000E1A99dDDd5610111884278BDBda1D"));
        assert!(!is_wallet_address("00000000000E1A99dDDd5610111884278BDBda1D"));
        assert!(!is_wallet_address("0x1234"));
        assert!(!is_wallet_address("Wallet Address"));
    }

    #[test]
    fn test_default_contracts_valid() {
        assert!(AcquisitionConfig::default().validate().is_ok());

        let mut config = AcquisitionConfig::default();
        config.contracts.arb = "not-a-contract".to_string();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_enrich_preserves_input_order() {
        let wallets: Vec<String> = (1..=9)
            .map(|i| format!("0x{:040x}", i))
            .chain(std::iter::once("bogus".to_string()))
            .collect();
        let config = AcquisitionConfig {
            concurrency: 4,
            ..Default::default()
        };

        let records = enrich_wallets(&StubHistory, &wallets, &config).await;
        assert_eq!(records.len(), 10);
        for (record, wallet) in records.iter().zip(&wallets) {
            assert_eq!(&record.address, wallet);
        }

        let third = &records[2];
        assert_eq!(third.chain(Chain::Zk).value.get(), Some(0.01));
        assert_eq!(third.activation.get().unwrap().to_string(), "2024-01-04");
        assert!(third
            .pair_diff(ChainPair::new(Chain::Zk, Chain::Scroll))
            .is_unknown());

        let bogus = &records[9];
        assert!(bogus.activation.is_unknown());
        assert!(bogus.chain(Chain::Zk).hash.is_unknown());
    }
}
