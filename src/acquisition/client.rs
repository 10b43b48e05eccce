//! Wallet-history API client

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::AcquisitionConfig;
use crate::error::{Error, Result};

/// One transaction from a wallet's history
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletTransaction {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub from_address: String,
    /// RFC 3339 timestamp
    #[serde(default)]
    pub block_timestamp: String,
    #[serde(default)]
    pub native_transfers: Vec<NativeTransfer>,
}

/// A native-token transfer inside a transaction
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NativeTransfer {
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub to_address: String,
    /// Amount in whole tokens, as the API formats it
    #[serde(default)]
    pub value_formatted: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    result: Vec<WalletTransaction>,
}

/// Source of wallet transaction histories
#[async_trait]
pub trait HistoryClient: Send + Sync {
    /// Transactions for `address` on `chain`, most recent first
    async fn wallet_history(&self, address: &str, chain: &str) -> Result<Vec<WalletTransaction>>;
}

/// Moralis wallet-history client
pub struct MoralisClient {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl MoralisClient {
    pub fn new(config: &AcquisitionConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(Error::Config(
                "acquisition.api_key is not set (SYBIL__ACQUISITION__API_KEY)".to_string(),
            ));
        }

        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl HistoryClient for MoralisClient {
    async fn wallet_history(&self, address: &str, chain: &str) -> Result<Vec<WalletTransaction>> {
        let url = format!("{}/wallets/{}/history", self.base_url, address);

        debug!(wallet = address, chain, "Fetching wallet history");

        let response = self
            .client
            .get(&url)
            .query(&[("chain", chain), ("order", "DESC")])
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::ApiTimeout(self.timeout.as_millis() as u64)
                } else {
                    Error::Api(format!("History request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let history: HistoryResponse = response
            .json()
            .await
            .map_err(|e| Error::Deserialization(format!("Failed to parse history: {}", e)))?;

        Ok(history.result)
    }
}

/// Rate limits and server errors are transient; other failures are not
fn classify_status(status: StatusCode, body: String) -> Error {
    if status == StatusCode::TOO_MANY_REQUESTS {
        Error::RateLimited(body)
    } else if status.is_server_error() {
        Error::Api(format!("History API error {}: {}", status, body))
    } else {
        Error::ApiRejected {
            status: status.as_u16(),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_history_payload() {
        let payload = r#"{
            "page_size": 100,
            "cursor": null,
            "result": [
                {
                    "hash": "0xabc",
                    "from_address": "0x1111111111111111111111111111111111111111",
                    "to_address": "0x6774bcbd5cecef1336b5300fb5186a12ddd8b367",
                    "block_timestamp": "2024-02-03T04:05:06.000Z",
                    "category": "send",
                    "native_transfers": [
                        {
                            "from_address": "0x1111111111111111111111111111111111111111",
                            "to_address": "0x6774bcbd5cecef1336b5300fb5186a12ddd8b367",
                            "value": "1000000000000000",
                            "value_formatted": "0.001",
                            "direction": "send"
                        }
                    ]
                },
                { "hash": "0xdef", "block_timestamp": "2024-02-01T00:00:00.000Z" }
            ]
        }"#;

        let history: HistoryResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(history.result.len(), 2);
        let tx = &history.result[0];
        assert_eq!(tx.hash, "0xabc");
        assert_eq!(tx.native_transfers[0].value_formatted.as_deref(), Some("0.001"));
        assert!(history.result[1].native_transfers.is_empty());
        assert!(history.result[1].from_address.is_empty());
    }

    #[test]
    fn test_empty_result() {
        let history: HistoryResponse = serde_json::from_str("{}").unwrap();
        assert!(history.result.is_empty());
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_retryable());
        assert!(classify_status(StatusCode::BAD_GATEWAY, String::new()).is_retryable());
        assert!(!classify_status(StatusCode::UNAUTHORIZED, String::new()).is_retryable());
    }

    #[test]
    fn test_client_requires_api_key() {
        assert!(matches!(
            MoralisClient::new(&AcquisitionConfig::default()),
            Err(Error::Config(_))
        ));

        let config = AcquisitionConfig {
            api_key: "key".to_string(),
            ..Default::default()
        };
        assert!(MoralisClient::new(&config).is_ok());
    }
}
