//! JSON-RPC client for the ledger node.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

/// Default timeout for a single RPC request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between polling attempts when waiting for readiness.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// HTTP JSON-RPC client bound to one endpoint.
#[derive(Debug)]
pub struct RpcClient {
    http: reqwest::Client,
    url: Url,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Create a client for `url` with the given per-request timeout.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, anyhow::Error> {
        let url = Url::parse(url).with_context(|| format!("Invalid RPC URL: {}", url))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Make a JSON-RPC call and deserialize the result.
    ///
    /// An `error` member in the response is turned into an error carrying its message.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, anyhow::Error> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(method, id, "Sending RPC request");

        let response = self
            .http
            .post(self.url.clone())
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": id
            }))
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?;

        let result: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        if let Some(error) = result.get("error") {
            anyhow::bail!(
                "RPC error: {}",
                error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown")
            );
        }

        let result_value = result
            .get("result")
            .context("No result in response")?
            .clone();

        serde_json::from_value(result_value)
            .with_context(|| format!("Failed to deserialize {} result", method))
    }

    /// Query the chain id of the node.
    pub async fn chain_id(&self) -> Result<u64, anyhow::Error> {
        let hex: String = self.call("eth_chainId", vec![]).await?;
        parse_hex_u64(&hex)
    }

    /// Wait until the node answers `eth_chainId`, polling every couple of seconds.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<u64, anyhow::Error> {
        let start = std::time::Instant::now();

        loop {
            if start.elapsed() > timeout {
                anyhow::bail!("Timeout waiting for the node at {} to be ready", self.url);
            }

            match self.chain_id().await {
                Ok(chain_id) => return Ok(chain_id),
                Err(e) => {
                    tracing::trace!(error = %e, url = %self.url, "Readiness check failed, retrying...");
                }
            }

            tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
        }
    }
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_hex_u64(hex: &str) -> Result<u64, anyhow::Error> {
    u64::from_str_radix(hex.trim_start_matches("0x"), 16)
        .with_context(|| format!("Invalid hex quantity: {}", hex))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u64() {
        assert_eq!(parse_hex_u64("0x7a69").unwrap(), 31337);
        assert_eq!(parse_hex_u64("0x0").unwrap(), 0);
        assert!(parse_hex_u64("0xzz").is_err());
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(RpcClient::new("not a url", DEFAULT_REQUEST_TIMEOUT).is_err());
        let client = RpcClient::new("http://127.0.0.1:8545", DEFAULT_REQUEST_TIMEOUT).unwrap();
        assert_eq!(client.url().as_str(), "http://127.0.0.1:8545/");
    }
}
