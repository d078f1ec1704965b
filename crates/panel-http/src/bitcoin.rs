//! JSON-RPC client for the block-chain node.
//!
//! Only used in regtest setups to mine blocks that confirm channel funding
//! and close transactions. The node may well be unavailable; callers treat
//! failures here as non-fatal.

use panel_core::{BitcoinRpcConfig, Error, Result};
use serde_json::{Value, json};

/// Block-chain RPC client with basic authentication.
#[derive(Clone)]
pub struct BitcoinRpc {
    client: reqwest::Client,
    config: BitcoinRpcConfig,
}

impl BitcoinRpc {
    /// Create a client from configuration.
    pub fn new(config: BitcoinRpcConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// URL a given method is posted to; wallet methods use the wallet path.
    fn url_for(&self, method: &str) -> String {
        let host = self.config.host.trim_end_matches('/');
        if method == "getbalance" && !self.config.wallet.is_empty() {
            format!("{host}/wallet/{}", self.config.wallet)
        } else {
            host.to_string()
        }
    }

    /// Send a single JSON-RPC request and return its `result` field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteCallFailed`] if the request fails or the node
    /// returns a non-null `error`.
    pub async fn call(&self, method: &str, params: &[Value]) -> Result<Value> {
        let fail = |message: String| Error::remote("POST", method, message);

        tracing::trace!("→ bitcoin rpc {method}");
        let body = json!({
            "jsonrpc": "1.0",
            "id": "panel",
            "method": method,
            "params": params,
        });

        let resp = self
            .client
            .post(self.url_for(method))
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("bitcoin rpc {method} request failed: {e}");
                fail(e.to_string())
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| fail(e.to_string()))?;
        let val: Value = serde_json::from_str(&text).map_err(|e| {
            fail(format!("{e} (status {}, body: {text})", status.as_u16()))
        })?;

        if let Some(error) = val.get("error").filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| error.to_string(), str::to_string);
            return Err(fail(message));
        }

        val.get("result")
            .cloned()
            .ok_or_else(|| fail(format!("missing result field: {text}")))
    }

    /// Get a new address from the node's wallet.
    pub async fn get_new_address(&self) -> Result<String> {
        let result = self.call("getnewaddress", &[]).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::remote("POST", "getnewaddress", "address is not a string"))
    }

    /// Mine `blocks` blocks to a fresh wallet address and return their hashes.
    pub async fn mine_blocks(&self, blocks: u32) -> Result<Vec<String>> {
        let address = self.get_new_address().await?;
        tracing::debug!("mining {blocks} blocks to {address}");

        let result = self
            .call("generatetoaddress", &[json!(blocks), json!(address)])
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Wallet balance in BTC.
    pub async fn get_balance(&self) -> Result<f64> {
        let result = self.call("getbalance", &[]).await?;
        result
            .as_f64()
            .ok_or_else(|| Error::remote("POST", "getbalance", "balance is not a number"))
    }
}
