//! Minimal Ethereum JSON-RPC client.
//!
//! Accounts are managed by the node, so transactions go through
//! `eth_sendTransaction` and the node signs them. Only the handful of
//! methods the oracle daemon needs are wrapped.

use std::fmt;
use std::str::FromStr;

use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::Duration;

pub mod abi;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("node returned error {code}: {message}")]
    Node { code: i64, message: String },
    #[error("malformed rpc response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
#[error("invalid address: {0}")]
pub struct AddressParseError(String);

/// A 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(text.trim_start_matches("0x"))
            .map_err(|_| AddressParseError(text.to_string()))?;
        let bytes: [u8; 20] = raw
            .try_into()
            .map_err(|_| AddressParseError(text.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A state-changing call, signed by the node on behalf of `from`.
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub value: Option<u128>,
    pub gas: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    pub block_number: u64,
    pub succeeded: bool,
}

/// One entry from an `eth_getLogs` response. Topics are kept as lowercase
/// `0x`-prefixed hex for direct comparison against computed event topics.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub topics: Vec<String>,
    pub data: Vec<u8>,
    pub block_number: u64,
}

#[derive(Clone)]
pub struct EthRpcClient {
    http: Client,
    url: String,
}

impl EthRpcClient {
    pub fn new(url: String) -> Self {
        Self {
            http: Client::new(),
            url,
        }
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let response = self
            .http
            .post(&self.url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": "openinsure-server",
                "method": method,
                "params": params,
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        if let Some(error) = response.get("error") {
            return Err(RpcError::Node {
                code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown node error")
                    .to_string(),
            });
        }

        response
            .get("result")
            .cloned()
            .ok_or_else(|| RpcError::Malformed(format!("{method}: missing result")))
    }

    /// The node-managed signing accounts, in the node's enumeration order.
    pub async fn accounts(&self) -> Result<Vec<Address>, RpcError> {
        let result = self.rpc_call("eth_accounts", json!([])).await?;
        let entries = result
            .as_array()
            .ok_or_else(|| RpcError::Malformed("eth_accounts: result is not an array".into()))?;

        entries
            .iter()
            .map(|entry| {
                entry
                    .as_str()
                    .ok_or_else(|| RpcError::Malformed("eth_accounts: non-string entry".into()))?
                    .parse()
                    .map_err(|error: AddressParseError| RpcError::Malformed(error.to_string()))
            })
            .collect()
    }

    pub async fn call(
        &self,
        from: Option<Address>,
        to: Address,
        data: &[u8],
    ) -> Result<Vec<u8>, RpcError> {
        let mut tx = json!({
            "to": to.to_string(),
            "data": format!("0x{}", hex::encode(data)),
        });
        if let Some(from) = from {
            tx["from"] = json!(from.to_string());
        }

        let result = self.rpc_call("eth_call", json!([tx, "latest"])).await?;
        decode_hex_bytes(&result, "eth_call")
    }

    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String, RpcError> {
        let mut payload = json!({
            "from": tx.from.to_string(),
            "to": tx.to.to_string(),
            "gas": format!("{:#x}", tx.gas),
            "data": format!("0x{}", hex::encode(&tx.data)),
        });
        if let Some(value) = tx.value {
            payload["value"] = json!(format!("{value:#x}"));
        }

        let result = self
            .rpc_call("eth_sendTransaction", json!([payload]))
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RpcError::Malformed("eth_sendTransaction: result is not a string".into()))
    }

    pub async fn transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        let result = self
            .rpc_call("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }

        // Receipts without a status field predate byzantium; treat them as
        // successful.
        let succeeded = result
            .get("status")
            .and_then(Value::as_str)
            .map(|status| status == "0x1")
            .unwrap_or(true);
        let block_number = result
            .get("blockNumber")
            .map(|value| decode_quantity(value, "receipt blockNumber"))
            .transpose()?
            .unwrap_or(0);

        Ok(Some(TransactionReceipt {
            transaction_hash: tx_hash.to_string(),
            block_number,
            succeeded,
        }))
    }

    /// Polls until the node reports a receipt. A transaction the node drops
    /// silently blocks its pass here; no timeout exists anywhere in the
    /// daemon.
    pub async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, RpcError> {
        loop {
            if let Some(receipt) = self.transaction_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let result = self.rpc_call("eth_blockNumber", json!([])).await?;
        decode_quantity(&result, "eth_blockNumber")
    }

    /// All logs emitted by `address` in the inclusive block range.
    pub async fn logs(
        &self,
        address: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogEntry>, RpcError> {
        let filter = json!({
            "address": address.to_string(),
            "fromBlock": format!("{from_block:#x}"),
            "toBlock": format!("{to_block:#x}"),
        });

        let result = self.rpc_call("eth_getLogs", json!([filter])).await?;
        let entries = result
            .as_array()
            .ok_or_else(|| RpcError::Malformed("eth_getLogs: result is not an array".into()))?;

        let mut logs = Vec::with_capacity(entries.len());
        for entry in entries {
            let topics = entry
                .get("topics")
                .and_then(Value::as_array)
                .map(|topics| {
                    topics
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_ascii_lowercase)
                        .collect()
                })
                .unwrap_or_default();
            let data = entry
                .get("data")
                .map(|data| decode_hex_bytes(data, "log data"))
                .transpose()?
                .unwrap_or_default();
            let block_number = entry
                .get("blockNumber")
                .map(|value| decode_quantity(value, "log blockNumber"))
                .transpose()?
                .unwrap_or(0);

            logs.push(LogEntry {
                topics,
                data,
                block_number,
            });
        }
        Ok(logs)
    }
}

fn decode_hex_bytes(value: &Value, context: &str) -> Result<Vec<u8>, RpcError> {
    let text = value
        .as_str()
        .ok_or_else(|| RpcError::Malformed(format!("{context}: result is not a string")))?;
    hex::decode(text.trim_start_matches("0x"))
        .map_err(|error| RpcError::Malformed(format!("{context}: {error}")))
}

fn decode_quantity(value: &Value, context: &str) -> Result<u64, RpcError> {
    let text = value
        .as_str()
        .ok_or_else(|| RpcError::Malformed(format!("{context}: quantity is not a string")))?;
    u64::from_str_radix(text.trim_start_matches("0x"), 16)
        .map_err(|error| RpcError::Malformed(format!("{context}: {error}")))
}
