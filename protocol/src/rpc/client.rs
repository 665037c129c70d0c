//! Typed `eth_*` client over any [`Transport`].

use std::time::Duration;

use primitive_types::U256;
use serde_json::{json, Value};
use tokio::time::Instant;

use super::transport::Transport;
use super::types::{hexser, CallRequest, Log, LogFilter, TransactionReceipt};
use crate::error::ClientError;
use crate::types::{Address, TxHash};

/// JSON-RPC "method not found".
const METHOD_NOT_FOUND: i64 = -32601;

/// EIP-1193 "unsupported method".
const UNSUPPORTED_METHOD: i64 = 4200;

/// Ethereum JSON-RPC client.
///
/// Cheap to clone when `T` is (e.g. `Arc<HttpTransport>`).
#[derive(Clone)]
pub struct EthClient<T> {
    transport: T,
}

impl<T: Transport> EthClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `eth_chainId`.
    pub async fn chain_id(&self) -> Result<u64, ClientError> {
        let value = self.transport.request("eth_chainId", json!([])).await?;
        quantity_u64(&value)
    }

    /// `eth_blockNumber`.
    pub async fn block_number(&self) -> Result<u64, ClientError> {
        let value = self.transport.request("eth_blockNumber", json!([])).await?;
        quantity_u64(&value)
    }

    /// `eth_accounts`: accounts already exposed to us, no prompt.
    pub async fn accounts(&self) -> Result<Vec<Address>, ClientError> {
        let value = self.transport.request("eth_accounts", json!([])).await?;
        addresses(value)
    }

    /// `eth_requestAccounts`, falling back to `eth_accounts` on endpoints
    /// (plain nodes, dev chains) that only implement the latter.
    pub async fn request_accounts(&self) -> Result<Vec<Address>, ClientError> {
        match self
            .transport
            .request("eth_requestAccounts", json!([]))
            .await
        {
            Ok(value) => addresses(value),
            Err(ClientError::Rpc { code, .. })
                if code == METHOD_NOT_FOUND || code == UNSUPPORTED_METHOD =>
            {
                tracing::debug!("eth_requestAccounts unsupported, falling back to eth_accounts");
                self.accounts().await
            }
            Err(e) => Err(e),
        }
    }

    /// `eth_call` against the latest block.
    pub async fn call(&self, call: &CallRequest) -> Result<Vec<u8>, ClientError> {
        let value = self
            .transport
            .request("eth_call", json!([call.to_json(), "latest"]))
            .await?;
        let s = value
            .as_str()
            .ok_or_else(|| ClientError::InvalidResponse(format!("eth_call returned {value}")))?;
        hexser::decode_bytes(s).map_err(ClientError::InvalidResponse)
    }

    /// `eth_estimateGas`. A revert surfaces as [`ClientError::Rpc`] with its
    /// decoded reason, which is why writes run this first.
    pub async fn estimate_gas(&self, call: &CallRequest) -> Result<U256, ClientError> {
        let value = self
            .transport
            .request("eth_estimateGas", json!([call.to_json()]))
            .await?;
        quantity(&value)
    }

    /// `eth_sendTransaction`: the wallet endpoint signs and broadcasts.
    pub async fn send_transaction(&self, call: &CallRequest) -> Result<TxHash, ClientError> {
        let value = self
            .transport
            .request("eth_sendTransaction", json!([call.to_json()]))
            .await?;
        let hash = value
            .as_str()
            .and_then(|s| s.parse::<TxHash>().ok())
            .ok_or_else(|| {
                ClientError::InvalidResponse(format!("eth_sendTransaction returned {value}"))
            })?;
        tracing::info!(tx_hash = %hash, to = %call.to, "transaction submitted");
        Ok(hash)
    }

    /// `eth_getTransactionReceipt`. `None` while the transaction is pending.
    pub async fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, ClientError> {
        let value = self
            .transport
            .request("eth_getTransactionReceipt", json!([hash.to_hex()]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ClientError::InvalidResponse(format!("receipt: {e}")))
    }

    /// Polls until `hash` is mined with at least `confirmations` blocks
    /// (inclusion block counts as one).
    ///
    /// # Errors
    ///
    /// [`ClientError::Reverted`] if the receipt reports failure,
    /// [`ClientError::ConfirmationTimeout`] if `timeout` elapses first.
    pub async fn wait_for_receipt(
        &self,
        hash: TxHash,
        confirmations: u64,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<TransactionReceipt, ClientError> {
        let started = Instant::now();

        loop {
            if let Some(receipt) = self.transaction_receipt(hash).await? {
                if !receipt.succeeded() {
                    tracing::warn!(tx_hash = %hash, block = receipt.block_number, "transaction reverted");
                    return Err(ClientError::Reverted {
                        tx_hash: hash,
                        block_number: receipt.block_number,
                    });
                }

                let confirmed = if confirmations <= 1 {
                    true
                } else {
                    let head = self.block_number().await?;
                    head.saturating_sub(receipt.block_number) + 1 >= confirmations
                };

                if confirmed {
                    tracing::info!(
                        tx_hash = %hash,
                        block = receipt.block_number,
                        gas_used = %receipt.gas_used,
                        "transaction confirmed"
                    );
                    return Ok(receipt);
                }
            }

            if started.elapsed() >= timeout {
                return Err(ClientError::ConfirmationTimeout {
                    tx_hash: hash,
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    /// `eth_getLogs`.
    pub async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, ClientError> {
        let value = self
            .transport
            .request("eth_getLogs", json!([filter.to_json()]))
            .await?;
        serde_json::from_value(value)
            .map_err(|e| ClientError::InvalidResponse(format!("logs: {e}")))
    }
}

fn quantity(value: &Value) -> Result<U256, ClientError> {
    value
        .as_str()
        .ok_or_else(|| ClientError::InvalidResponse(format!("expected quantity, got {value}")))
        .and_then(|s| hexser::decode_quantity(s).map_err(ClientError::InvalidResponse))
}

fn quantity_u64(value: &Value) -> Result<u64, ClientError> {
    value
        .as_str()
        .ok_or_else(|| ClientError::InvalidResponse(format!("expected quantity, got {value}")))
        .and_then(|s| hexser::decode_quantity_u64(s).map_err(ClientError::InvalidResponse))
}

fn addresses(value: Value) -> Result<Vec<Address>, ClientError> {
    serde_json::from_value(value)
        .map_err(|e| ClientError::InvalidResponse(format!("accounts: {e}")))
}
