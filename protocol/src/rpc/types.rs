//! JSON-RPC 2.0 envelopes and the Ethereum objects that travel inside them.
//!
//! Ethereum JSON-RPC encodes integers as `0x`-prefixed hex "quantities"
//! (no leading zeros, `"0x0"` for zero) and byte strings as `0x`-prefixed
//! hex "data". The [`hexser`] helpers convert both.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::abi::decode_revert;
use crate::error::ClientError;
use crate::types::{Address, TxHash};

/// A 32-byte log topic.
pub type Topic = [u8; 32];

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version. Always "2.0".
    pub jsonrpc: String,
    /// Request identifier. Echoed back in the response.
    pub id: u64,
    /// The `eth_*` method to invoke.
    pub method: String,
    /// Positional parameters.
    pub params: Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response.
///
/// `result` is kept as a raw [`Value`] because `null` is a meaningful answer
/// for some methods (a receipt that does not exist yet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default)]
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    /// Unwraps the response into its result or a [`ClientError::Rpc`].
    pub fn into_result(self) -> Result<Value, ClientError> {
        match self.error {
            Some(err) => Err(err.into_client_error()),
            None => Ok(self.result),
        }
    }
}

/// The `error` member of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    /// Converts to [`ClientError::Rpc`], decoding the revert reason when the
    /// `data` member carries an ABI revert payload.
    ///
    /// Nodes disagree on where the payload goes: geth puts the hex string
    /// directly in `data`, others nest it as `data.data`.
    pub fn into_client_error(self) -> ClientError {
        let data = match &self.data {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Object(map)) => map
                .get("data")
                .and_then(Value::as_str)
                .map(str::to_string),
            Some(other) => Some(other.to_string()),
            None => None,
        };

        let reason = data
            .as_deref()
            .and_then(|d| hexser::decode_bytes(d).ok())
            .and_then(|bytes| decode_revert(&bytes));

        ClientError::Rpc {
            code: self.code,
            message: self.message,
            data,
            reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Call / Transaction Request
// ---------------------------------------------------------------------------

/// A message call, used for `eth_call`, `eth_estimateGas` and
/// `eth_sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    /// Sender. Required for writes; optional (but honored) for reads.
    pub from: Option<Address>,
    /// Target contract.
    pub to: Address,
    /// ABI-encoded calldata.
    pub data: Vec<u8>,
    /// Gas limit. Left to the wallet when `None`.
    pub gas: Option<U256>,
}

impl CallRequest {
    pub fn new(to: Address, data: Vec<u8>) -> Self {
        Self {
            from: None,
            to,
            data,
            gas: None,
        }
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn gas(mut self, gas: U256) -> Self {
        self.gas = Some(gas);
        self
    }

    /// The JSON object form expected by the `eth_*` methods.
    pub fn to_json(&self) -> Value {
        let mut obj = json!({
            "to": self.to.to_hex(),
            "data": hexser::encode_bytes(&self.data),
        });
        if let Some(from) = self.from {
            obj["from"] = Value::String(from.to_hex());
        }
        if let Some(gas) = self.gas {
            obj["gas"] = Value::String(hexser::encode_quantity(gas));
        }
        obj
    }
}

// ---------------------------------------------------------------------------
// Receipts & Logs
// ---------------------------------------------------------------------------

/// The subset of a transaction receipt the client acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    #[serde(with = "hexser::quantity_u64")]
    pub block_number: u64,
    /// `0x1` success, `0x0` reverted. Absent on pre-Byzantium chains, where
    /// it is treated as success.
    #[serde(default, with = "hexser::opt_quantity_u64")]
    pub status: Option<u64>,
    #[serde(with = "hexser::quantity_u256")]
    pub gas_used: U256,
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl TransactionReceipt {
    /// `true` unless the receipt explicitly reports a revert.
    pub fn succeeded(&self) -> bool {
        self.status != Some(0)
    }
}

/// An event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    #[serde(with = "hexser::topics")]
    pub topics: Vec<Topic>,
    #[serde(with = "hexser::bytes")]
    pub data: Vec<u8>,
    #[serde(default, with = "hexser::opt_quantity_u64")]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub transaction_hash: Option<TxHash>,
    #[serde(default, with = "hexser::opt_quantity_u64")]
    pub log_index: Option<u64>,
    #[serde(default)]
    pub removed: bool,
}

/// Parameters for `eth_getLogs`.
///
/// `topics[i] = None` matches anything at position `i`; `Some(vec)` matches
/// any of the listed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    pub topics: Vec<Option<Vec<Topic>>>,
    pub from_block: u64,
    pub to_block: u64,
}

impl LogFilter {
    pub fn to_json(&self) -> Value {
        let topics: Vec<Value> = self
            .topics
            .iter()
            .map(|slot| match slot {
                None => Value::Null,
                Some(options) => Value::Array(
                    options
                        .iter()
                        .map(|t| Value::String(hexser::encode_bytes(t)))
                        .collect(),
                ),
            })
            .collect();

        json!({
            "address": self.address.to_hex(),
            "topics": topics,
            "fromBlock": hexser::encode_quantity(U256::from(self.from_block)),
            "toBlock": hexser::encode_quantity(U256::from(self.to_block)),
        })
    }
}

// ---------------------------------------------------------------------------
// Hex (de)serialization helpers
// ---------------------------------------------------------------------------

/// Quantity and data hex conversions, plus `#[serde(with)]` modules.
pub mod hexser {
    use primitive_types::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Topic;

    fn strip(s: &str) -> Result<&str, String> {
        s.strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| format!("missing 0x prefix: {s:?}"))
    }

    pub fn decode_bytes(s: &str) -> Result<Vec<u8>, String> {
        hex::decode(strip(s)?).map_err(|e| format!("invalid hex data {s:?}: {e}"))
    }

    pub fn encode_bytes(bytes: &[u8]) -> String {
        format!("0x{}", hex::encode(bytes))
    }

    pub fn decode_quantity(s: &str) -> Result<U256, String> {
        let digits = strip(s)?;
        if digits.is_empty() {
            return Err(format!("empty quantity: {s:?}"));
        }
        U256::from_str_radix(digits, 16).map_err(|_| format!("invalid quantity {s:?}"))
    }

    pub fn decode_quantity_u64(s: &str) -> Result<u64, String> {
        let value = decode_quantity(s)?;
        if value > U256::from(u64::MAX) {
            return Err(format!("quantity {s:?} exceeds u64"));
        }
        Ok(value.low_u64())
    }

    pub fn encode_quantity(value: U256) -> String {
        format!("0x{:x}", value)
    }

    pub fn decode_topic(s: &str) -> Result<Topic, String> {
        let bytes = decode_bytes(s)?;
        <Topic>::try_from(bytes.as_slice()).map_err(|_| format!("topic must be 32 bytes: {s:?}"))
    }

    pub mod quantity_u64 {
        use super::*;

        pub fn serialize<S: Serializer>(v: &u64, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&encode_quantity(U256::from(*v)))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
            let s = String::deserialize(d)?;
            decode_quantity_u64(&s).map_err(serde::de::Error::custom)
        }
    }

    pub mod opt_quantity_u64 {
        use super::*;

        pub fn serialize<S: Serializer>(v: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
            match v {
                Some(v) => s.serialize_str(&encode_quantity(U256::from(*v))),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|s| decode_quantity_u64(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }

    pub mod quantity_u256 {
        use super::*;

        pub fn serialize<S: Serializer>(v: &U256, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&encode_quantity(*v))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
            let s = String::deserialize(d)?;
            decode_quantity(&s).map_err(serde::de::Error::custom)
        }
    }

    pub mod bytes {
        use super::*;

        pub fn serialize<S: Serializer>(v: &[u8], s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&encode_bytes(v))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
            let s = String::deserialize(d)?;
            decode_bytes(&s).map_err(serde::de::Error::custom)
        }
    }

    pub mod topics {
        use super::*;
        use serde::ser::SerializeSeq;

        pub fn serialize<S: Serializer>(v: &[Topic], s: S) -> Result<S::Ok, S::Error> {
            let mut seq = s.serialize_seq(Some(v.len()))?;
            for topic in v {
                seq.serialize_element(&encode_bytes(topic))?;
            }
            seq.end()
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Topic>, D::Error> {
            Vec::<String>::deserialize(d)?
                .iter()
                .map(|s| decode_topic(s).map_err(serde::de::Error::custom))
                .collect()
        }
    }
}
