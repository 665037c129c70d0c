//! Error types for the client protocol layer.
//!
//! [`ClientError`] covers everything between "we built a request" and "we
//! have a decoded answer": transport, JSON-RPC, ABI, and transaction
//! lifecycle failures. [`ConfigError`] covers loading the TOML config.

use std::path::PathBuf;

use thiserror::Error;

use crate::abi::AbiError;
use crate::types::TxHash;
use crate::units::UnitsError;

/// Errors that can occur while talking to the chain.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP request itself failed (connect, TLS, timeout, body read).
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success HTTP status.
    #[error("unexpected http status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The endpoint returned a JSON-RPC error object.
    #[error(
        "json-rpc error {code}: {message}{}",
        .reason.as_ref().map(|r| format!(" (reverted: {r})")).unwrap_or_default()
    )]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message from the node or wallet.
        message: String,
        /// Raw `data` field, if present (often the revert payload).
        data: Option<String>,
        /// Revert reason decoded from `data`, if it was an ABI revert payload.
        reason: Option<String>,
    },

    /// The response was well-formed JSON but not what the method promises.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Return data could not be ABI-decoded.
    #[error("abi decoding failed: {0}")]
    Abi(#[from] AbiError),

    /// An amount could not be converted.
    #[error(transparent)]
    Units(#[from] UnitsError),

    /// The wallet endpoint exposed no accounts.
    #[error("wallet endpoint returned no accounts")]
    NoAccounts,

    /// Connected to a different chain than configured.
    #[error("connected to chain {actual}, expected {expected}")]
    WrongChain {
        /// Chain id from configuration.
        expected: u64,
        /// Chain id reported by the endpoint.
        actual: u64,
    },

    /// The transaction was mined but reverted (`status = 0`).
    #[error("transaction {tx_hash} reverted in block {block_number}")]
    Reverted {
        /// Hash of the reverted transaction.
        tx_hash: TxHash,
        /// Block that included it.
        block_number: u64,
    },

    /// No receipt (or not enough confirmations) before the deadline.
    #[error("transaction {tx_hash} not confirmed after {waited_ms}ms")]
    ConfirmationTimeout {
        /// Hash of the pending transaction.
        tx_hash: TxHash,
        /// How long we waited.
        waited_ms: u64,
    },
}

impl ClientError {
    /// The decoded revert reason, if this error carries one.
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            ClientError::Rpc { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }
}

/// Errors that can occur while loading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the config file failed.
    #[error("config file {path}: {source}")]
    Io {
        /// File that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`crate::config::ClientConfig`].
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be rendered as TOML.
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The values parse but make no sense together.
    #[error("invalid config: {0}")]
    Invalid(String),
}
