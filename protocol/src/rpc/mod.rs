//! # JSON-RPC Layer
//!
//! ```text
//! types.rs     : envelopes, CallRequest, receipts, logs, hex helpers
//! transport.rs : Transport trait + reqwest-backed HttpTransport
//! client.rs    : EthClient: typed eth_* methods, receipt polling
//! mock.rs      : MockTransport for tests
//! ```
//!
//! The wallet endpoint is any JSON-RPC server that exposes the user's
//! account and signs `eth_sendTransaction` for it: a local dev node, a
//! signer proxy, or a remote wallet bridge.

pub mod client;
pub mod mock;
pub mod transport;
pub mod types;

pub use client::EthClient;
pub use mock::MockTransport;
pub use transport::{HttpTransport, Transport};
pub use types::{CallRequest, Log, LogFilter, RpcErrorObject, RpcRequest, RpcResponse, Topic, TransactionReceipt};
