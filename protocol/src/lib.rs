// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Community Fund Client Protocol Library
//!
//! Everything the community fund client needs to talk to an EVM chain,
//! and nothing it doesn't. The fund's business rules (loan limits, fees,
//! solvency, membership) live in an external contract; this crate only
//! moves bytes to and from it correctly.
//!
//! ## Architecture
//!
//! - **types**: `Address` and `TxHash`, with EIP-55 checksums.
//! - **units**: Decimal string to and from `U256` for token amounts.
//! - **abi**: The slice of the Solidity ABI the fund and its stablecoin use.
//! - **rpc**: JSON-RPC 2.0 transport seam and the `eth_*` client on top.
//! - **config**: Protocol constants and the TOML client configuration.
//! - **error**: The error enums surfaced by the modules above.
//!
//! ## Design Philosophy
//!
//! 1. Amounts are `U256` in the token's smallest unit. Never floats.
//! 2. Addresses compare by bytes. String case is a display concern.
//! 3. The wallet endpoint signs; this crate never holds key material.
//! 4. If it touches money, it has tests. Plural.

pub mod abi;
pub mod config;
pub mod error;
pub mod rpc;
pub mod types;
pub mod units;

pub use error::{ClientError, ConfigError};
pub use primitive_types::U256;
pub use types::{Address, TxHash};
