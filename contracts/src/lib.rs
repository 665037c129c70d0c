//! # Community Fund Contracts
//!
//! Client-side bindings for the community lending pool and its stablecoin.
//! The contracts themselves live on chain and hold all the accounting; this
//! crate reads their state, validates requests against it, and submits
//! transactions through a wallet endpoint.
//!
//! - **ERC20**: balance, allowance, metadata and `approve` for the pooled
//!   stablecoin.
//! - **Fund**: membership records, pool totals, loan limits, the five write
//!   functions, and event decoding.
//! - **Session**: a connected account plus a consistent [`FundSnapshot`] of
//!   everything the user sees.
//! - **Actions**: read, validate, send, confirm, refresh.
//! - **Watcher**: polls fund events so views can refresh when the pool
//!   changes.
//!
//! ## Design Principles
//!
//! 1. Nothing is sent unless local validation passes.
//! 2. Amounts stay in raw `U256` units until they are displayed.
//! 3. Every confirmed action is followed by a fresh snapshot.

pub mod actions;
pub mod erc20;
pub mod error;
pub mod fund;
pub mod session;
pub mod watcher;

pub use actions::{Action, ActionReport};
pub use error::FundError;
pub use fund::{CommunityFund, FundEvent, FundEventKind, FundLog, Member};
pub use session::{FundSession, FundSnapshot};
pub use watcher::{FundWatcher, WatchScope};
