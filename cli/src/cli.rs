//! # CLI Interface
//!
//! Defines the command-line argument structure for `cfund` using `clap`
//! derive. Connection settings are global flags so they can follow any
//! subcommand; each also reads a `CFUND_*` environment variable.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use cfund_protocol::Address;

/// Default config file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "cfund.toml";

/// Community fund client.
///
/// Deposit into the pooled fund, borrow against your deposit, repay in
/// installments, and (as the owner) manage members. Transactions are signed
/// by the wallet endpoint at `--rpc-url`.
#[derive(Parser, Debug)]
#[command(
    name = "cfund",
    about = "Community fund client",
    version,
    propagate_version = true
)]
pub struct CfundCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Connection and output options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to the client configuration file (TOML).
    ///
    /// When omitted, `cfund.toml` in the working directory is used if it
    /// exists, otherwise built-in defaults.
    #[arg(long, short = 'c', global = true, env = "CFUND_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON-RPC URL of the wallet endpoint.
    #[arg(long, global = true, env = "CFUND_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Address of the fund contract.
    #[arg(long, global = true, env = "CFUND_FUND_ADDRESS")]
    pub fund_address: Option<Address>,

    /// Address of the stablecoin. Read from the fund when not configured.
    #[arg(long, global = true, env = "CFUND_TOKEN_ADDRESS")]
    pub token_address: Option<Address>,

    /// Account to act as, instead of the wallet's first account.
    #[arg(long, global = true, env = "CFUND_ACCOUNT")]
    pub account: Option<Address>,

    /// Chain id the wallet endpoint is expected to be on.
    #[arg(long, global = true, env = "CFUND_CHAIN_ID")]
    pub chain_id: Option<u64>,

    /// Approve the fund automatically when a deposit or repayment needs
    /// more allowance.
    #[arg(long, global = true, env = "CFUND_AUTO_APPROVE")]
    pub auto_approve: bool,

    /// Skip the `eth_estimateGas` dry run before sending.
    #[arg(long, global = true)]
    pub no_preflight: bool,

    /// Print results as JSON on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    /// Log format: `pretty` or `json`.
    #[arg(long, global = true, env = "CFUND_LOG_FORMAT")]
    pub log_format: Option<String>,
}

/// Top-level subcommands for the `cfund` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the fund, your wallet and your membership.
    Status,
    /// List every member of the fund.
    Members,
    /// Allow the fund to pull tokens from your wallet.
    Approve(AmountArgs),
    /// Deposit tokens into the fund.
    Deposit(AmountArgs),
    /// Borrow from the fund against your deposit.
    Borrow(AmountArgs),
    /// Pay an installment towards your loan.
    Repay(AmountArgs),
    /// Register a new member (owner only).
    AddMember(AddMemberArgs),
    /// Withdraw from the fund to the owner (owner only).
    EmergencyWithdraw(AmountArgs),
    /// Follow fund events and refresh the view as they arrive.
    Watch(WatchArgs),
    /// Write a default configuration file.
    InitConfig(InitConfigArgs),
    /// Print version information and exit.
    Version,
}

/// A token amount in whole units, e.g. `12.5`.
#[derive(Args, Debug)]
pub struct AmountArgs {
    /// Amount in token units (decimals allowed).
    pub amount: String,
}

/// Arguments for the `add-member` subcommand.
#[derive(Args, Debug)]
pub struct AddMemberArgs {
    /// Address of the new member.
    pub address: Address,
    /// Display name stored on chain.
    pub name: String,
}

/// Arguments for the `watch` subcommand.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Follow every fund event, not just your own deposits, loans and
    /// installments.
    #[arg(long)]
    pub all: bool,

    /// Replay events from this many recent blocks before following.
    #[arg(long)]
    pub lookback: Option<u64>,
}

/// Arguments for the `init-config` subcommand.
#[derive(Args, Debug)]
pub struct InitConfigArgs {
    /// Where to write the file.
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    pub path: PathBuf,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}
