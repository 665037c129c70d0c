//! # Client Configuration & Constants
//!
//! Every default the client relies on lives here: the deployed contract
//! addresses, the chain we expect to be on, and the timing knobs for
//! confirmation polling and event watching.
//!
//! [`ClientConfig`] is the on-disk TOML form. Every field has a default, so
//! an empty file (or no file at all) yields a working configuration
//! pointed at the Plasma mainnet deployment.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Address;

// ---------------------------------------------------------------------------
// Deployment Defaults
// ---------------------------------------------------------------------------

/// The community fund contract on Plasma.
pub const DEFAULT_FUND_ADDRESS: &str = "0x78F2ab39424A7A715D26A7933D7d1A5cC8be67cd";

/// USDT on Plasma, the default fund's stablecoin. Not used as a config
/// default: the token is always read from the configured fund's `usdt()`
/// unless `contracts.token` is set explicitly.
pub const DEFAULT_TOKEN_ADDRESS: &str = "0xB8CE59FC3717ada4C02eaDF9682A9e934F625ebb";

/// Public Plasma RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://rpc.plasma.to";

/// Plasma mainnet chain id.
pub const PLASMA_CHAIN_ID: u64 = 9745;

/// Plasma testnet chain id.
pub const PLASMA_TESTNET_CHAIN_ID: u64 = 9746;

/// Decimals assumed for the stablecoin until `decimals()` has been read.
/// USDT uses 6 on every chain we care about.
pub const FALLBACK_TOKEN_DECIMALS: u8 = 6;

// ---------------------------------------------------------------------------
// Timing Defaults
// ---------------------------------------------------------------------------

/// Confirmations to wait for after a write. One block is what wallet UIs
/// wait for before reporting success.
pub const DEFAULT_CONFIRMATIONS: u64 = 1;

/// Receipt polling interval.
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(1_000);

/// Give up waiting for a receipt after this long. The transaction may still
/// land later; we just stop blocking the user on it.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Log polling interval for the event watcher.
pub const DEFAULT_WATCH_POLL_INTERVAL: Duration = Duration::from_millis(4_000);

/// Widest `eth_getLogs` block range requested at once. Public endpoints
/// commonly refuse ranges above a few thousand blocks.
pub const DEFAULT_MAX_LOG_RANGE: u64 = 1_000;

/// HTTP request timeout for a single JSON-RPC call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default `tracing` filter when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "cfund=info,cfund_contracts=info,cfund_protocol=info";

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Returns a friendly name for a chain id, mainly for display.
/// Unknown chains get their id back because we're helpful like that.
pub fn network_name(chain_id: u64) -> String {
    match chain_id {
        1 => "ethereum".to_string(),
        11155111 => "sepolia".to_string(),
        PLASMA_CHAIN_ID => "plasma".to_string(),
        PLASMA_TESTNET_CHAIN_ID => "plasma-testnet".to_string(),
        31337 => "anvil".to_string(),
        other => format!("unknown({})", other),
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Full client configuration, as read from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub network: NetworkConfig,
    pub contracts: ContractsConfig,
    pub wallet: WalletConfig,
    pub transactions: TransactionConfig,
    pub watch: WatchConfig,
    pub logging: LoggingConfig,
}

/// Where the wallet endpoint lives and which chain it should be on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// JSON-RPC URL of the wallet endpoint.
    pub rpc_url: String,
    /// Chain id we expect to be connected to.
    pub chain_id: u64,
    /// Refuse to continue on a chain id mismatch instead of warning.
    pub enforce_chain_id: bool,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: PLASMA_CHAIN_ID,
            enforce_chain_id: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

/// Contract addresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContractsConfig {
    /// The community fund contract.
    pub fund: Address,
    /// The stablecoin. When absent it is read from the fund's `usdt()`.
    pub token: Option<Address>,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            fund: parse_default(DEFAULT_FUND_ADDRESS),
            token: None,
        }
    }
}

/// Which account to act as.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WalletConfig {
    /// Use this account instead of the first one the endpoint exposes.
    pub account: Option<Address>,
}

/// Behavior of write transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransactionConfig {
    /// Blocks to wait for (including the inclusion block).
    pub confirmations: u64,
    /// Receipt polling interval.
    pub poll_interval_ms: u64,
    /// Give up waiting for confirmation after this many seconds.
    pub timeout_secs: u64,
    /// Approve the exact shortfall automatically when a deposit or
    /// repayment needs more allowance.
    pub auto_approve: bool,
    /// Dry-run every write with `eth_estimateGas` before sending it, so a
    /// revert is reported with its reason and costs nothing.
    pub preflight: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            confirmations: DEFAULT_CONFIRMATIONS,
            poll_interval_ms: DEFAULT_RECEIPT_POLL_INTERVAL.as_millis() as u64,
            timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT.as_secs(),
            auto_approve: false,
            preflight: true,
        }
    }
}

impl TransactionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Event watcher tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// How often to poll for new logs.
    pub poll_interval_ms: u64,
    /// How many blocks before the head to start from. Zero means only new
    /// blocks.
    pub lookback_blocks: u64,
    /// Widest block range queried per `eth_getLogs` request.
    pub max_block_range: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_WATCH_POLL_INTERVAL.as_millis() as u64,
            lookback_blocks: 0,
            max_block_range: DEFAULT_MAX_LOG_RANGE,
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `"pretty"` or `"json"`.
    pub format: String,
    /// `tracing` filter directives. `RUST_LOG` takes precedence.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "pretty".to_string(),
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

fn parse_default(s: &str) -> Address {
    // Compile-time constants with checksums verified in tests.
    s.parse().unwrap_or(Address::ZERO)
}

impl ClientConfig {
    /// Parses a TOML document and validates it.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Writes the configuration to `path` below a comment `header`,
    /// creating parent directories.
    pub fn save(&self, path: &Path, header: &str) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = self.to_toml_string()?;
        let text = if header.is_empty() {
            body
        } else {
            format!("{header}\n{body}")
        };
        std::fs::write(path, text).map_err(io_err)
    }

    /// Rejects combinations that would make the client hang or spin.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.rpc_url.trim().is_empty() {
            return Err(ConfigError::Invalid("network.rpc_url is empty".into()));
        }
        if self.network.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "network.request_timeout_secs must be positive".into(),
            ));
        }
        if self.contracts.fund.is_zero() {
            return Err(ConfigError::Invalid("contracts.fund is the zero address".into()));
        }
        if self.transactions.confirmations == 0 {
            return Err(ConfigError::Invalid(
                "transactions.confirmations must be at least 1".into(),
            ));
        }
        if self.transactions.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "transactions.poll_interval_ms must be positive".into(),
            ));
        }
        if self.transactions.timeout() < self.transactions.poll_interval() {
            return Err(ConfigError::Invalid(
                "transactions.timeout_secs is shorter than the poll interval".into(),
            ));
        }
        if self.watch.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "watch.poll_interval_ms must be positive".into(),
            ));
        }
        if self.watch.max_block_range == 0 {
            return Err(ConfigError::Invalid(
                "watch.max_block_range must be at least 1".into(),
            ));
        }
        match self.logging.format.to_lowercase().as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(ConfigError::Invalid(format!(
                "logging.format must be \"pretty\" or \"json\", got {other:?}"
            ))),
        }
    }
}
