// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Community Fund CLI
//!
//! Entry point for the `cfund` binary. Parses CLI arguments, resolves the
//! configuration (file, then environment and flags), initializes logging,
//! connects to the wallet endpoint, and runs one subcommand.
//!
//! - `status`, `members`: read-only views
//! - `approve`, `deposit`, `borrow`, `repay`: member actions
//! - `add-member`, `emergency-withdraw`: owner actions
//! - `watch`: follow fund events
//! - `init-config`, `version`: local only, no connection

mod cli;
mod display;
mod logging;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::{mpsc, watch};

use cfund_contracts::{FundSession, FundWatcher, WatchScope};
use cfund_protocol::config::{ClientConfig, DEFAULT_LOG_FILTER};
use cfund_protocol::rpc::HttpTransport;

use cli::{CfundCli, Commands, GlobalArgs, DEFAULT_CONFIG_FILE};
use display::Output;
use logging::LogFormat;

/// Event batches buffered between the watcher task and the renderer.
const EVENT_CHANNEL_CAPACITY: usize = 64;

type Session = FundSession<Arc<HttpTransport>>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CfundCli::parse();

    match cli.command {
        Commands::Version => {
            print_version();
            Ok(())
        }
        Commands::InitConfig(args) => {
            logging::init_logging(DEFAULT_LOG_FILTER, LogFormat::Pretty);
            init_config(args)
        }
        command => run(cli.global, command).await,
    }
}

/// Connects and dispatches every subcommand that talks to the chain.
async fn run(global: GlobalArgs, command: Commands) -> Result<()> {
    let config = resolve_config(&global)?;
    let format = LogFormat::from_str_lossy(
        global
            .log_format
            .as_deref()
            .unwrap_or(&config.logging.format),
    );
    logging::init_logging(&config.logging.filter, format);

    tracing::debug!(
        rpc_url = %config.network.rpc_url,
        fund = %config.contracts.fund,
        "configuration resolved"
    );

    let transport = HttpTransport::new(
        config.network.rpc_url.clone(),
        Duration::from_secs(config.network.request_timeout_secs),
    )
    .context("failed to build HTTP client")?;
    let session = FundSession::connect(&config, Arc::new(transport))
        .await
        .with_context(|| format!("failed to connect to {}", config.network.rpc_url))?;

    let out = Output { json: global.json };

    match command {
        Commands::Status => out.snapshot(&session.snapshot().await?)?,
        Commands::Members => out.members(&session.snapshot().await?)?,
        Commands::Approve(args) => out.report(&session.approve(&args.amount).await?)?,
        Commands::Deposit(args) => out.report(&session.deposit(&args.amount).await?)?,
        Commands::Borrow(args) => out.report(&session.borrow(&args.amount).await?)?,
        Commands::Repay(args) => out.report(&session.repay(&args.amount).await?)?,
        Commands::AddMember(args) => {
            out.report(&session.add_member(args.address, &args.name).await?)?
        }
        Commands::EmergencyWithdraw(args) => {
            out.report(&session.emergency_withdraw(&args.amount).await?)?
        }
        Commands::Watch(args) => watch_events(&session, &config, args, out).await?,
        Commands::InitConfig(_) | Commands::Version => {}
    }
    Ok(())
}

/// Loads the config file (explicit path, or `cfund.toml` if present) and
/// applies flag/environment overrides on top.
fn resolve_config(global: &GlobalArgs) -> Result<ClientConfig> {
    let mut config = match &global.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            ClientConfig::load(Path::new(DEFAULT_CONFIG_FILE))
                .with_context(|| format!("failed to load config {DEFAULT_CONFIG_FILE}"))?
        }
        None => ClientConfig::default(),
    };

    apply_overrides(&mut config, global);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn apply_overrides(config: &mut ClientConfig, global: &GlobalArgs) {
    if let Some(url) = &global.rpc_url {
        config.network.rpc_url = url.clone();
    }
    if let Some(chain_id) = global.chain_id {
        config.network.chain_id = chain_id;
    }
    if let Some(fund) = global.fund_address {
        config.contracts.fund = fund;
    }
    if let Some(token) = global.token_address {
        config.contracts.token = Some(token);
    }
    if let Some(account) = global.account {
        config.wallet.account = Some(account);
    }
    if global.auto_approve {
        config.transactions.auto_approve = true;
    }
    if global.no_preflight {
        config.transactions.preflight = false;
    }
    if let Some(format) = &global.log_format {
        config.logging.format = format.clone();
    }
}

/// Prints the current state, then re-renders it after every batch of fund
/// events until Ctrl+C.
async fn watch_events(
    session: &Session,
    config: &ClientConfig,
    args: cli::WatchArgs,
    out: Output,
) -> Result<()> {
    let scope = if args.all {
        WatchScope::All
    } else {
        WatchScope::Account(session.account())
    };

    out.snapshot(&session.snapshot().await?)?;

    let watcher = FundWatcher::new(session.client().clone(), session.fund().address(), scope)
        .poll_interval(config.watch.poll_interval())
        .lookback(args.lookback.unwrap_or(config.watch.lookback_blocks))
        .max_block_range(config.watch.max_block_range);

    let (events_tx, mut events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = watcher.spawn(events_tx, stop_rx);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            batch = events_rx.recv() => {
                let Some(batch) = batch else { break };
                out.events(&batch, session.decimals(), session.symbol())?;
                match session.snapshot().await {
                    Ok(snap) => out.snapshot(&snap)?,
                    Err(e) => tracing::warn!(error = %e, "snapshot refresh failed"),
                }
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    let _ = stop_tx.send(true);
    handle.await.context("watcher task failed")?;
    Ok(())
}

/// Writes a commented default configuration file.
fn init_config(args: cli::InitConfigArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            args.path.display()
        );
    }

    ClientConfig::default()
        .save(&args.path, CONFIG_HEADER)
        .with_context(|| format!("failed to write {}", args.path.display()))?;

    tracing::info!(path = %args.path.display(), "configuration written");
    println!("Configuration written to {}", args.path.display());
    Ok(())
}

const CONFIG_HEADER: &str = "\
# cfund client configuration.
#
# [network]       wallet endpoint URL and the chain id it should report.
#                 enforce_chain_id = true turns a mismatch into an error.
# [contracts]     fund address; token is read from the fund's usdt() when
#                 omitted.
# [wallet]        account to act as; defaults to the endpoint's first account.
# [transactions]  confirmations, receipt polling, auto_approve and the
#                 eth_estimateGas preflight.
# [watch]         event polling interval, initial lookback and the widest
#                 block range asked for in one eth_getLogs request.
# [logging]       \"pretty\" or \"json\"; RUST_LOG overrides the filter.
#
# Every value can also be set with a CFUND_* environment variable or flag.
";

/// Prints version information to stdout.
fn print_version() {
    println!("cfund {}", env!("CARGO_PKG_VERSION"));
    println!("rustc {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
