//! # Fund Event Watcher
//!
//! Polls `eth_getLogs` on the fund contract and forwards decoded events in
//! block order. Each poll covers `(last seen block, head]`, so no block is
//! queried twice and none is skipped while the watcher is running. A poll
//! never asks for more than `max_block_range` blocks; when the watcher is
//! further behind than that it polls again right away instead of waiting
//! for the next tick.
//!
//! Transport errors are logged and retried on the next tick; the watcher
//! only stops on shutdown or when nobody is listening anymore.

use std::time::Duration;

use cfund_protocol::rpc::{EthClient, LogFilter, Topic, Transport};
use cfund_protocol::{Address, ClientError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::fund::{FundEventKind, FundLog};

/// Which events to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchScope {
    /// Deposits, loans and installments of one account.
    Account(Address),
    /// Every fund event, unfiltered.
    All,
}

impl WatchScope {
    fn topics(&self) -> Vec<Option<Vec<Topic>>> {
        match self {
            WatchScope::Account(account) => vec![
                Some(
                    FundEventKind::ACCOUNT_SCOPED
                        .iter()
                        .map(|k| k.topic())
                        .collect(),
                ),
                Some(vec![account.to_word()]),
            ],
            WatchScope::All => vec![Some(FundEventKind::ALL.iter().map(|k| k.topic()).collect())],
        }
    }
}

/// Log poller for one fund contract.
pub struct FundWatcher<T> {
    client: EthClient<T>,
    fund: Address,
    scope: WatchScope,
    poll_interval: Duration,
    lookback_blocks: u64,
    max_block_range: u64,
    next_block: Option<u64>,
    behind: bool,
}

impl<T: Transport> FundWatcher<T> {
    pub fn new(client: EthClient<T>, fund: Address, scope: WatchScope) -> Self {
        Self {
            client,
            fund,
            scope,
            poll_interval: cfund_protocol::config::DEFAULT_WATCH_POLL_INTERVAL,
            lookback_blocks: 0,
            max_block_range: cfund_protocol::config::DEFAULT_MAX_LOG_RANGE,
            next_block: None,
            behind: false,
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Also report events from the last `blocks` blocks on the first poll.
    pub fn lookback(mut self, blocks: u64) -> Self {
        self.lookback_blocks = blocks;
        self
    }

    /// Caps the block span of a single `eth_getLogs` request.
    pub fn max_block_range(mut self, blocks: u64) -> Self {
        self.max_block_range = blocks.max(1);
        self
    }

    pub fn scope(&self) -> WatchScope {
        self.scope
    }

    /// The first block the next poll will query, once known.
    pub fn next_block(&self) -> Option<u64> {
        self.next_block
    }

    /// Fetches and decodes events up to the current head.
    ///
    /// The first call only establishes the starting point (minus any
    /// lookback). Removed (reorged-out) logs and logs that fail to decode
    /// are dropped.
    pub async fn poll_once(&mut self) -> Result<Vec<FundLog>, ClientError> {
        let head = self.client.block_number().await?;
        let from = match self.next_block {
            Some(next) => next,
            None => (head + 1).saturating_sub(self.lookback_blocks),
        };

        if from > head {
            self.next_block = Some(from);
            self.behind = false;
            return Ok(Vec::new());
        }

        let to = head.min(from.saturating_add(self.max_block_range - 1));
        let filter = LogFilter {
            address: self.fund,
            topics: self.scope.topics(),
            from_block: from,
            to_block: to,
        };
        let logs = self.client.get_logs(&filter).await?;

        let mut events: Vec<FundLog> = logs
            .iter()
            .filter(|log| !log.removed && log.address == self.fund)
            .filter_map(|log| match FundLog::from_log(log) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, block = ?log.block_number, "undecodable fund log");
                    None
                }
            })
            .collect();
        events.sort_by_key(|e| (e.block_number, e.log_index));

        self.next_block = Some(to + 1);
        self.behind = to < head;
        if !events.is_empty() {
            tracing::debug!(from, to, count = events.len(), "fund events received");
        }
        Ok(events)
    }

    /// Polls until `shutdown` flips (or its sender drops) or `events` is
    /// closed. Each non-empty poll is sent as one batch.
    pub async fn run(mut self, events: mpsc::Sender<Vec<FundLog>>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(fund = %self.fund, scope = ?self.scope, "watching fund events");

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.poll_once().await {
                Ok(batch) if batch.is_empty() => {}
                Ok(batch) => {
                    if events.send(batch).await.is_err() {
                        tracing::debug!("event receiver dropped");
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "fund event poll failed"),
            }

            if self.behind {
                tokio::task::yield_now().await;
                continue;
            }

            tokio::select! {
                _ = shutdown.changed() => {}
                _ = events.closed() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            if shutdown.has_changed().is_err() {
                break;
            }
        }

        tracing::info!("fund watcher stopped");
    }
}

impl<T: Transport + 'static> FundWatcher<T> {
    /// Runs the watcher on its own task.
    pub fn spawn(
        self,
        events: mpsc::Sender<Vec<FundLog>>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(events, shutdown))
    }
}
