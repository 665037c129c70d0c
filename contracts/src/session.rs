//! # Fund Session
//!
//! A connected account bound to one fund and its stablecoin. The session
//! owns everything the actions need: who is sending, which chain we are on,
//! the token's precision, and how long to wait for confirmations.
//!
//! ```text
//! connect ──► accounts ──► chain id ──► token address ──► decimals/symbol
//!
//! snapshot ──► (block, totalFund, balance, allowance, owner, getAllMembers,
//!               members(me)) concurrently ──► members(*) ──► maxLoan(me)
//! ```

use cfund_protocol::config::{ClientConfig, TransactionConfig, FALLBACK_TOKEN_DECIMALS};
use cfund_protocol::rpc::{CallRequest, EthClient, TransactionReceipt, Transport};
use cfund_protocol::units::TokenAmount;
use cfund_protocol::{Address, ClientError, U256};

use crate::actions::Action;
use crate::erc20::Erc20;
use crate::error::FundError;
use crate::fund::{CommunityFund, Member};

/// Symbol shown when the token's `symbol()` cannot be read.
pub const FALLBACK_TOKEN_SYMBOL: &str = "USDT";

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One consistent read of fund and account state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundSnapshot {
    pub account: Address,
    pub chain_id: u64,
    /// Chain head when the snapshot was taken.
    pub block_number: u64,
    pub fund: Address,
    pub token: Address,
    pub symbol: String,
    pub decimals: u8,
    pub total_fund: TokenAmount,
    pub wallet_balance: TokenAmount,
    /// What the fund may pull from the account.
    pub allowance: TokenAmount,
    pub owner: Address,
    pub is_owner: bool,
    /// Every member in `getAllMembers()` order.
    pub members: Vec<Member>,
    /// The connected account's record, when it is a member.
    pub me: Option<Member>,
    /// `maxLoan(account)`, read only for members.
    pub max_loan: Option<TokenAmount>,
}

impl FundSnapshot {
    /// Pairs a raw amount with this token's precision.
    pub fn amount(&self, raw: U256) -> TokenAmount {
        TokenAmount::new(raw, self.decimals)
    }

    pub fn is_member(&self) -> bool {
        self.me.is_some()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A connected wallet account and the contracts it acts on.
#[derive(Clone)]
pub struct FundSession<T> {
    pub(crate) client: EthClient<T>,
    pub(crate) fund: CommunityFund<T>,
    pub(crate) token: Erc20<T>,
    pub(crate) account: Address,
    pub(crate) chain_id: u64,
    pub(crate) decimals: u8,
    pub(crate) symbol: String,
    pub(crate) tx: TransactionConfig,
}

impl<T: Transport + Clone> FundSession<T> {
    /// Connects to the wallet endpoint and resolves everything the session
    /// needs before the first read.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoAccounts`] when the endpoint exposes no account,
    /// [`ClientError::WrongChain`] on a chain mismatch with
    /// `network.enforce_chain_id` set, or any transport failure.
    pub async fn connect(config: &ClientConfig, transport: T) -> Result<Self, FundError> {
        let client = EthClient::new(transport);

        let account = match config.wallet.account {
            Some(account) => account,
            None => client
                .request_accounts()
                .await?
                .into_iter()
                .next()
                .ok_or(ClientError::NoAccounts)?,
        };

        let chain_id = client.chain_id().await?;
        if chain_id != config.network.chain_id {
            if config.network.enforce_chain_id {
                return Err(ClientError::WrongChain {
                    expected: config.network.chain_id,
                    actual: chain_id,
                }
                .into());
            }
            tracing::warn!(
                expected = config.network.chain_id,
                actual = chain_id,
                "connected to an unexpected chain"
            );
        }

        let fund = CommunityFund::new(client.clone(), config.contracts.fund);
        let token_address = match config.contracts.token {
            Some(token) => token,
            None => fund.usdt().await?,
        };
        let token = Erc20::new(client.clone(), token_address);

        let decimals = match token.decimals().await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    fallback = FALLBACK_TOKEN_DECIMALS,
                    "could not read token decimals"
                );
                FALLBACK_TOKEN_DECIMALS
            }
        };
        let symbol = match token.symbol().await {
            Ok(s) if !s.trim().is_empty() => s,
            Ok(_) => FALLBACK_TOKEN_SYMBOL.to_string(),
            Err(e) => {
                tracing::debug!(error = %e, "could not read token symbol");
                FALLBACK_TOKEN_SYMBOL.to_string()
            }
        };

        tracing::info!(
            account = %account,
            chain_id,
            fund = %config.contracts.fund,
            token = %token_address,
            decimals,
            "session connected"
        );

        Ok(Self {
            client,
            fund,
            token,
            account,
            chain_id,
            decimals,
            symbol,
            tx: config.transactions.clone(),
        })
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn fund(&self) -> &CommunityFund<T> {
        &self.fund
    }

    pub fn token(&self) -> &Erc20<T> {
        &self.token
    }

    pub fn client(&self) -> &EthClient<T> {
        &self.client
    }

    pub(crate) fn amount(&self, raw: U256) -> TokenAmount {
        TokenAmount::new(raw, self.decimals)
    }

    /// Parses a user-entered amount in token units, rejecting zero.
    pub fn parse_amount(&self, input: &str) -> Result<TokenAmount, FundError> {
        let amount = TokenAmount::parse(input, self.decimals)?;
        if amount.is_zero() {
            return Err(FundError::ZeroAmount);
        }
        Ok(amount)
    }

    /// Reads the full fund and account state.
    pub async fn snapshot(&self) -> Result<FundSnapshot, ClientError> {
        let fund_address = self.fund.address();
        let (block_number, total_fund, balance, allowance, owner, addresses, me) = tokio::try_join!(
            self.client.block_number(),
            self.fund.total_fund(),
            self.token.balance_of(self.account),
            self.token.allowance(self.account, fund_address),
            self.fund.owner(),
            self.fund.all_members(),
            self.fund.member(self.account),
        )?;

        let me = me.exists.then_some(me);
        let (members, max_loan) = match me {
            Some(_) => {
                let (members, max_loan) = tokio::try_join!(
                    self.fund.members(&addresses),
                    self.fund.max_loan(self.account),
                )?;
                (members, Some(self.amount(max_loan)))
            }
            None => (self.fund.members(&addresses).await?, None),
        };

        tracing::debug!(
            block = block_number,
            members = members.len(),
            "snapshot loaded"
        );

        Ok(FundSnapshot {
            account: self.account,
            chain_id: self.chain_id,
            block_number,
            fund: fund_address,
            token: self.token.address(),
            symbol: self.symbol.clone(),
            decimals: self.decimals,
            total_fund: self.amount(total_fund),
            wallet_balance: self.amount(balance),
            allowance: self.amount(allowance),
            owner,
            is_owner: owner == self.account,
            members,
            me,
            max_loan,
        })
    }

    /// Sends `call` from the connected account and waits for it to confirm.
    ///
    /// With preflight enabled the call is dry-run through `eth_estimateGas`
    /// first. A revert there becomes [`FundError::WouldRevert`] and nothing
    /// is sent.
    pub async fn submit(
        &self,
        action: Action,
        call: CallRequest,
    ) -> Result<TransactionReceipt, FundError> {
        let call = call.from(self.account);

        if self.tx.preflight {
            match self.client.estimate_gas(&call).await {
                Ok(gas) => tracing::debug!(%action, %gas, "preflight passed"),
                Err(ClientError::Rpc {
                    message, reason, ..
                }) if reason.is_some() || message.contains("revert") => {
                    let reason = reason.unwrap_or(message);
                    tracing::warn!(%action, %reason, "preflight reverted");
                    return Err(FundError::WouldRevert { action, reason });
                }
                Err(e) => return Err(e.into()),
            }
        }

        let tx_hash = self.client.send_transaction(&call).await?;
        tracing::info!(%action, %tx_hash, "waiting for confirmation");

        let receipt = self
            .client
            .wait_for_receipt(
                tx_hash,
                self.tx.confirmations,
                self.tx.poll_interval(),
                self.tx.timeout(),
            )
            .await?;
        Ok(receipt)
    }
}
