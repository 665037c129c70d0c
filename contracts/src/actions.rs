//! # Fund Actions
//!
//! Every write follows the same pipeline:
//!
//! ```text
//! parse amount ─► read state ─► validate ─► [approve] ─► preflight ─► send
//!                                                           │
//!                          ActionReport ◄─ snapshot ◄─ wait for receipt
//! ```
//!
//! Validation mirrors the checks the contract itself performs, so a request
//! the contract would refuse is rejected here with a typed reason and no
//! transaction is sent. The contract remains the authority: anything that
//! slips past these checks still fails in preflight or on chain.

use std::fmt;

use cfund_protocol::rpc::{TransactionReceipt, Transport};
use cfund_protocol::units::TokenAmount;
use cfund_protocol::{Address, TxHash, U256};
use chrono::{DateTime, Utc};

use crate::error::FundError;
use crate::fund::Member;
use crate::session::{FundSession, FundSnapshot};

/// The write operations a session can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Approve,
    Deposit,
    Borrow,
    Repay,
    AddMember,
    EmergencyWithdraw,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Approve => "approve",
            Action::Deposit => "deposit",
            Action::Borrow => "borrow",
            Action::Repay => "repay",
            Action::AddMember => "add-member",
            Action::EmergencyWithdraw => "emergency-withdraw",
        };
        f.write_str(name)
    }
}

/// Outcome of a confirmed action.
#[derive(Debug, Clone)]
pub struct ActionReport {
    pub action: Action,
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: U256,
    /// Approval sent ahead of the action when `auto_approve` topped up the
    /// allowance.
    pub approval: Option<TxHash>,
    /// State re-read after confirmation.
    pub snapshot: FundSnapshot,
    pub confirmed_at: DateTime<Utc>,
}

fn rejected(action: Action, err: FundError) -> FundError {
    tracing::warn!(%action, error = %err, "action rejected");
    err
}

impl<T: Transport + Clone> FundSession<T> {
    fn parse_for(&self, action: Action, input: &str) -> Result<TokenAmount, FundError> {
        self.parse_amount(input).map_err(|e| rejected(action, e))
    }

    async fn finish(
        &self,
        action: Action,
        receipt: TransactionReceipt,
        approval: Option<TxHash>,
    ) -> Result<ActionReport, FundError> {
        let snapshot = match self.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    %action,
                    tx_hash = %receipt.transaction_hash,
                    error = %e,
                    "transaction confirmed but state refresh failed"
                );
                return Err(FundError::RefreshFailed {
                    action,
                    tx_hash: receipt.transaction_hash,
                    block_number: receipt.block_number,
                    source: Box::new(FundError::Client(e)),
                });
            }
        };
        Ok(ActionReport {
            action,
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            approval,
            snapshot,
            confirmed_at: Utc::now(),
        })
    }

    /// Checks that the account can fund a transfer of `amount` to the pool.
    ///
    /// Returns the approval transaction hash when one had to be sent.
    async fn ensure_spendable(
        &self,
        action: Action,
        amount: TokenAmount,
    ) -> Result<Option<TxHash>, FundError> {
        let (balance, allowance) = tokio::try_join!(
            self.token.balance_of(self.account),
            self.token.allowance(self.account, self.fund.address()),
        )?;

        if balance < amount.raw {
            return Err(rejected(
                action,
                FundError::InsufficientBalance {
                    available: self.amount(balance),
                    required: amount,
                },
            ));
        }

        if allowance >= amount.raw {
            return Ok(None);
        }

        if !self.tx.auto_approve {
            return Err(rejected(
                action,
                FundError::InsufficientAllowance {
                    allowance: self.amount(allowance),
                    required: amount,
                },
            ));
        }

        tracing::info!(%action, %amount, "allowance too low, approving first");
        let call = self.token.approve(self.fund.address(), amount.raw);
        let receipt = self.submit(Action::Approve, call).await?;
        Ok(Some(receipt.transaction_hash))
    }

    async fn require_member(&self, action: Action) -> Result<Member, FundError> {
        let me = self.fund.member(self.account).await?;
        if !me.exists {
            return Err(rejected(action, FundError::NotMember(self.account)));
        }
        Ok(me)
    }

    async fn require_owner(&self, action: Action) -> Result<(), FundError> {
        let owner = self.fund.owner().await?;
        if owner != self.account {
            return Err(rejected(
                action,
                FundError::NotOwner {
                    account: self.account,
                    owner,
                },
            ));
        }
        Ok(())
    }

    // -- actions ------------------------------------------------------------

    /// Approves the fund to pull `amount` tokens.
    pub async fn approve(&self, amount: &str) -> Result<ActionReport, FundError> {
        let action = Action::Approve;
        let amount = self.parse_for(action, amount)?;

        let call = self.token.approve(self.fund.address(), amount.raw);
        let receipt = self.submit(action, call).await?;
        self.finish(action, receipt, None).await
    }

    /// Deposits `amount` into the pool.
    pub async fn deposit(&self, amount: &str) -> Result<ActionReport, FundError> {
        let action = Action::Deposit;
        let amount = self.parse_for(action, amount)?;

        self.require_member(action).await?;
        let approval = self.ensure_spendable(action, amount).await?;

        let receipt = self.submit(action, self.fund.deposit(amount.raw)).await?;
        self.finish(action, receipt, approval).await
    }

    /// Borrows `amount` from the pool.
    pub async fn borrow(&self, amount: &str) -> Result<ActionReport, FundError> {
        let action = Action::Borrow;
        let amount = self.parse_for(action, amount)?;

        self.require_member(action).await?;
        let (max_loan, total_fund) = tokio::try_join!(
            self.fund.max_loan(self.account),
            self.fund.total_fund(),
        )?;

        if amount.raw > max_loan {
            return Err(rejected(
                action,
                FundError::LoanLimitExceeded {
                    max_loan: self.amount(max_loan),
                    requested: amount,
                },
            ));
        }
        if amount.raw > total_fund {
            return Err(rejected(
                action,
                FundError::InsufficientFundLiquidity {
                    total_fund: self.amount(total_fund),
                    requested: amount,
                },
            ));
        }

        let receipt = self.submit(action, self.fund.borrow(amount.raw)).await?;
        self.finish(action, receipt, None).await
    }

    /// Pays `amount` towards the outstanding loan (`payInstallment`).
    pub async fn repay(&self, amount: &str) -> Result<ActionReport, FundError> {
        let action = Action::Repay;
        let amount = self.parse_for(action, amount)?;

        let me = self.require_member(action).await?;
        if !me.has_active_loan() {
            return Err(rejected(action, FundError::NoActiveLoan));
        }
        if amount.raw > me.remaining_loan {
            return Err(rejected(
                action,
                FundError::RepaymentExceedsLoan {
                    remaining: self.amount(me.remaining_loan),
                    requested: amount,
                },
            ));
        }
        let approval = self.ensure_spendable(action, amount).await?;

        let receipt = self
            .submit(action, self.fund.pay_installment(amount.raw))
            .await?;
        self.finish(action, receipt, approval).await
    }

    /// Registers `user` under `name`. Owner only.
    pub async fn add_member(&self, user: Address, name: &str) -> Result<ActionReport, FundError> {
        let action = Action::AddMember;
        let name = name.trim();

        self.require_owner(action).await?;
        if name.is_empty() {
            return Err(rejected(action, FundError::EmptyName));
        }
        if self.fund.member(user).await?.exists {
            return Err(rejected(action, FundError::AlreadyMember(user)));
        }

        let receipt = self.submit(action, self.fund.add_member(user, name)).await?;
        self.finish(action, receipt, None).await
    }

    /// Withdraws `amount` from the pool to the owner. Owner only.
    pub async fn emergency_withdraw(&self, amount: &str) -> Result<ActionReport, FundError> {
        let action = Action::EmergencyWithdraw;
        let amount = self.parse_for(action, amount)?;

        self.require_owner(action).await?;
        let total_fund = self.fund.total_fund().await?;
        if amount.raw > total_fund {
            return Err(rejected(
                action,
                FundError::InsufficientFundLiquidity {
                    total_fund: self.amount(total_fund),
                    requested: amount,
                },
            ));
        }

        let receipt = self
            .submit(action, self.fund.emergency_withdraw(amount.raw))
            .await?;
        self.finish(action, receipt, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names() {
        assert_eq!(Action::Repay.to_string(), "repay");
        assert_eq!(Action::AddMember.to_string(), "add-member");
        assert_eq!(Action::EmergencyWithdraw.to_string(), "emergency-withdraw");
    }
}
