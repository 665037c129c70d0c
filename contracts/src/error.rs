//! Error types for fund actions.
//!
//! Validation failures are checked client-side before anything is sent, so
//! a user who asks for something the contract would refuse gets a precise
//! reason and pays no gas. Everything else is a wrapped [`ClientError`].

use cfund_protocol::units::{TokenAmount, UnitsError};
use cfund_protocol::{Address, ClientError, TxHash};
use thiserror::Error;

use crate::actions::Action;

/// Errors that can occur while connecting or running a fund action.
#[derive(Debug, Error)]
pub enum FundError {
    /// No amount was entered.
    #[error("amount is required")]
    EmptyAmount,

    /// The amount parsed to zero.
    #[error("amount must be greater than zero")]
    ZeroAmount,

    /// The amount text was malformed.
    #[error("invalid amount: {0}")]
    InvalidAmount(#[source] UnitsError),

    /// The connected account is not registered in the fund.
    #[error("{0} is not a member of the fund")]
    NotMember(Address),

    /// An owner-only action was attempted by someone else.
    #[error("{account} is not the fund owner ({owner})")]
    NotOwner {
        /// The connected account.
        account: Address,
        /// The actual owner.
        owner: Address,
    },

    /// Wallet balance does not cover the amount.
    #[error("insufficient balance: have {available}, need {required}")]
    InsufficientBalance {
        /// Current wallet balance.
        available: TokenAmount,
        /// Amount the action needs.
        required: TokenAmount,
    },

    /// The fund is not approved to pull enough tokens.
    #[error("insufficient allowance: approved {allowance}, need {required} (approve first)")]
    InsufficientAllowance {
        /// Current allowance granted to the fund.
        allowance: TokenAmount,
        /// Amount the action needs.
        required: TokenAmount,
    },

    /// The requested loan is above the member's limit.
    #[error("loan limit exceeded: max {max_loan}, requested {requested}")]
    LoanLimitExceeded {
        /// `maxLoan(account)` as reported by the contract.
        max_loan: TokenAmount,
        /// Amount requested.
        requested: TokenAmount,
    },

    /// The pool does not hold enough to pay out.
    #[error("insufficient fund liquidity: fund holds {total_fund}, requested {requested}")]
    InsufficientFundLiquidity {
        /// `totalFund()`.
        total_fund: TokenAmount,
        /// Amount requested.
        requested: TokenAmount,
    },

    /// Repayment attempted with nothing owed.
    #[error("no active loan to repay")]
    NoActiveLoan,

    /// Repayment larger than the remaining balance.
    #[error("repayment {requested} exceeds remaining loan {remaining}")]
    RepaymentExceedsLoan {
        /// Remaining loan balance.
        remaining: TokenAmount,
        /// Amount offered.
        requested: TokenAmount,
    },

    /// A member name was blank.
    #[error("member name is required")]
    EmptyName,

    /// The address to add is already a member.
    #[error("{0} is already a member")]
    AlreadyMember(Address),

    /// The preflight dry run reverted; nothing was sent.
    #[error("{action} would revert: {reason}")]
    WouldRevert {
        /// The action that was attempted.
        action: Action,
        /// Revert reason reported by the node.
        reason: String,
    },

    /// The transaction was confirmed but the state could not be re-read
    /// afterwards. The action itself succeeded; do not resubmit it.
    #[error("{action} confirmed in {tx_hash} (block {block_number}), but refreshing state failed: {source}")]
    RefreshFailed {
        /// The action that was confirmed.
        action: Action,
        /// Hash of the confirmed transaction.
        tx_hash: TxHash,
        /// Block the transaction was included in.
        block_number: u64,
        /// Why the snapshot read failed.
        #[source]
        source: Box<FundError>,
    },

    /// Any lower-level failure.
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl From<UnitsError> for FundError {
    fn from(e: UnitsError) -> Self {
        match e {
            UnitsError::Empty => FundError::EmptyAmount,
            other => FundError::InvalidAmount(other),
        }
    }
}
