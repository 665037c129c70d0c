//! Integration tests for connecting a session and loading snapshots.
//!
//! Runs against the simulated chain in `common`, so every read goes through
//! the real ABI encoding and decoding.

mod common;

use cfund_contracts::{FundError, FundSession};
use cfund_protocol::ClientError;
use cfund_protocol::config::ClientConfig;
use common::*;

// ---------------------------------------------------------------------------
// Connect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connect_uses_first_wallet_account() {
    let chain = FakeChain::new();
    let session = FundSession::connect(&config(), chain.clone()).await.unwrap();

    assert_eq!(session.account(), addr(ALICE));
    assert_eq!(session.chain_id(), CHAIN_ID);
    assert_eq!(session.decimals(), 6);
    assert_eq!(session.symbol(), "USDT");
}

#[tokio::test]
async fn configured_account_skips_wallet_prompt() {
    let chain = FakeChain::new();
    let mut cfg = config();
    cfg.wallet.account = Some(addr(BOB));

    let session = FundSession::connect(&cfg, chain.clone()).await.unwrap();
    assert_eq!(session.account(), addr(BOB));
    assert_eq!(chain.count("eth_requestAccounts"), 0);
}

#[tokio::test]
async fn no_accounts_is_an_error() {
    let chain = FakeChain::new();
    chain.state().accounts.clear();

    let err = FundSession::connect(&config(), chain.clone()).await.err().unwrap();
    assert!(matches!(err, FundError::Client(ClientError::NoAccounts)));
}

#[tokio::test]
async fn chain_mismatch_warns_by_default() {
    let chain = FakeChain::new();
    chain.state().chain_id = 1;

    let session = FundSession::connect(&config(), chain.clone()).await.unwrap();
    assert_eq!(session.chain_id(), 1);
}

#[tokio::test]
async fn chain_mismatch_rejected_when_enforced() {
    let chain = FakeChain::new();
    chain.state().chain_id = 1;
    let mut cfg = config();
    cfg.network.enforce_chain_id = true;

    let err = FundSession::connect(&cfg, chain.clone()).await.err().unwrap();
    assert!(matches!(
        err,
        FundError::Client(ClientError::WrongChain {
            expected: CHAIN_ID,
            actual: 1
        })
    ));
}

#[tokio::test]
async fn token_resolved_from_fund_when_not_configured() {
    let chain = FakeChain::new();
    let mut cfg = config();
    cfg.contracts.token = None;

    let session = FundSession::connect(&cfg, chain.clone()).await.unwrap();
    assert_eq!(session.token().address(), addr(TOKEN));
}

#[tokio::test]
async fn token_follows_the_configured_fund_by_default() {
    let chain = FakeChain::new();
    let other_token = addr(BOB);
    chain.state().token = other_token;

    let cfg = ClientConfig::from_toml_str(&format!(
        "[network]\nchain_id = {CHAIN_ID}\n\n[contracts]\nfund = \"{FUND}\"\n"
    ))
    .unwrap();
    let session = FundSession::connect(&cfg, chain.clone()).await.unwrap();

    assert_eq!(session.token().address(), other_token);
}

#[tokio::test]
async fn unreadable_decimals_fall_back_to_six() {
    let chain = FakeChain::new();
    {
        let mut s = chain.state();
        s.decimals = 18;
        s.decimals_broken = true;
    }

    let session = FundSession::connect(&config(), chain.clone()).await.unwrap();
    assert_eq!(session.decimals(), 6);
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn snapshot_for_non_member() {
    let chain = FakeChain::new();
    chain.mint(ALICE, units(25));
    chain.seed_member(BOB, "Bob", units(100));

    let session = FundSession::connect(&config(), chain.clone()).await.unwrap();
    let snap = session.snapshot().await.unwrap();

    assert_eq!(snap.account, addr(ALICE));
    assert_eq!(snap.block_number, 100);
    assert_eq!(snap.wallet_balance.raw, units(25));
    assert_eq!(snap.wallet_balance.to_string(), "25.0");
    assert_eq!(snap.total_fund.raw, units(100));
    assert!(snap.allowance.is_zero());
    assert_eq!(snap.owner, addr(OWNER));
    assert!(!snap.is_owner);
    assert!(!snap.is_member());
    assert_eq!(snap.max_loan, None);
    assert_eq!(snap.members.len(), 1);
    assert_eq!(snap.members[0].name, "Bob");
}

#[tokio::test]
async fn snapshot_for_member_includes_own_record_and_limit() {
    let chain = FakeChain::new();
    chain.seed_member(ALICE, "Alice", units(40));
    chain.set_allowance(ALICE, units(5));

    let session = FundSession::connect(&config(), chain.clone()).await.unwrap();
    let snap = session.snapshot().await.unwrap();

    let me = snap.me.as_ref().unwrap();
    assert_eq!(me.name, "Alice");
    assert_eq!(me.deposit, units(40));
    assert_eq!(snap.max_loan.unwrap().raw, units(80));
    assert_eq!(snap.allowance.raw, units(5));
}

#[tokio::test]
async fn snapshot_preserves_member_order() {
    let chain = FakeChain::new();
    chain.seed_member(OWNER, "Owner", units(1));
    chain.seed_member(BOB, "Bob", units(2));
    chain.seed_member(ALICE, "Alice", units(3));

    let session = FundSession::connect(&config(), chain.clone()).await.unwrap();
    let snap = session.snapshot().await.unwrap();

    let order: Vec<_> = snap.members.iter().map(|m| m.address).collect();
    assert_eq!(order, vec![addr(OWNER), addr(BOB), addr(ALICE)]);
}

#[tokio::test]
async fn owner_flag_compares_addresses() {
    let chain = FakeChain::new();
    let mut cfg = config();
    // Lowercase input still identifies the owner.
    cfg.wallet.account = Some(OWNER.to_lowercase().parse().unwrap());

    let session = FundSession::connect(&cfg, chain.clone()).await.unwrap();
    assert!(session.snapshot().await.unwrap().is_owner);
}

// ---------------------------------------------------------------------------
// Amount parsing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn amount_parsing_rejects_empty_and_zero() {
    let chain = FakeChain::new();
    let session = FundSession::connect(&config(), chain.clone()).await.unwrap();

    assert!(matches!(session.parse_amount(""), Err(FundError::EmptyAmount)));
    assert!(matches!(session.parse_amount("0.0"), Err(FundError::ZeroAmount)));
    assert!(matches!(
        session.parse_amount("1.0000001"),
        Err(FundError::InvalidAmount(_))
    ));
    assert_eq!(session.parse_amount("12.5").unwrap().raw, units(25) / 2);
}
